//! Class records and the class-pair lifecycle.
//!
//! This module implements:
//! - `ClassHandle`, the index-based reference to a class record
//! - The name registry (classes and metaclasses in separate maps)
//! - `allocate_class_pair` / `register_class_pair`
//! - Draft mutation: ivars and the strong/weak ivar layout blobs
//!
//! # Lifecycle
//!
//! ```text
//! allocate_class_pair ──► draft ──add_ivar/add_property/add_method──► draft
//!                           │
//!                   register_class_pair
//!                           ▼
//!                registered (layout frozen, metaclass created,
//!                            name published)
//! ```
//!
//! A draft is invisible to name lookups. Registration computes the layout,
//! creates the metaclass and publishes both names, or does none of it.
//! Methods can be added before and after registration; ivars, properties and
//! the layout blobs only before.
//!
//! # Metaclasses
//!
//! Each registered class has exactly one metaclass, created at registration:
//! - superclass: the superclass's metaclass, or the root class itself for a
//!   root class
//! - isa: the root metaclass; a root metaclass is its own isa
//!
//! # Thread Safety
//!
//! Registration holds the registry write lock for its whole duration, so two
//! registrations of one name cannot both succeed. Mutation of one draft is
//! serialised by that draft's ivar lock, which registration also holds.

use super::layout::{self, InstanceLayout, Ivar};
use super::method::{Method, MethodCache};
use super::property::Property;
use super::{Runtime, Selector};
use crate::error::{Error, Result};
use fxhash::FxHashMap;
use oxidyn_log::{debug, error, warn};
use parking_lot::{RwLock, RwLockWriteGuard};
use std::sync::{Arc, OnceLock};

/// Opaque reference to a class or metaclass record.
///
/// Handles are indices into the runtime's class arena. They are `Copy`,
/// never dangle, and only mean something to the runtime that issued them.
/// `#[repr(transparent)]` over `u32`, so a handle crosses the C ABI as is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct ClassHandle(u32);

impl ClassHandle {
    pub(crate) const fn new(index: u32) -> Self {
        Self(index)
    }

    pub(crate) const fn index(self) -> usize {
        self.0 as usize
    }

    /// Returns the raw index.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

/// Published names. Classes and metaclasses share names, so they live in
/// separate maps.
pub(crate) struct Registry {
    pub(crate) classes: FxHashMap<Arc<str>, ClassHandle>,
    pub(crate) metaclasses: FxHashMap<Arc<str>, ClassHandle>,
}

impl Registry {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            classes: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
            metaclasses: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
        }
    }
}

/// Internal class data stored in the runtime's class arena.
///
/// Records are never removed. Everything fixed at allocation is a plain
/// field; everything fixed at registration is a `OnceLock`.
pub(crate) struct ClassRecord {
    name: Arc<str>,
    superclass: Option<ClassHandle>,
    is_metaclass: bool,
    extra_bytes: usize,
    /// For a class, its metaclass. For a metaclass, the root metaclass.
    isa: OnceLock<ClassHandle>,
    /// Set once at registration; doubles as the registered flag.
    layout: OnceLock<InstanceLayout>,
    /// Own ivars in declaration order. The write lock also guards every
    /// other draft-only mutation.
    ivars: RwLock<Vec<Ivar>>,
    properties: RwLock<Vec<Property>>,
    pub(crate) methods: RwLock<FxHashMap<Selector, Method>>,
    pub(crate) cache: MethodCache,
    ivar_layout: RwLock<Option<Arc<[u8]>>>,
    weak_ivar_layout: RwLock<Option<Arc<[u8]>>>,
}

impl ClassRecord {
    fn draft(name: Arc<str>, superclass: Option<ClassHandle>, extra_bytes: usize) -> Self {
        Self {
            name,
            superclass,
            is_metaclass: false,
            extra_bytes,
            isa: OnceLock::new(),
            layout: OnceLock::new(),
            ivars: RwLock::new(Vec::new()),
            properties: RwLock::new(Vec::new()),
            methods: RwLock::new(FxHashMap::default()),
            cache: MethodCache::default(),
            ivar_layout: RwLock::new(None),
            weak_ivar_layout: RwLock::new(None),
        }
    }

    /// A metaclass is born registered.
    fn metaclass(
        name: Arc<str>,
        superclass: ClassHandle,
        isa: ClassHandle,
        layout: InstanceLayout,
    ) -> Self {
        Self {
            is_metaclass: true,
            isa: OnceLock::from(isa),
            layout: OnceLock::from(layout),
            ..Self::draft(name, Some(superclass), 0)
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn superclass(&self) -> Option<ClassHandle> {
        self.superclass
    }

    pub(crate) fn is_metaclass(&self) -> bool {
        self.is_metaclass
    }

    pub(crate) fn isa(&self) -> Option<ClassHandle> {
        self.isa.get().copied()
    }

    pub(crate) fn layout(&self) -> Option<InstanceLayout> {
        self.layout.get().copied()
    }

    pub(crate) fn is_registered(&self) -> bool {
        self.layout.get().is_some()
    }

    pub(crate) fn own_ivar(&self, name: &str) -> Option<Ivar> {
        self.ivars.read().iter().find(|ivar| ivar.name() == name).cloned()
    }

    pub(crate) fn ivars(&self) -> Box<[Ivar]> {
        self.ivars.read().iter().cloned().collect()
    }

    pub(crate) fn properties(&self) -> &RwLock<Vec<Property>> {
        &self.properties
    }

    /// Locks the draft for mutation.
    ///
    /// Registration takes the same lock, so a draft can't be sealed while
    /// the guard is held.
    pub(crate) fn lock_draft(&self) -> Result<RwLockWriteGuard<'_, Vec<Ivar>>> {
        let ivars = self.ivars.write();
        if self.is_registered() {
            return Err(Error::SealedClass {
                class: self.name.to_string(),
            });
        }
        Ok(ivars)
    }
}

impl Runtime {
    /// Creates a draft class.
    ///
    /// The draft is not visible to [`get_class`](Self::get_class) until it
    /// is registered. `extra_bytes` is appended to every instance.
    ///
    /// # Errors
    ///
    /// - [`Error::DuplicateName`] if a class named `name` is published
    /// - [`Error::SuperclassNotRegistered`] if `superclass` is a draft
    /// - [`Error::MetaclassAsSuperclass`] if `superclass` is a metaclass
    ///
    /// # Panics
    ///
    /// Panics if `superclass` was not issued by this runtime.
    ///
    /// # Example
    ///
    /// ```rust
    /// use oxidyn::Runtime;
    ///
    /// let rt = Runtime::new();
    /// let root = rt.allocate_class_pair(None, "Root", 0).unwrap();
    /// assert!(rt.get_class("Root").is_none());
    ///
    /// rt.register_class_pair(root).unwrap();
    /// assert_eq!(rt.get_class("Root"), Some(root));
    /// ```
    pub fn allocate_class_pair(
        &self,
        superclass: Option<ClassHandle>,
        name: &str,
        extra_bytes: usize,
    ) -> Result<ClassHandle> {
        if let Some(superclass) = superclass {
            let parent = self.record(superclass);
            if parent.is_metaclass() {
                warn!(class = name, superclass = parent.name(); "metaclass passed as superclass");
                return Err(Error::MetaclassAsSuperclass {
                    class: name.to_owned(),
                    superclass: parent.name().to_owned(),
                });
            }
            if !parent.is_registered() {
                warn!(class = name, superclass = parent.name(); "superclass is not registered");
                return Err(Error::SuperclassNotRegistered {
                    class: name.to_owned(),
                    superclass: parent.name().to_owned(),
                });
            }
        }

        if self.registry.read().classes.contains_key(name) {
            warn!(class = name; "class name already published");
            return Err(Error::DuplicateName {
                name: name.to_owned(),
            });
        }

        let class = self.push_record(name, |_| {
            ClassRecord::draft(Arc::from(name), superclass, extra_bytes)
        })?;

        debug!(class = name, handle = class.as_u32(), extra_bytes = extra_bytes; "allocated class pair");
        Ok(class)
    }

    /// Registers a draft: computes its layout, creates its metaclass and
    /// publishes both under the class's name.
    ///
    /// On failure the draft is left as it was and nothing is published.
    ///
    /// # Errors
    ///
    /// - [`Error::AlreadyRegistered`] if `class` is registered (metaclasses
    ///   always are)
    /// - [`Error::DuplicateName`] if another class of that name was published
    ///   first
    /// - [`Error::InvalidAlignment`] if an ivar alignment is not a power of
    ///   two
    /// - [`Error::LayoutOverflow`] if the instance size overflows
    ///
    /// # Panics
    ///
    /// Panics if `class` was not issued by this runtime.
    pub fn register_class_pair(&self, class: ClassHandle) -> Result<()> {
        let record = self.record(class);

        let mut registry = self.registry.write();
        let ivars = record.ivars.write();

        if record.is_registered() {
            warn!(class = record.name(); "class pair registered twice");
            return Err(Error::AlreadyRegistered {
                class: record.name().to_owned(),
            });
        }

        if registry.classes.contains_key(record.name()) {
            warn!(class = record.name(); "class name already published");
            return Err(Error::DuplicateName {
                name: record.name().to_owned(),
            });
        }

        let base = match record.superclass() {
            Some(superclass) => self.record(superclass).layout().ok_or_else(|| {
                Error::SuperclassNotRegistered {
                    class: record.name().to_owned(),
                    superclass: self.record(superclass).name().to_owned(),
                }
            })?,
            None => InstanceLayout::EMPTY,
        };

        let computed = layout::compute(record.name(), base, &ivars, record.extra_bytes)
            .inspect_err(|err| match err {
                Error::LayoutOverflow { .. } => error!(class = record.name(); "{}", err),
                _ => warn!(class = record.name(); "{}", err),
            })?;

        let metaclass = match record.superclass() {
            Some(superclass) => {
                let super_meta = self.metaclass_record_of(superclass);
                let root_meta = self.record(super_meta).isa().unwrap_or(super_meta);
                let meta_layout = self.record(super_meta).layout().unwrap_or(base);
                self.push_record(record.name(), |_| {
                    ClassRecord::metaclass(Arc::clone(&record.name), super_meta, root_meta, meta_layout)
                })?
            }
            None => self.push_record(record.name(), |index| {
                // A root metaclass inherits from its class and is its own isa.
                let own = ClassHandle::new(index as u32);
                ClassRecord::metaclass(Arc::clone(&record.name), class, own, computed.layout)
            })?,
        };

        for (ivar, offset) in ivars.iter().zip(&computed.offsets) {
            ivar.freeze_offset(*offset);
        }
        // Both cells are empty: the registered check above ran under the same lock.
        let isa_set = record.isa.set(metaclass);
        let layout_set = record.layout.set(computed.layout);
        debug_assert!(
            isa_set.is_ok() && layout_set.is_ok(),
            "class '{}' sealed twice",
            record.name()
        );
        drop(ivars);

        registry.classes.insert(Arc::clone(&record.name), class);
        registry.metaclasses.insert(Arc::clone(&record.name), metaclass);

        debug!(
            class = record.name(),
            size = computed.layout.size,
            alignment = computed.layout.alignment,
            metaclass = metaclass.as_u32();
            "registered class pair"
        );
        Ok(())
    }

    /// Adds an ivar to a draft class.
    ///
    /// The returned descriptor receives its offset when the class is
    /// registered. `alignment` is validated at registration.
    ///
    /// # Errors
    ///
    /// - [`Error::SealedClass`] if `class` is registered
    /// - [`Error::DuplicateIvar`] if `name` is declared by `class` or any
    ///   ancestor
    ///
    /// # Panics
    ///
    /// Panics if `class` was not issued by this runtime.
    pub fn add_ivar(
        &self,
        class: ClassHandle,
        name: &str,
        size: usize,
        alignment: usize,
        type_encoding: &str,
    ) -> Result<Ivar> {
        let record = self.record(class);
        let mut ivars = record.lock_draft()?;

        let duplicate = ivars.iter().any(|ivar| ivar.name() == name)
            || record
                .superclass()
                .is_some_and(|superclass| self.get_instance_variable(superclass, name).is_some());
        if duplicate {
            return Err(Error::DuplicateIvar {
                class: record.name().to_owned(),
                ivar: name.to_owned(),
            });
        }

        let ivar = Ivar::new(name, type_encoding, size, alignment, class);
        ivars.push(ivar.clone());
        Ok(ivar)
    }

    /// Finds an ivar by name on `class` or, failing that, its ancestors.
    ///
    /// # Panics
    ///
    /// Panics if `class` was not issued by this runtime.
    #[must_use]
    pub fn get_instance_variable(&self, class: ClassHandle, name: &str) -> Option<Ivar> {
        self.ancestry(class)
            .find_map(|(_, record)| record.own_ivar(name))
    }

    /// Finds an ivar by name through the metaclass chain of `class`.
    ///
    /// The chain of a root metaclass continues into its root class, so a
    /// root class's ivars are visible here. Returns `None` for a draft.
    ///
    /// # Panics
    ///
    /// Panics if `class` was not issued by this runtime.
    #[must_use]
    pub fn get_class_variable(&self, class: ClassHandle, name: &str) -> Option<Ivar> {
        let metaclass = self.metaclass_of(class)?;
        self.get_instance_variable(metaclass, name)
    }

    /// Returns the class's own ivars in declaration order.
    ///
    /// # Panics
    ///
    /// Panics if `class` was not issued by this runtime.
    #[must_use]
    pub fn copy_ivar_list(&self, class: ClassHandle) -> Box<[Ivar]> {
        self.record(class).ivars()
    }

    /// Looks up a registered class by name.
    #[must_use]
    pub fn get_class(&self, name: &str) -> Option<ClassHandle> {
        self.registry.read().classes.get(name).copied()
    }

    /// Looks up a registered class's metaclass by the class's name.
    #[must_use]
    pub fn get_meta_class(&self, name: &str) -> Option<ClassHandle> {
        self.registry.read().metaclasses.get(name).copied()
    }

    /// Stores the strong-ivar layout blob for a draft class.
    ///
    /// The bytes are never interpreted by the runtime.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SealedClass`] if `class` is registered.
    ///
    /// # Panics
    ///
    /// Panics if `class` was not issued by this runtime.
    pub fn set_ivar_layout(&self, class: ClassHandle, layout: &[u8]) -> Result<()> {
        let record = self.record(class);
        let _draft = record.lock_draft()?;
        *record.ivar_layout.write() = Some(Arc::from(layout));
        Ok(())
    }

    /// Returns the strong-ivar layout blob, if one was set.
    ///
    /// # Panics
    ///
    /// Panics if `class` was not issued by this runtime.
    #[must_use]
    pub fn ivar_layout(&self, class: ClassHandle) -> Option<Arc<[u8]>> {
        self.record(class).ivar_layout.read().clone()
    }

    /// Stores the weak-ivar layout blob for a draft class.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SealedClass`] if `class` is registered.
    ///
    /// # Panics
    ///
    /// Panics if `class` was not issued by this runtime.
    pub fn set_weak_ivar_layout(&self, class: ClassHandle, layout: &[u8]) -> Result<()> {
        let record = self.record(class);
        let _draft = record.lock_draft()?;
        *record.weak_ivar_layout.write() = Some(Arc::from(layout));
        Ok(())
    }

    /// Returns the weak-ivar layout blob, if one was set.
    ///
    /// # Panics
    ///
    /// Panics if `class` was not issued by this runtime.
    #[must_use]
    pub fn weak_ivar_layout(&self, class: ClassHandle) -> Option<Arc<[u8]>> {
        self.record(class).weak_ivar_layout.read().clone()
    }

    fn push_record<F>(&self, name: &str, build: F) -> Result<ClassHandle>
    where
        F: FnOnce(usize) -> ClassRecord,
    {
        let index = self
            .classes
            .push_with(build)
            .map_err(|_| Error::AllocationFailure {
                class: name.to_owned(),
                reason: "class table is full",
            })?;
        // The arena never holds more than u32::MAX entries.
        Ok(ClassHandle::new(index as u32))
    }

    /// The metaclass of a registered, non-meta class.
    fn metaclass_record_of(&self, class: ClassHandle) -> ClassHandle {
        match self.record(class).isa() {
            Some(metaclass) => metaclass,
            None => panic!("registered class {class:?} has no metaclass"),
        }
    }
}
