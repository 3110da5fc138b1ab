//! Runtime introspection.
//!
//! Queries about class records: names, links, registration state, sizes and
//! the list of published classes. All of these are read-only and, for
//! registered classes, lock-free apart from the registry-wide queries.
//!
//! # Example
//!
//! ```rust
//! use oxidyn::Runtime;
//!
//! let rt = Runtime::new();
//! let shape = rt.allocate_class_pair(None, "Shape", 0).unwrap();
//! rt.register_class_pair(shape).unwrap();
//! let circle = rt.allocate_class_pair(Some(shape), "Circle", 0).unwrap();
//! rt.register_class_pair(circle).unwrap();
//!
//! assert_eq!(rt.class_name(circle), "Circle");
//! assert_eq!(rt.superclass(circle), Some(shape));
//! assert!(rt.is_subclass_of(circle, shape));
//! assert_eq!(rt.class_count(), 2);
//! ```

use super::{ClassHandle, Runtime};

impl Runtime {
    /// Name of a class or metaclass.
    ///
    /// # Panics
    ///
    /// Panics if `class` was not issued by this runtime.
    #[must_use]
    pub fn class_name(&self, class: ClassHandle) -> &str {
        self.record(class).name()
    }

    /// Direct superclass, or `None` for a root class.
    ///
    /// # Panics
    ///
    /// Panics if `class` was not issued by this runtime.
    #[must_use]
    pub fn superclass(&self, class: ClassHandle) -> Option<ClassHandle> {
        self.record(class).superclass()
    }

    /// Returns `true` for metaclass records.
    ///
    /// # Panics
    ///
    /// Panics if `class` was not issued by this runtime.
    #[must_use]
    pub fn is_metaclass(&self, class: ClassHandle) -> bool {
        self.record(class).is_metaclass()
    }

    /// The class of `class` viewed as an object.
    ///
    /// For a registered class this is its metaclass; for a metaclass it is
    /// the root metaclass. Drafts have none.
    ///
    /// # Panics
    ///
    /// Panics if `class` was not issued by this runtime.
    #[must_use]
    pub fn metaclass_of(&self, class: ClassHandle) -> Option<ClassHandle> {
        self.record(class).isa()
    }

    /// Returns `true` once `class` has been registered. Metaclasses always
    /// are.
    ///
    /// # Panics
    ///
    /// Panics if `class` was not issued by this runtime.
    #[must_use]
    pub fn is_registered(&self, class: ClassHandle) -> bool {
        self.record(class).is_registered()
    }

    /// Instance size in bytes, or `None` for a draft.
    ///
    /// # Panics
    ///
    /// Panics if `class` was not issued by this runtime.
    #[must_use]
    pub fn instance_size(&self, class: ClassHandle) -> Option<usize> {
        self.record(class).layout().map(|layout| layout.size)
    }

    /// Full instance layout (size and alignment), or `None` for a draft.
    ///
    /// # Panics
    ///
    /// Panics if `class` was not issued by this runtime.
    #[must_use]
    pub fn instance_layout(&self, class: ClassHandle) -> Option<super::InstanceLayout> {
        self.record(class).layout()
    }

    /// Returns `true` if `ancestor` is `class` or one of its superclasses.
    ///
    /// # Panics
    ///
    /// Panics if `class` was not issued by this runtime.
    #[must_use]
    pub fn is_subclass_of(&self, class: ClassHandle, ancestor: ClassHandle) -> bool {
        self.ancestry(class).any(|(handle, _)| handle == ancestor)
    }

    /// All published (non-meta) classes, in allocation order.
    #[must_use]
    pub fn class_list(&self) -> Box<[ClassHandle]> {
        let mut classes: Vec<ClassHandle> =
            self.registry.read().classes.values().copied().collect();
        classes.sort_unstable();
        classes.into_boxed_slice()
    }

    /// Number of published (non-meta) classes.
    #[must_use]
    pub fn class_count(&self) -> usize {
        self.registry.read().classes.len()
    }
}
