//! Method tables and method resolution.
//!
//! Every class record owns a table from [`Selector`] to [`Method`]. Methods
//! can be added at any time, before or after registration; re-adding a
//! selector on the same class replaces the entry.
//!
//! Resolution checks the class's own table, then each superclass in turn,
//! and returns the first match. [`Runtime::lookup_imp`] adds a per-class
//! cache in front of that walk.
//!
//! # Cache Invalidation
//!
//! Adding a method to a class can change what its subclasses resolve, so a
//! single runtime-wide generation counter is bumped on every `add_method`.
//! A class cache built under an older generation is discarded on its next
//! use.

use super::object::Instance;
use super::{ClassHandle, Runtime, Selector};
use fxhash::FxHashMap;
use oxidyn_log::trace;
use parking_lot::RwLock;
use std::ffi::c_void;
use std::fmt;
use std::sync::Arc;

/// `Method` implementation function pointer type.
///
/// The C ABI-compatible shape of every method implementation:
///
/// - First argument: the receiver (an instance's storage, or any opaque
///   reference the caller chooses)
/// - Second argument: the selector being invoked
/// - Third argument: pointer to an array of argument pointers
/// - Fourth argument: pointer to return value storage
///
/// The runtime stores and returns `Imp`s but never calls them; invoking one
/// with arguments marshalled per its type encoding is the caller's job.
///
/// # Safety
///
/// Implementations must validate every pointer before dereferencing it and
/// only write through `ret` when the method returns a value.
pub type Imp = unsafe extern "C" fn(
    receiver: *mut c_void,
    cmd: Selector,
    args: *const *mut c_void,
    ret: *mut c_void,
);

/// A method table entry.
#[derive(Clone)]
pub struct Method {
    selector: Selector,
    imp: Imp,
    types: Arc<str>,
}

impl Method {
    /// The selector this method answers.
    #[must_use]
    pub fn selector(&self) -> Selector {
        self.selector
    }

    /// The implementation pointer.
    #[must_use]
    pub fn imp(&self) -> Imp {
        self.imp
    }

    /// Type encoding string, stored as given.
    #[must_use]
    pub fn type_encoding(&self) -> &str {
        &self.types
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Method")
            .field("selector", &self.selector)
            .field("imp", &(self.imp as *const ()))
            .field("types", &self.types)
            .finish()
    }
}

#[derive(Default)]
struct CacheTable {
    generation: u64,
    entries: FxHashMap<Selector, Imp>,
}

/// Per-class cache of resolved implementations.
#[derive(Default)]
pub(crate) struct MethodCache {
    table: RwLock<CacheTable>,
}

impl MethodCache {
    fn get(&self, generation: u64, selector: Selector) -> Option<Imp> {
        let table = self.table.read();
        if table.generation != generation {
            return None;
        }
        table.entries.get(&selector).copied()
    }

    fn insert(&self, generation: u64, selector: Selector, imp: Imp) {
        let mut table = self.table.write();
        if table.generation != generation {
            // A newer lookup may already have moved the cache forward.
            if table.generation > generation {
                return;
            }
            table.entries.clear();
            table.generation = generation;
        }
        table.entries.insert(selector, imp);
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.table.read().entries.len()
    }
}

impl Runtime {
    /// Adds or replaces a method in the class's own table.
    ///
    /// Returns the entry that was replaced, if any. Allowed before and after
    /// registration.
    ///
    /// # Panics
    ///
    /// Panics if `class` was not issued by this runtime.
    ///
    /// # Example
    ///
    /// ```rust
    /// use oxidyn::{Runtime, Selector};
    /// use std::ffi::c_void;
    ///
    /// unsafe extern "C" fn bark(_: *mut c_void, _: Selector, _: *const *mut c_void, _: *mut c_void) {}
    ///
    /// let rt = Runtime::new();
    /// let dog = rt.allocate_class_pair(None, "Dog", 0).unwrap();
    /// let sel = rt.register_selector("bark");
    ///
    /// assert!(rt.add_method(dog, sel, bark, "v@:").is_none());
    /// assert!(rt.add_method(dog, sel, bark, "v@:").is_some());
    /// assert!(rt.resolve_method(dog, sel).is_some());
    /// ```
    pub fn add_method(
        &self,
        class: ClassHandle,
        selector: Selector,
        imp: Imp,
        type_encoding: &str,
    ) -> Option<Method> {
        let record = self.record(class);
        let method = Method {
            selector,
            imp,
            types: Arc::from(type_encoding),
        };

        let previous = record.methods.write().insert(selector, method);
        self.bump_method_generation();

        trace!(
            class = record.name(),
            selector = selector.as_u32(),
            replaced = previous.is_some();
            "added method"
        );
        previous
    }

    /// Resolves `selector` on `class`, walking up the superclass chain.
    ///
    /// # Panics
    ///
    /// Panics if `class` was not issued by this runtime.
    #[must_use]
    pub fn resolve_method(&self, class: ClassHandle, selector: Selector) -> Option<Method> {
        self.ancestry(class)
            .find_map(|(_, record)| record.methods.read().get(&selector).cloned())
    }

    /// Resolves `selector` to its implementation, consulting the class's
    /// method cache first when caching is enabled.
    ///
    /// # Panics
    ///
    /// Panics if `class` was not issued by this runtime.
    #[must_use]
    pub fn lookup_imp(&self, class: ClassHandle, selector: Selector) -> Option<Imp> {
        if !self.config.method_cache {
            return self.resolve_method(class, selector).map(|method| method.imp);
        }

        let record = self.record(class);
        let generation = self.current_method_generation();

        if let Some(imp) = record.cache.get(generation, selector) {
            return Some(imp);
        }

        let imp = self.resolve_method(class, selector)?.imp;
        record.cache.insert(generation, selector, imp);
        Some(imp)
    }

    /// Alias of [`resolve_method`](Self::resolve_method) for instance
    /// methods.
    #[must_use]
    pub fn instance_method(&self, class: ClassHandle, selector: Selector) -> Option<Method> {
        self.resolve_method(class, selector)
    }

    /// Resolves a class method, i.e. `selector` on the metaclass of `class`.
    ///
    /// Returns `None` for drafts, which have no metaclass yet.
    ///
    /// # Panics
    ///
    /// Panics if `class` was not issued by this runtime.
    #[must_use]
    pub fn class_method(&self, class: ClassHandle, selector: Selector) -> Option<Method> {
        let metaclass = self.metaclass_of(class)?;
        self.resolve_method(metaclass, selector)
    }

    /// Returns `true` if instances of `class` resolve `selector`.
    ///
    /// # Panics
    ///
    /// Panics if `class` was not issued by this runtime.
    #[must_use]
    pub fn responds_to_selector(&self, class: ClassHandle, selector: Selector) -> bool {
        self.lookup_imp(class, selector).is_some()
    }

    /// Resolves `selector` for `instance`'s class.
    ///
    /// # Panics
    ///
    /// Panics if `instance` was not created by this runtime.
    #[must_use]
    pub fn msg_lookup(&self, instance: &Instance, selector: Selector) -> Option<Imp> {
        self.lookup_imp(instance.class(), selector)
    }

    /// Returns the class's own methods, ordered by selector.
    ///
    /// # Panics
    ///
    /// Panics if `class` was not issued by this runtime.
    #[must_use]
    pub fn copy_method_list(&self, class: ClassHandle) -> Box<[Method]> {
        let mut methods: Vec<Method> = self
            .record(class)
            .methods
            .read()
            .values()
            .cloned()
            .collect();
        methods.sort_by_key(Method::selector);
        methods.into_boxed_slice()
    }
}
