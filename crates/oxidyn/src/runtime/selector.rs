//! `Selector` interning for the `OxideDyn` runtime.
//!
//! Each [`Runtime`] owns a selector table that maps method names to
//! [`Selector`] handles. Each unique name has exactly one handle for the life
//! of the runtime, so comparison and hashing never touch string data.
//!
//! # Thread Safety
//!
//! Interning is safe from any number of threads. Lookups of names seen before
//! take only a read lock; a new name takes the write lock once and is checked
//! again under it, so two threads racing on one unseen name get one handle.

use super::Runtime;
use crate::error::{Error, Result};
use oxidyn_log::trace;
use oxidyn_mem::Symbol;
use std::fmt;

/// An interned method name.
///
/// Selectors are plain `u32` handles (`#[repr(transparent)]`), so they pass
/// through an `extern "C"` [`Imp`](super::Imp) unchanged. Equality is handle
/// identity.
///
/// # Example
///
/// ```rust
/// use oxidyn::Runtime;
///
/// let rt = Runtime::new();
/// let sel1 = rt.register_selector("init");
/// let sel2 = rt.register_selector("init");
///
/// assert_eq!(sel1, sel2);
/// assert_eq!(rt.selector_name(sel1).unwrap(), "init");
/// ```
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Selector(Symbol);

impl Selector {
    /// Returns the raw handle value.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0.as_u32()
    }

    /// Rebuilds a selector from a raw handle value.
    ///
    /// A value the runtime never issued is safe to hold; asking the runtime
    /// for its name yields [`Error::UnknownSelector`].
    #[must_use]
    pub const fn from_u32(raw: u32) -> Self {
        Self(Symbol::new(raw))
    }
}

impl fmt::Debug for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Selector({})", self.as_u32())
    }
}

impl Runtime {
    /// Returns the selector for `name`, interning it if necessary.
    ///
    /// # Panics
    ///
    /// Panics if the selector table already holds `u32::MAX` names.
    pub fn register_selector(&self, name: &str) -> Selector {
        let symbol = self
            .selectors
            .intern(name)
            .unwrap_or_else(|err| panic!("selector table exhausted: {err}"));

        trace!(selector = name, id = symbol.as_u32(); "registered selector");
        Selector(symbol)
    }

    /// Returns the name `selector` was interned from.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownSelector`] if this runtime did not issue
    /// `selector`.
    pub fn selector_name(&self, selector: Selector) -> Result<&str> {
        self.selectors
            .resolve(selector.0)
            .ok_or(Error::UnknownSelector {
                id: selector.as_u32(),
            })
    }

    /// Looks up the selector for `name` without interning it.
    #[must_use]
    pub fn find_selector(&self, name: &str) -> Option<Selector> {
        self.selectors.get(name).map(Selector)
    }

    /// Number of distinct selectors interned so far.
    #[must_use]
    pub fn selector_count(&self) -> usize {
        self.selectors.len()
    }
}
