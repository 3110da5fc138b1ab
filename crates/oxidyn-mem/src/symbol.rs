//! Symbol handles for interned strings.
//!
//! A [`Symbol`] is a dense 32-bit identifier handed out by a
//! [`SymbolTable`](crate::SymbolTable). Two symbols from the same table are
//! equal exactly when their strings are equal, so comparison never touches
//! string data.
//!
//! # Examples
//!
//! ```
//! use oxidyn_mem::Symbol;
//!
//! let sym1 = Symbol::new(42);
//! let sym2 = Symbol::new(42);
//! let sym3 = Symbol::new(100);
//!
//! assert_eq!(sym1, sym2);
//! assert_ne!(sym1, sym3);
//! assert_eq!(sym1.as_u32(), 42);
//! ```

use std::fmt;

/// A handle to an interned string.
///
/// `#[repr(transparent)]` over `u32`, so it can cross an `extern "C"`
/// boundary unchanged.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Symbol(u32);

impl Symbol {
    /// Creates a symbol from a raw ID.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw ID.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Returns the raw ID as an index.
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({})", self.0)
    }
}

impl From<u32> for Symbol {
    fn from(id: u32) -> Self {
        Self(id)
    }
}
