//! Concurrent string interning with `u32` handles.
//!
//! [`SymbolTable`] assigns each distinct string a unique [`Symbol`] and can
//! resolve a symbol back to its string. It is shared between threads by
//! reference; interning takes `&self`.
//!
//! # Design
//!
//! The table keeps two structures:
//! - `strings`: an [`AppendArena`] mapping Symbol → string (lock-free reads)
//! - `symbols`: a hash map from string → Symbol behind an `RwLock`
//!
//! Interning first probes `symbols` under a read lock. On a miss it takes the
//! write lock and probes again before appending, so two threads racing on the
//! same unseen string always agree on one symbol.
//!
//! # Examples
//!
//! ```
//! use oxidyn_mem::SymbolTable;
//!
//! let table = SymbolTable::new();
//!
//! let sym1 = table.intern("initWithFrame:").unwrap();
//! let sym2 = table.intern("initWithFrame:").unwrap();
//! let sym3 = table.intern("dealloc").unwrap();
//!
//! assert_eq!(sym1, sym2);
//! assert_ne!(sym1, sym3);
//! assert_eq!(table.resolve(sym1), Some("initWithFrame:"));
//! ```

use crate::arena::{AppendArena, ArenaFull};
use crate::symbol::Symbol;
use fxhash::FxBuildHasher;
use hashbrown::HashMap;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

/// Thread-safe string interner.
pub struct SymbolTable {
    /// Symbol ID → string
    strings: AppendArena<Arc<str>>,
    /// String → Symbol ID
    symbols: RwLock<HashMap<Arc<str>, Symbol, FxBuildHasher>>,
}

impl SymbolTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Creates an empty table sized for roughly `capacity` strings.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            strings: AppendArena::with_capacity(capacity),
            symbols: RwLock::new(HashMap::with_capacity_and_hasher(
                capacity,
                FxBuildHasher::default(),
            )),
        }
    }

    /// Interns `s`, returning the existing symbol if it was seen before.
    ///
    /// # Errors
    ///
    /// Returns [`ArenaFull`] if the table already holds `u32::MAX` strings.
    pub fn intern(&self, s: &str) -> Result<Symbol, ArenaFull> {
        if let Some(&sym) = self.symbols.read().get(s) {
            return Ok(sym);
        }

        let mut symbols = self.symbols.write();

        // Another thread may have interned it while we waited.
        if let Some(&sym) = symbols.get(s) {
            return Ok(sym);
        }

        let owned: Arc<str> = Arc::from(s);
        let index = self.strings.push(Arc::clone(&owned))?;
        let id = u32::try_from(index).map_err(|_| ArenaFull { len: index })?;
        let sym = Symbol::new(id);
        symbols.insert(owned, sym);

        Ok(sym)
    }

    /// Looks up `s` without interning it.
    #[must_use]
    pub fn get(&self, s: &str) -> Option<Symbol> {
        self.symbols.read().get(s).copied()
    }

    /// Resolves a symbol back to its string.
    ///
    /// Returns `None` for symbols this table never handed out.
    #[must_use]
    pub fn resolve(&self, sym: Symbol) -> Option<&str> {
        self.strings.get(sym.as_usize()).map(|s| &**s)
    }

    /// Number of interned strings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    /// Returns `true` if nothing has been interned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SymbolTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SymbolTable")
            .field("len", &self.len())
            .finish()
    }
}
