//! `OxideDyn` memory management infrastructure
//!
//! This crate provides the storage primitives underneath the `OxideDyn`
//! runtime:
//!
//! - **Append arenas**: index-addressed, append-only storage with lock-free
//!   reads and stable references
//! - **Symbol tables**: concurrent string interning with `u32` handles
//!

pub mod arena;
pub mod interner;
pub mod symbol;

pub use arena::AppendArena;
pub use interner::SymbolTable;
pub use symbol::Symbol;
