//! `OxideDyn`: a dynamic object-model runtime for Rust
//!
//! `OxideDyn` lets callers define classes at run time, attach instance
//! variables (ivars), properties and methods to them, allocate instances with
//! a computed memory layout, and resolve method implementations by selector
//! through the inheritance chain. It provides:
//!
//! - **Selector interning** with stable, identity-comparable handles
//! - **Class pairs** (class + metaclass) with a draft → registered lifecycle
//! - **Layout computation** for ivar offsets, alignment and instance size
//! - **Method resolution** through the superclass chain, with an optional cache
//! - **Instances** as owned, zero-initialised storage with ivar accessors
//!
//! # Architecture
//!
//! All state lives in an explicit [`Runtime`] context:
//!
//! - **Class records** sit in an append-only arena and are addressed by
//!   [`ClassHandle`], never by raw address
//! - **Selectors** are interned in a per-runtime symbol table
//! - **Registration** freezes the layout in write-once cells, so reads of
//!   registered classes need no locking
//!
//! A runtime can optionally be installed process-wide with
//! [`Runtime::install`] and fetched with [`Runtime::global`]. The [`ffi`]
//! module exposes that process-wide runtime through a C ABI.
//!
//! # Example
//!
//! ```rust
//! use oxidyn::Runtime;
//!
//! let rt = Runtime::new();
//!
//! let animal = rt.allocate_class_pair(None, "Animal", 0).unwrap();
//! let age = rt.add_ivar(animal, "age", 4, 4, "i").unwrap();
//! rt.register_class_pair(animal).unwrap();
//!
//! let dog = rt.allocate_class_pair(Some(animal), "Dog", 0).unwrap();
//! let breed = rt.add_ivar(dog, "breedId", 4, 4, "i").unwrap();
//! rt.register_class_pair(dog).unwrap();
//!
//! assert_eq!(age.offset(), Some(0));
//! assert_eq!(breed.offset(), Some(4));
//! assert_eq!(rt.instance_size(dog), Some(8));
//!
//! let mut rex = rt.create_instance(dog, 0).unwrap();
//! rex.set_ivar(&breed, 7 as *mut std::ffi::c_void);
//! assert_eq!(rex.get_ivar(&breed) as usize, 7);
//! assert!(rex.get_ivar(&age).is_null());
//! ```

pub mod config;
pub mod error;
pub mod ffi;
pub mod runtime;

// Re-export commonly used types
pub use config::RuntimeConfig;
pub use error::{Error, Result};
pub use runtime::{
    ClassHandle, Imp, Instance, InstanceLayout, Ivar, Method, Property, Runtime, Selector,
};
