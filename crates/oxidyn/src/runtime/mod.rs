//! `OxideDyn` runtime module.
//!
//! This module provides the runtime context and everything hanging off it:
//!
//! - [`selector`]: selector interning
//! - [`class`]: class records, the name registry and the class-pair lifecycle
//! - [`layout`]: ivar descriptors and instance layout computation
//! - [`method`]: method tables, resolution and the method cache
//! - [`property`]: property descriptors
//! - [`object`]: instance allocation and ivar accessors
//! - [`introspection`]: class queries and copy lists
//!
//! # Runtime Context
//!
//! A [`Runtime`] owns its selectors and classes. Handles issued by one
//! runtime mean nothing to another. Most programs create exactly one and
//! either pass it around or install it process-wide:
//!
//! ```rust
//! use oxidyn::Runtime;
//!
//! let rt = Runtime::install(Runtime::new()).unwrap();
//! assert!(std::ptr::eq(rt, Runtime::global().unwrap()));
//! assert!(Runtime::install(Runtime::new()).is_err());
//! ```

pub mod class;
pub mod introspection;
pub mod layout;
pub mod method;
pub mod object;
pub mod property;
pub mod selector;

pub use class::ClassHandle;
pub use layout::{InstanceLayout, Ivar};
pub use method::{Imp, Method};
pub use object::Instance;
pub use property::Property;
pub use selector::Selector;

use crate::config::RuntimeConfig;
use crate::error::{Error, Result};
use class::{ClassRecord, Registry};
use oxidyn_log::debug;
use oxidyn_mem::{AppendArena, SymbolTable};
use parking_lot::RwLock;
use std::fmt;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide runtime, set at most once.
static GLOBAL_RUNTIME: OnceLock<Runtime> = OnceLock::new();

/// The runtime context: selector table, class arena and name registry.
///
/// # Thread Safety
///
/// `Runtime` is `Send + Sync`. Every operation takes `&self`:
/// - Selector interning uses a read-locked fast path
/// - Registration is serialised by one registry write lock
/// - Reads of registered layouts and metaclass links are lock-free
pub struct Runtime {
    config: RuntimeConfig,
    selectors: SymbolTable,
    classes: AppendArena<ClassRecord>,
    registry: RwLock<Registry>,
    /// Bumped on every `add_method`; stale method caches compare against it.
    method_generation: AtomicU64,
}

impl Runtime {
    /// Creates a runtime with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    /// Creates a runtime with the given configuration.
    ///
    /// If the configuration carries a log level it is applied to the global
    /// logger.
    #[must_use]
    pub fn with_config(config: RuntimeConfig) -> Self {
        if let Some(level) = config.log_level {
            oxidyn_log::set_level(level);
        }

        debug!(
            classes = config.class_capacity,
            selectors = config.selector_capacity,
            method_cache = config.method_cache;
            "creating runtime"
        );

        Self {
            selectors: SymbolTable::with_capacity(config.selector_capacity),
            classes: AppendArena::with_capacity(config.class_capacity),
            registry: RwLock::new(Registry::with_capacity(config.class_capacity)),
            method_generation: AtomicU64::new(0),
            config,
        }
    }

    /// Returns the configuration this runtime was created with.
    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Installs `runtime` as the process-wide runtime.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyInstalled`] if a runtime was installed before.
    /// The rejected runtime is dropped.
    pub fn install(runtime: Runtime) -> Result<&'static Runtime> {
        GLOBAL_RUNTIME
            .set(runtime)
            .map_err(|_| Error::AlreadyInstalled)?;
        debug!("installed global runtime");
        GLOBAL_RUNTIME.get().ok_or(Error::AlreadyInstalled)
    }

    /// Returns the process-wide runtime, if one was installed.
    #[must_use]
    pub fn global() -> Option<&'static Runtime> {
        GLOBAL_RUNTIME.get()
    }

    /// Returns the process-wide runtime, installing the one built by `init`
    /// if none was installed yet.
    pub fn global_or_init<F>(init: F) -> &'static Runtime
    where
        F: FnOnce() -> Runtime,
    {
        GLOBAL_RUNTIME.get_or_init(|| {
            debug!("installing global runtime on first use");
            init()
        })
    }

    /// Whether `class` was issued by this runtime.
    pub(crate) fn issued(&self, class: ClassHandle) -> bool {
        self.classes.get(class.index()).is_some()
    }

    /// Returns the record behind `class`.
    ///
    /// # Panics
    ///
    /// Panics if `class` was not issued by this runtime.
    pub(crate) fn record(&self, class: ClassHandle) -> &ClassRecord {
        match self.classes.get(class.index()) {
            Some(record) => record,
            None => panic!("invalid class handle {class:?}"),
        }
    }

    /// Iterates over `class` and its superclasses, nearest first.
    pub(crate) fn ancestry(
        &self,
        class: ClassHandle,
    ) -> impl Iterator<Item = (ClassHandle, &ClassRecord)> + '_ {
        std::iter::successors(Some((class, self.record(class))), move |(_, record)| {
            record
                .superclass()
                .map(|superclass| (superclass, self.record(superclass)))
        })
    }

    pub(crate) fn current_method_generation(&self) -> u64 {
        self.method_generation.load(Ordering::Acquire)
    }

    pub(crate) fn bump_method_generation(&self) {
        self.method_generation.fetch_add(1, Ordering::AcqRel);
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("classes", &self.classes.len())
            .field("registered", &self.class_count())
            .field("selectors", &self.selectors.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
