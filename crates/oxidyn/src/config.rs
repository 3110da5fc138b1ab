//! Runtime configuration.
//!
//! [`RuntimeConfig`] carries capacity hints for the class and selector
//! tables, the method-cache switch and an optional log level. It can be
//! built in code or read from the environment:
//!
//! | Variable              | Values                                 |
//! |-----------------------|----------------------------------------|
//! | `OXIDYN_METHOD_CACHE` | `1`/`true`/`on`/`yes`, `0`/`false`/`off`/`no` |
//! | `OXIDYN_LOG`          | `error`, `warn`, `info`, `debug`, `trace` |
//!
//! # Example
//!
//! ```rust
//! use oxidyn::{Runtime, RuntimeConfig};
//! use oxidyn_log::Level;
//!
//! let config = RuntimeConfig::default()
//!     .with_class_capacity(512)
//!     .with_method_cache(false)
//!     .with_log_level(Level::Warn);
//!
//! let rt = Runtime::with_config(config);
//! assert!(!rt.config().method_cache);
//! ```

use oxidyn_log::{Level, warn};

/// Environment variable toggling the method cache.
pub const METHOD_CACHE_ENV: &str = "OXIDYN_METHOD_CACHE";

/// Settings applied when a [`Runtime`](crate::Runtime) is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Number of class records to reserve space for up front.
    pub class_capacity: usize,
    /// Number of selectors to reserve space for up front.
    pub selector_capacity: usize,
    /// Whether `lookup_imp` caches resolved implementations per class.
    pub method_cache: bool,
    /// Level applied to the global logger, if any.
    pub log_level: Option<Level>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            class_capacity: 64,
            selector_capacity: 256,
            method_cache: true,
            log_level: None,
        }
    }
}

impl RuntimeConfig {
    /// Sets the class table capacity hint.
    #[must_use]
    pub fn with_class_capacity(mut self, capacity: usize) -> Self {
        self.class_capacity = capacity;
        self
    }

    /// Sets the selector table capacity hint.
    #[must_use]
    pub fn with_selector_capacity(mut self, capacity: usize) -> Self {
        self.selector_capacity = capacity;
        self
    }

    /// Enables or disables the per-class method cache.
    #[must_use]
    pub fn with_method_cache(mut self, enabled: bool) -> Self {
        self.method_cache = enabled;
        self
    }

    /// Sets the level applied to the global logger.
    #[must_use]
    pub fn with_log_level(mut self, level: Level) -> Self {
        self.log_level = Some(level);
        self
    }

    /// Builds a configuration from defaults overridden by the environment.
    ///
    /// Unrecognised values are reported at warn level and ignored.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(flag) = lookup(METHOD_CACHE_ENV) {
            match parse_flag(&flag) {
                Some(enabled) => config.method_cache = enabled,
                None => warn!(var = METHOD_CACHE_ENV, value = flag; "ignoring unrecognised flag"),
            }
        }

        if let Some(level) = lookup(oxidyn_log::ENV_VAR) {
            match level.parse::<Level>() {
                Ok(level) => config.log_level = Some(level),
                Err(err) => warn!(var = oxidyn_log::ENV_VAR; "{}", err),
            }
        }

        config
    }
}

fn parse_flag(flag: &str) -> Option<bool> {
    match flag.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Some(true),
        "0" | "false" | "off" | "no" => Some(false),
        _ => None,
    }
}
