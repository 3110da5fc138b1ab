//! A minimal, zero-dependency logging crate for the `OxideDyn` runtime.
//!
//! This crate provides thread-safe leveled logging with automatic module path
//! detection, colored terminal output on stderr, and optional structured
//! `key = value` fields.
//!
//! # Example
//!
//! ```
//! use oxidyn_log::{debug, error, info, warn, Level};
//!
//! // Set the minimum log level
//! oxidyn_log::set_level(Level::Debug);
//!
//! let class = "Dog";
//! info!("registered class {}", class);
//! debug!(class = class, size = 8; "layout computed");
//! warn!("duplicate class name");
//! error!(requested = usize::MAX; "instance size overflow");
//! ```
//!
//! The level can also be taken from the `OXIDYN_LOG` environment variable:
//!
//! ```
//! // Leaves the level unchanged when OXIDYN_LOG is unset.
//! let _ = oxidyn_log::init_from_env();
//! ```

use std::fmt::{self, Arguments};
use std::io::Write;
use std::str::FromStr;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU8, Ordering};

/// Environment variable read by [`init_from_env`].
pub const ENV_VAR: &str = "OXIDYN_LOG";

/// Log levels representing the severity/priority of log messages.
///
/// `Levels` are ordered from most severe (Error) to least severe (Trace).
/// Lower numeric values indicate higher severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    /// Critical failures
    Error = 0,
    /// Rejected operations and suspicious input
    Warn = 1,
    /// Informational messages
    Info = 2,
    /// Lifecycle events (class allocation, registration)
    Debug = 3,
    /// Hot-path events (selector interning)
    Trace = 4,
}

impl Level {
    const fn color_code(self) -> &'static str {
        match self {
            Level::Error => "\x1b[31m",
            Level::Warn => "\x1b[33m",
            Level::Info => "\x1b[32m",
            Level::Debug => "\x1b[36m",
            Level::Trace => "\x1b[35m",
        }
    }

    /// Returns the upper-case name of this level.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Level::Error => "ERROR",
            Level::Warn => "WARN",
            Level::Info => "INFO",
            Level::Debug => "DEBUG",
            Level::Trace => "TRACE",
        }
    }

    const fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Level::Error,
            1 => Level::Warn,
            2 => Level::Info,
            3 => Level::Debug,
            _ => Level::Trace,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string does not name a [`Level`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseLevelError(String);

impl fmt::Display for ParseLevelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid log level: {}", self.0)
    }
}

impl std::error::Error for ParseLevelError {}

impl FromStr for Level {
    type Err = ParseLevelError;

    /// Parses a level name, ignoring case and surrounding whitespace.
    ///
    /// # Example
    ///
    /// ```
    /// use oxidyn_log::Level;
    ///
    /// assert_eq!("error".parse(), Ok(Level::Error));
    /// assert_eq!(" INFO ".parse(), Ok(Level::Info));
    /// assert!("invalid".parse::<Level>().is_err());
    /// ```
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ERROR" => Ok(Level::Error),
            "WARN" | "WARNING" => Ok(Level::Warn),
            "INFO" => Ok(Level::Info),
            "DEBUG" => Ok(Level::Debug),
            "TRACE" => Ok(Level::Trace),
            _ => Err(ParseLevelError(s.to_owned())),
        }
    }
}

/// The global logger instance.
///
/// This struct uses atomic operations for thread-safe level management.
/// It is intended to be used as a singleton via [`get_logger`].
pub struct Logger {
    level: AtomicU8,
}

impl Logger {
    const fn new(level: Level) -> Self {
        Logger {
            level: AtomicU8::new(level as u8),
        }
    }

    /// Sets the minimum log level.
    pub fn set_level(&self, level: Level) {
        self.level.store(level as u8, Ordering::SeqCst);
    }

    /// Returns the current minimum log level.
    pub fn level(&self) -> Level {
        Level::from_u8(self.level.load(Ordering::Relaxed))
    }

    /// Checks if a message at the given level would be logged.
    #[inline]
    pub fn enabled(&self, level: Level) -> bool {
        level as u8 <= self.level.load(Ordering::Relaxed)
    }
}

static LOGGER: OnceLock<Logger> = OnceLock::new();

/// Returns the global logger, initialising it at `Level::Warn` on first use.
pub fn get_logger() -> &'static Logger {
    LOGGER.get_or_init(|| Logger::new(Level::Warn))
}

/// Sets the minimum log level for the global logger.
pub fn set_level(level: Level) {
    get_logger().set_level(level);
}

/// Sets the minimum log level from a string.
///
/// # Errors
///
/// Returns [`ParseLevelError`] if `s` does not name a level; the current
/// level is left unchanged.
///
/// # Example
///
/// ```
/// use oxidyn_log::set_level_from_str;
///
/// set_level_from_str("debug").unwrap();
/// ```
pub fn set_level_from_str(s: &str) -> Result<(), ParseLevelError> {
    set_level(s.parse()?);
    Ok(())
}

/// Reads the level named by `OXIDYN_LOG`, if the variable is set.
///
/// # Errors
///
/// Returns [`ParseLevelError`] if the variable is set to an unknown level.
pub fn env_level() -> Result<Option<Level>, ParseLevelError> {
    std::env::var(ENV_VAR).ok().map(|v| v.parse()).transpose()
}

/// Applies the level named by `OXIDYN_LOG` to the global logger.
///
/// Returns the level applied, or `None` when the variable is unset.
///
/// # Errors
///
/// Returns [`ParseLevelError`] if the variable is set to an unknown level.
pub fn init_from_env() -> Result<Option<Level>, ParseLevelError> {
    let level = env_level()?;
    if let Some(level) = level {
        set_level(level);
    }
    Ok(level)
}

/// A structured field attached to a log line.
#[doc(hidden)]
pub type Field<'a> = (&'static str, &'a dyn fmt::Debug);

/// Formats one log line without the trailing newline.
#[doc(hidden)]
pub fn __format_record(
    level: Level,
    target: &str,
    args: Arguments<'_>,
    fields: &[Field<'_>],
) -> String {
    const RESET: &str = "\x1b[0m";

    let mut line = format!(
        "{color}[{level}]{RESET} {target}: {args}",
        color = level.color_code(),
        level = level.as_str(),
    );
    for (key, value) in fields {
        line.push_str(&format!(" {key}={value:?}"));
    }
    line
}

/// Writes one record to stderr. Called by the macros after the level check.
#[doc(hidden)]
pub fn __log_with_target(level: Level, target: &str, args: Arguments<'_>, fields: &[Field<'_>]) {
    if !get_logger().enabled(level) {
        return;
    }

    let line = __format_record(level, target, args, fields);
    let mut stderr = std::io::stderr().lock();
    // A closed stderr is not worth failing the caller over.
    let _ = writeln!(stderr, "{line}");
}

/// The primary logging macro.
///
/// Logs a message at the specified level, capturing the calling module path.
/// Structured fields go before the message, separated from it by `;`.
///
/// # Example
///
/// ```
/// use oxidyn_log::{log, Level};
///
/// log!(level: Level::Info, "plain message: {}", 42);
/// log!(level: Level::Info, class = "Dog", ivars = 2; "with fields");
/// ```
#[macro_export]
macro_rules! log {
    (level: $level:expr, $($key:ident = $value:expr),+ ; $($arg:tt)+) => {{
        let level = $level;
        if $crate::get_logger().enabled(level) {
            $crate::__log_with_target(
                level,
                module_path!(),
                format_args!($($arg)+),
                &[$((stringify!($key), &$value as &dyn ::core::fmt::Debug)),+],
            );
        }
    }};
    (level: $level:expr, $($arg:tt)+) => {{
        let level = $level;
        if $crate::get_logger().enabled(level) {
            $crate::__log_with_target(level, module_path!(), format_args!($($arg)+), &[]);
        }
    }};
}

/// Logs a message at the Error level.
#[macro_export]
macro_rules! error {
    ($($arg:tt)+) => {
        $crate::log!(level: $crate::Level::Error, $($arg)+)
    };
}

/// Logs a message at the Warn level.
#[macro_export]
macro_rules! warn {
    ($($arg:tt)+) => {
        $crate::log!(level: $crate::Level::Warn, $($arg)+)
    };
}

/// Logs a message at the Info level.
#[macro_export]
macro_rules! info {
    ($($arg:tt)+) => {
        $crate::log!(level: $crate::Level::Info, $($arg)+)
    };
}

/// Logs a message at the Debug level.
///
/// # Example
///
/// ```
/// use oxidyn_log::debug;
///
/// # oxidyn_log::set_level(oxidyn_log::Level::Debug);
/// debug!(class = "Animal", extra_bytes = 0; "allocated class pair");
/// ```
#[macro_export]
macro_rules! debug {
    ($($arg:tt)+) => {
        $crate::log!(level: $crate::Level::Debug, $($arg)+)
    };
}

/// Logs a message at the Trace level.
#[macro_export]
macro_rules! trace {
    ($($arg:tt)+) => {
        $crate::log!(level: $crate::Level::Trace, $($arg)+)
    };
}
