//! Conditional logging macros for library-level tracing.
//!
//! When the `logging` feature is enabled, these macros forward to tracing.
//! When disabled, they compile to no-ops with zero runtime cost.
//!
//! # Example
//!
//! ```rust,ignore
//! use crate::logging::{info, debug};
//!
//! info!(namespace = %namespace, "module created");
//! debug!(function = name, args = args.len(), "invoking guest function");
//! ```

/// Emit a trace-level log (very detailed internal operations).
#[cfg(feature = "logging")]
macro_rules! log_trace {
    ($($arg:tt)*) => { tracing::trace!($($arg)*) }
}

#[cfg(not(feature = "logging"))]
macro_rules! log_trace {
    ($($arg:tt)*) => {};
}

/// Emit a debug-level log (operation details useful for debugging).
#[cfg(feature = "logging")]
macro_rules! log_debug {
    ($($arg:tt)*) => { tracing::debug!($($arg)*) }
}

#[cfg(not(feature = "logging"))]
macro_rules! log_debug {
    ($($arg:tt)*) => {};
}

/// Emit an info-level log (high-level lifecycle events).
#[cfg(feature = "logging")]
macro_rules! log_info {
    ($($arg:tt)*) => { tracing::info!($($arg)*) }
}

#[cfg(not(feature = "logging"))]
macro_rules! log_info {
    ($($arg:tt)*) => {};
}

/// Emit a warn-level log (unexpected but handled situations).
#[cfg(feature = "logging")]
macro_rules! log_warn {
    ($($arg:tt)*) => { tracing::warn!($($arg)*) }
}

#[cfg(not(feature = "logging"))]
macro_rules! log_warn {
    ($($arg:tt)*) => {};
}

/// Emit an error-level log (failures that will propagate as errors).
#[cfg(feature = "logging")]
macro_rules! log_error {
    ($($arg:tt)*) => { tracing::error!($($arg)*) }
}

#[cfg(not(feature = "logging"))]
macro_rules! log_error {
    ($($arg:tt)*) => {};
}

pub(crate) use log_debug as debug;
pub(crate) use log_error as error;
pub(crate) use log_info as info;
pub(crate) use log_trace as trace;
pub(crate) use log_warn as warn;

/// Severity a guest attaches to a line sent through `wasify.log`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum LogSeverity {
    Debug = 1,
    #[default]
    Info = 2,
    Warning = 3,
    Error = 4,
}

impl LogSeverity {
    /// Map a guest severity byte; unknown values fall back to [`LogSeverity::Info`].
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            1 => Self::Debug,
            3 => Self::Warning,
            4 => Self::Error,
            _ => Self::Info,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

impl From<u8> for LogSeverity {
    fn from(byte: u8) -> Self {
        Self::from_byte(byte)
    }
}

impl std::fmt::Display for LogSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_from_byte() {
        assert_eq!(LogSeverity::from(1), LogSeverity::Debug);
        assert_eq!(LogSeverity::from(2), LogSeverity::Info);
        assert_eq!(LogSeverity::from(3), LogSeverity::Warning);
        assert_eq!(LogSeverity::from(4), LogSeverity::Error);
        assert_eq!(LogSeverity::from(0), LogSeverity::Info);
        assert_eq!(LogSeverity::from(200), LogSeverity::Info);
    }
}
