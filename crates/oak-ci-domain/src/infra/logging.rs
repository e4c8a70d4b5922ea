//! Logging facade.
//!
//! Infrastructure registers a concrete log function at startup so that the
//! domain crate can emit structured log lines without depending on
//! `tracing` directly.

use std::sync::OnceLock;

/// Severity of a logged event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    /// Fine-grained diagnostic detail.
    Trace,
    /// Debug-level detail, enabled in development.
    Debug,
    /// Normal operational messages.
    Info,
    /// Recoverable problems.
    Warn,
    /// Failures that affect correctness.
    Error,
}

/// Function type the infrastructure layer registers to handle log events.
pub type LogFn = fn(LogLevel, &str, &str, Option<&dyn std::fmt::Display>);

static LOG_FN: OnceLock<LogFn> = OnceLock::new();

/// Registers the log implementation. Call once at startup; subsequent calls
/// are ignored.
pub fn set_log_fn(f: LogFn) {
    let _ = LOG_FN.set(f);
}

/// Dispatches to the registered log function, or no-ops if none is set
/// (e.g. in domain-only unit tests).
#[inline]
pub fn log_operation(
    level: LogLevel,
    context: &str,
    message: &str,
    detail: Option<&dyn std::fmt::Display>,
) {
    if let Some(f) = LOG_FN.get() {
        f(level, context, message, detail);
    }
}

/// Logs at [`LogLevel::Info`].
#[macro_export]
macro_rules! info {
    ($ctx:expr, $msg:expr) => {
        $crate::infra::logging::log_operation($crate::infra::logging::LogLevel::Info, $ctx, $msg, None)
    };
    ($ctx:expr, $msg:expr, $detail:expr) => {
        $crate::infra::logging::log_operation(
            $crate::infra::logging::LogLevel::Info,
            $ctx,
            $msg,
            Some(&$detail as &dyn std::fmt::Display),
        )
    };
}

/// Logs at [`LogLevel::Warn`].
#[macro_export]
macro_rules! warn {
    ($ctx:expr, $msg:expr) => {
        $crate::infra::logging::log_operation($crate::infra::logging::LogLevel::Warn, $ctx, $msg, None)
    };
    ($ctx:expr, $msg:expr, $detail:expr) => {
        $crate::infra::logging::log_operation(
            $crate::infra::logging::LogLevel::Warn,
            $ctx,
            $msg,
            Some(&$detail as &dyn std::fmt::Display),
        )
    };
}

/// Logs at [`LogLevel::Error`].
#[macro_export]
macro_rules! error {
    ($ctx:expr, $msg:expr) => {
        $crate::infra::logging::log_operation($crate::infra::logging::LogLevel::Error, $ctx, $msg, None)
    };
    ($ctx:expr, $msg:expr, $detail:expr) => {
        $crate::infra::logging::log_operation(
            $crate::infra::logging::LogLevel::Error,
            $ctx,
            $msg,
            Some(&$detail as &dyn std::fmt::Display),
        )
    };
}
