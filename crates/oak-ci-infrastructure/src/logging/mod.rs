//! Wires the domain's logging facade to `tracing`, and initializes the
//! global subscriber from `OAK_CI_LOG_LEVEL` (spec.md §6.5, §10.1).

use oak_ci_domain::infra::logging::{set_log_fn, LogLevel};
use tracing_subscriber::EnvFilter;

fn forward_to_tracing(level: LogLevel, context: &str, message: &str, detail: Option<&dyn std::fmt::Display>) {
    match (level, detail) {
        (LogLevel::Trace, Some(d)) => tracing::trace!(context, %d, "{message}"),
        (LogLevel::Trace, None) => tracing::trace!(context, "{message}"),
        (LogLevel::Debug, Some(d)) => tracing::debug!(context, %d, "{message}"),
        (LogLevel::Debug, None) => tracing::debug!(context, "{message}"),
        (LogLevel::Info, Some(d)) => tracing::info!(context, %d, "{message}"),
        (LogLevel::Info, None) => tracing::info!(context, "{message}"),
        (LogLevel::Warn, Some(d)) => tracing::warn!(context, %d, "{message}"),
        (LogLevel::Warn, None) => tracing::warn!(context, "{message}"),
        (LogLevel::Error, Some(d)) => tracing::error!(context, %d, "{message}"),
        (LogLevel::Error, None) => tracing::error!(context, "{message}"),
    }
}

/// Initialize the global `tracing` subscriber and register the domain
/// logging facade. Call once, at process startup.
pub fn init() {
    let directive = std::env::var("OAK_CI_LOG_LEVEL")
        .ok()
        .map(|level| match level.to_ascii_uppercase().as_str() {
            "DEBUG" => "debug",
            "WARNING" => "warn",
            "ERROR" => "error",
            _ => "info",
        })
        .unwrap_or("info");
    let filter = EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).json().try_init();
    set_log_fn(forward_to_tracing);
}

/// Mint a short correlation id for one hook request (spec.md §7
/// "Propagation policy" — every error is logged with a correlation id).
#[must_use]
pub fn new_correlation_id() -> String {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    let bytes: [u8; 8] = rng.gen();
    hex::encode(bytes)
}
