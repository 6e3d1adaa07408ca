//! `tracing`/`tracing-subscriber` bootstrap for the authorization core.
//!
//! Every binary in the workspace calls [`init`] exactly once at startup;
//! library crates only ever emit `tracing` events and never configure a
//! subscriber themselves.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{Result, TelemetryError};

/// Output shape for the process's log stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable, for local development.
    Pretty,
    /// Newline-delimited JSON, for production log aggregation.
    Json,
}

/// Initializes the global `tracing` subscriber. `RUST_LOG` (or `default_filter`
/// if unset) controls verbosity; secrets never reach this layer directly —
/// callers redact request/response bodies via `logger-redacted` before
/// logging them.
pub fn init(format: LogFormat, default_filter: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let registry = tracing_subscriber::registry().with(filter);

    let result = match format {
        LogFormat::Json => registry.with(fmt::layer().json().with_current_span(true)).try_init(),
        LogFormat::Pretty => registry.with(fmt::layer().pretty()).try_init(),
    };

    result.map_err(|e| TelemetryError::TracingInit(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_twice_in_the_same_process_reports_an_error_rather_than_panicking() {
        let _ = init(LogFormat::Pretty, "info");
        assert!(init(LogFormat::Pretty, "info").is_err());
    }
}
