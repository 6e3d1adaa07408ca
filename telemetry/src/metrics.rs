//! Prometheus metrics handle, installed once at process startup and shared
//! with the `/metrics` HTTP handler.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::error::{Result, TelemetryError};

/// Installs the global `metrics` recorder and returns the handle used to
/// render the current snapshot as Prometheus exposition text.
pub fn install_recorder() -> Result<PrometheusHandle> {
    PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}
