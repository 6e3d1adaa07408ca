//! Observability bootstrap for the authorization core: `tracing` init,
//! a Prometheus metrics handle, and `/health` readiness data.

pub mod error;
pub mod health;
pub mod metrics;
pub mod tracing_init;

pub use error::{Result, TelemetryError};
pub use health::{HealthMonitor, HealthSnapshot};
pub use metrics::install_recorder;
pub use tracing_init::{init as init_tracing, LogFormat};
