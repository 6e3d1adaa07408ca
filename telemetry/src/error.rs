use thiserror::Error;

#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("tracing initialization failed: {0}")]
    TracingInit(String),

    #[error("metrics exporter installation failed: {0}")]
    MetricsInit(String),

    #[error("internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, TelemetryError>;
