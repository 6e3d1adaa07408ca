//! Structured logging with automatic secret redaction for the
//! authorization core: access/refresh tokens, DPoP proofs, private JWKs,
//! and client secrets must never appear verbatim in a log line.

pub mod config;
pub mod macros;
pub mod redactor;

pub use config::LoggerConfig;
pub use redactor::{RedactionConfig, SecretRedactor};
