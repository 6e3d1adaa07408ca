//! Resource-owner session tracking for the authorization core.
//!
//! This crate answers one question on behalf of the Authorization Endpoint:
//! does the current request carry a still-valid session, and if so for
//! which subject and at what `auth_time`/`acr`? Credential verification,
//! registration, and account management are out of scope; a deployment's
//! login surface creates sessions here once it has authenticated the user
//! by whatever means it chooses.

pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod service;

pub use config::IdentityConfig;
pub use error::{IdentityError, Result};
pub use models::Session;
pub use repository::{InMemorySessionRepository, SessionRepository};
pub use service::IdentityService;
