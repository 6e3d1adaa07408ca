//! Shared error taxonomy for the authorization core.
//!
//! `RustCareError` is the uniform envelope used at the HTTP boundary
//! (`idp-server`); each library crate still defines its own `thiserror`
//! enum for its internal failure modes and converts into this type only
//! when crossing into a handler's `IntoResponse` impl.
//!
//! # Error Categories
//!
//! - **ValidationError**: malformed request parameters
//! - **AuthenticationError**: client or resource-owner authentication failure
//! - **AuthorizationError**: consent, scope, or policy denial
//! - **BusinessLogicError**: protocol-state violations (code reuse, token theft)
//! - **SystemError**: signing, storage, or other infrastructure faults

pub mod codes;
pub mod context;
pub mod reporting;
pub mod sanitization;
pub mod types;

pub use codes::*;
pub use context::*;
pub use reporting::*;
pub use types::*;
