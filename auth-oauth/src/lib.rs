//! OpenID Connect 1.0 / OAuth 2.0 authorization core.
//!
//! Transport-agnostic by design: every public entry point takes and returns
//! plain structs rather than `axum` types, so the HTTP binary owns all
//! request extraction and response rendering while this crate owns protocol
//! state, cryptography, and the concurrency-sensitive stores.

pub mod authorize;
pub mod client_registry;
pub mod code_store;
pub mod discovery;
pub mod dpop;
pub mod error;
pub mod jwt;
pub mod models;
pub mod par;
pub mod pkce;
pub mod refresh;
pub mod request_object;
pub mod revocation;
pub mod token;
pub mod userinfo;

pub use authorize::{AuthorizeContext, AuthorizeOutcome, AuthorizeRequest, SessionContext};
pub use client_registry::{ClientAuthRequest, ClientRegistry, SharedClientRegistry};
pub use code_store::AuthorizationCodeStore;
pub use discovery::{build as build_discovery_document, DiscoveryDocument};
pub use dpop::DPoPVerifier;
pub use error::{OAuthError, Result};
pub use models::*;
pub use par::ParStore;
pub use refresh::RefreshTokenRotator;
pub use revocation::RevocationTable;
pub use token::{TokenContext, TokenRequest, TokenResponse};
pub use userinfo::{TokenScheme, UserInfoRequest};
