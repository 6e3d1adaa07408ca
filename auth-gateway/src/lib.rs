//! Thin axum extractors shared by `idp-server` handlers: pulling a
//! Bearer/DPoP token, a `DPoP` proof header, or Basic client credentials
//! off a request. All OIDC/OAuth2 protocol logic itself lives in
//! `auth-oauth`; this crate only bridges it to axum's request types.

pub mod error;
pub mod extractors;

pub use error::GatewayError;
pub use extractors::{AuthorizationToken, BasicClientCredentials, DPoPProofHeader};
