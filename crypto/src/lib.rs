//! Signing-key lifecycle and supporting primitives for the authorization
//! core: key generation and rotation, JWK serialization and RFC 7638
//! thumbprints, and constant-time comparisons for client secrets and MACs.

pub mod constant_time;
pub mod error;
pub mod jwk;
pub mod keys;

pub use error::{CryptoError, CryptoResult};
pub use jwk::Jwk;
pub use keys::{KeyAlgorithm, KeyManager, SigningKey};
