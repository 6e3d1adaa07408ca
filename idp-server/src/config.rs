//! Process configuration: CLI flags plus the handful of settings that are
//! not already covered by a `SettingsProfile` (C14) — issuer, bind
//! address, and which named profile to boot into.

use clap::Parser;
use crypto::KeyAlgorithm;

#[derive(Parser, Debug)]
#[command(name = "idp-server")]
#[command(about = "OpenID Connect 1.0 / OAuth 2.0 authorization server")]
pub struct Args {
    /// Bind address
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// Bind port
    #[arg(short, long, default_value_t = 8080)]
    pub port: u16,

    /// Issuer URL advertised in discovery, ID tokens, and access tokens
    #[arg(long, default_value = "http://localhost:8080")]
    pub issuer: String,

    /// Named settings profile: basic-op, fapi-2, fapi-2-dpop, development
    #[arg(long, default_value = "basic-op")]
    pub profile: String,

    /// Default signing algorithm for freshly bootstrapped keys
    #[arg(long, default_value = "ES256")]
    pub signing_alg: String,

    /// Key rotation interval, in days
    #[arg(long, default_value_t = 90)]
    pub key_rotation_interval_days: i64,

    /// How long a retired key's JWK stays published, in days
    #[arg(long, default_value_t = 7)]
    pub key_retention_days: i64,

    /// Allow http://localhost redirect URIs even when not explicitly
    /// registered, for local development against native/loopback clients.
    #[arg(long)]
    pub allow_localhost_redirect: bool,

    /// Emit pretty logs instead of JSON
    #[arg(long)]
    pub pretty_logs: bool,
}

/// Settings derived from [`Args`] and handed to [`crate::state::AppState`].
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub issuer: String,
    pub profile: String,
    pub default_signing_alg: KeyAlgorithm,
    pub key_rotation_interval_days: i64,
    pub key_retention_days: i64,
    pub allow_localhost_redirect: bool,
}

impl TryFrom<&Args> for ServerConfig {
    type Error = crypto::CryptoError;

    fn try_from(args: &Args) -> Result<Self, Self::Error> {
        Ok(Self {
            issuer: args.issuer.trim_end_matches('/').to_string(),
            profile: args.profile.clone(),
            default_signing_alg: args.signing_alg.parse()?,
            key_rotation_interval_days: args.key_rotation_interval_days,
            key_retention_days: args.key_retention_days,
            allow_localhost_redirect: args.allow_localhost_redirect,
        })
    }
}
