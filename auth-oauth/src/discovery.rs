//! Discovery Publisher (C13): provider metadata derived purely from the
//! current [`SettingsProfile`] (§4.13, §8 property 9).

use config_engine::{ClientAuthMethod, PkceMethod as ProfilePkceMethod, SettingsProfile};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Serialize)]
pub struct DiscoveryDocument {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub userinfo_endpoint: String,
    pub jwks_uri: String,
    pub pushed_authorization_request_endpoint: String,
    pub introspection_endpoint: String,
    pub revocation_endpoint: String,
    pub registration_endpoint: String,
    pub response_types_supported: Vec<String>,
    pub subject_types_supported: Vec<String>,
    pub id_token_signing_alg_values_supported: Vec<String>,
    pub token_endpoint_auth_methods_supported: Vec<String>,
    pub code_challenge_methods_supported: Vec<String>,
    pub require_pushed_authorization_requests: bool,
    pub dpop_signing_alg_values_supported: Vec<String>,
    pub scopes_supported: Vec<String>,
    pub claims_supported: Vec<String>,
    pub grant_types_supported: Vec<String>,
}

const SUPPORTED_SIGNING_ALGS: &[&str] = &["RS256", "ES256", "RS384", "ES384", "RS512", "ES512"];

/// A pure function of `profile` — calling this twice with the same profile
/// yields byte-identical output (§8 property 9: "applying a profile and
/// re-reading is idempotent").
pub fn build(profile: &SettingsProfile) -> DiscoveryDocument {
    let issuer = profile.issuer.trim_end_matches('/').to_string();

    let auth_methods = profile
        .token_endpoint_auth_methods
        .iter()
        .map(|m| match m {
            ClientAuthMethod::ClientSecretBasic => "client_secret_basic",
            ClientAuthMethod::ClientSecretPost => "client_secret_post",
            ClientAuthMethod::ClientSecretJwt => "client_secret_jwt",
            ClientAuthMethod::PrivateKeyJwt => "private_key_jwt",
            ClientAuthMethod::None => "none",
        })
        .map(str::to_string)
        .collect();

    let pkce_methods = profile
        .pkce_methods
        .iter()
        .filter(|m| !(profile.reject_plain_pkce && matches!(m, ProfilePkceMethod::Plain)))
        .map(|m| match m {
            ProfilePkceMethod::S256 => "S256",
            ProfilePkceMethod::Plain => "plain",
        })
        .map(str::to_string)
        .collect();

    DiscoveryDocument {
        authorization_endpoint: format!("{issuer}/authorize"),
        token_endpoint: format!("{issuer}/token"),
        userinfo_endpoint: format!("{issuer}/userinfo"),
        jwks_uri: format!("{issuer}/.well-known/jwks.json"),
        pushed_authorization_request_endpoint: format!("{issuer}/as/par"),
        introspection_endpoint: format!("{issuer}/introspect"),
        revocation_endpoint: format!("{issuer}/revoke"),
        registration_endpoint: format!("{issuer}/register"),
        response_types_supported: vec!["code".to_string()],
        subject_types_supported: vec!["public".to_string(), "pairwise".to_string()],
        id_token_signing_alg_values_supported: SUPPORTED_SIGNING_ALGS.iter().map(|s| s.to_string()).collect(),
        token_endpoint_auth_methods_supported: auth_methods,
        code_challenge_methods_supported: pkce_methods,
        require_pushed_authorization_requests: profile.require_par,
        dpop_signing_alg_values_supported: if profile.require_dpop {
            SUPPORTED_SIGNING_ALGS.iter().map(|s| s.to_string()).collect()
        } else {
            Vec::new()
        },
        scopes_supported: vec![
            "openid".to_string(),
            "profile".to_string(),
            "email".to_string(),
            "address".to_string(),
            "phone".to_string(),
            "offline_access".to_string(),
        ],
        claims_supported: vec![
            "sub".to_string(),
            "name".to_string(),
            "email".to_string(),
            "email_verified".to_string(),
            "acr".to_string(),
            "auth_time".to_string(),
        ],
        grant_types_supported: vec!["authorization_code".to_string(), "refresh_token".to_string()],
        issuer,
    }
}

pub fn to_json(profile: &SettingsProfile) -> Value {
    serde_json::to_value(build(profile)).unwrap_or(Value::Null)
}

/// Discovery responses are publicly cacheable for up to 300s (§3, §4.13).
pub const DISCOVERY_CACHE_SECONDS: u32 = 300;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fapi2_hides_plain_pkce_even_if_listed() {
        let mut profile = SettingsProfile::fapi2("https://issuer.example");
        profile.pkce_methods = vec![ProfilePkceMethod::S256, ProfilePkceMethod::Plain];
        profile.reject_plain_pkce = true;

        let doc = build(&profile);
        assert_eq!(doc.code_challenge_methods_supported, vec!["S256".to_string()]);
    }

    #[test]
    fn rebuilding_from_the_same_profile_is_idempotent() {
        let profile = SettingsProfile::basic_op("https://issuer.example");
        let a = to_json(&profile);
        let b = to_json(&profile);
        assert_eq!(a, b);
    }

    #[test]
    fn issuer_trailing_slash_is_normalized() {
        let profile = SettingsProfile::basic_op("https://issuer.example/");
        let doc = build(&profile);
        assert_eq!(doc.token_endpoint, "https://issuer.example/token");
    }
}
