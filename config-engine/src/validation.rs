//! Schema/invariant checks applied to a [`crate::profile::SettingsProfile`]
//! before it is swapped in, so a malformed profile (from `by_name` or an
//! operator-supplied override) is rejected rather than silently degrading
//! the authorization core's security posture.

use crate::error::{ConfigError, Result};
use crate::profile::SettingsProfile;

pub trait ConfigValidator {
    fn validate(&self, config: &serde_json::Value) -> Result<()>;
}

/// Cross-field invariants a [`SettingsProfile`] must satisfy regardless of
/// which named profile produced it.
pub fn validate_profile(profile: &SettingsProfile) -> Result<()> {
    if profile.pkce_methods.is_empty() {
        return Err(ConfigError::ValidationError(
            "pkce_methods must not be empty".to_string(),
        ));
    }
    if profile.token_endpoint_auth_methods.is_empty() {
        return Err(ConfigError::ValidationError(
            "token_endpoint_auth_methods must not be empty".to_string(),
        ));
    }
    if profile.require_confidential_clients && profile.allow_public_clients {
        return Err(ConfigError::ValidationError(
            "require_confidential_clients and allow_public_clients are contradictory".to_string(),
        ));
    }
    if profile.access_token_ttl.num_seconds() <= 0 || profile.code_ttl.num_seconds() <= 0 {
        return Err(ConfigError::ValidationError(
            "access_token_ttl and code_ttl must be positive".to_string(),
        ));
    }
    if profile.code_ttl.num_seconds() > 120 {
        return Err(ConfigError::ValidationError(
            "code_ttl exceeds the 120s maximum authorization code lifetime".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_op_profile_is_valid() {
        assert!(validate_profile(&SettingsProfile::basic_op("https://issuer.example")).is_ok());
    }

    #[test]
    fn contradictory_confidentiality_toggles_are_rejected() {
        let mut profile = SettingsProfile::basic_op("https://issuer.example");
        profile.require_confidential_clients = true;
        profile.allow_public_clients = true;
        assert!(validate_profile(&profile).is_err());
    }

    #[test]
    fn oversized_code_ttl_is_rejected() {
        let mut profile = SettingsProfile::basic_op("https://issuer.example");
        profile.code_ttl = chrono::Duration::seconds(121);
        assert!(validate_profile(&profile).is_err());
    }
}
