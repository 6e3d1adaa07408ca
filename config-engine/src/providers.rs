//! Layered configuration sources for the handful of settings that sit
//! outside a [`crate::profile::SettingsProfile`] — issuer override, bind
//! address, which named profile to boot into — loaded the way the teacher
//! workspace loads configuration, via the `config` crate, with environment
//! variables (prefix `IDP_`) taking precedence over a YAML file.

use config::{Config, Environment, File};
use serde::de::DeserializeOwned;

use crate::error::{ConfigError, Result};

pub trait ConfigProvider {
    fn load(&self) -> Result<serde_json::Value>;
}

/// Merges an optional YAML file with `IDP_`-prefixed environment variables,
/// env taking precedence. Absence of the file is not an error — every
/// setting it would supply has a profile-derived default.
pub struct LayeredConfigProvider {
    yaml_path: Option<String>,
}

impl LayeredConfigProvider {
    pub fn new(yaml_path: Option<String>) -> Self {
        Self { yaml_path }
    }

    pub fn load_typed<T: DeserializeOwned>(&self) -> Result<T> {
        let mut builder = Config::builder();
        if let Some(path) = &self.yaml_path {
            builder = builder.add_source(File::with_name(path).required(false));
        }
        builder = builder.add_source(Environment::with_prefix("IDP").separator("__"));

        let config = builder.build().map_err(|_| ConfigError::ParseError)?;
        config.try_deserialize().map_err(|_| ConfigError::SchemaMismatch)
    }
}

impl ConfigProvider for LayeredConfigProvider {
    fn load(&self) -> Result<serde_json::Value> {
        self.load_typed()
    }
}
