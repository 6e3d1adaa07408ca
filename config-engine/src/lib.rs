//! Configuration loading and the Settings/Profile Engine (C14): named
//! security profiles (`basic-op`, `fapi-2`, `fapi-2-dpop`, `development`)
//! applied as an atomic swap over the running authorization core.

pub mod error;
pub mod profile;
pub mod providers;
pub mod validation;

pub use error::{ConfigError, Result};
pub use profile::{ClientAuthMethod, PkceMethod, ProfileEngine, SettingsProfile};
pub use providers::{ConfigProvider, LayeredConfigProvider};
pub use validation::{validate_profile, ConfigValidator};
