//! Framework configuration. [Application](crate::application::Application)s created with
//! [create](crate::application::create) use this config to set themselves up.
//!
//! By default, the config is created with opinionated default values, which can then be
//! overwritten by environment variables prefixed with `TRELLIS_` or a `trellis.json` file.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

const CONFIG_ENV_PREFIX: &str = "TRELLIS";

/// Name of the default config file.
pub const CONFIG_FILE: &str = "trellis.json";

/// Framework configuration.
#[non_exhaustive]
#[derive(Clone, Debug)]
pub struct ApplicationConfig {
    /// Should a default tracing logger be installed in the scope of the application.
    pub install_tracing_logger: bool,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            install_tracing_logger: true,
        }
    }
}

impl From<OptionalApplicationConfig> for ApplicationConfig {
    fn from(value: OptionalApplicationConfig) -> Self {
        let default = Self::default();
        Self {
            install_tracing_logger: value
                .install_tracing_logger
                .unwrap_or(default.install_tracing_logger),
        }
    }
}

impl ApplicationConfig {
    /// Folds the optional config file and prefixed environment variables over the defaults.
    pub fn init_from_environment() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::with_name(CONFIG_FILE).required(false))
            .add_source(Environment::with_prefix(CONFIG_ENV_PREFIX))
            .build()
            .and_then(|config| config.try_deserialize::<OptionalApplicationConfig>())
            .map(|config| config.into())
    }
}

#[derive(Deserialize)]
struct OptionalApplicationConfig {
    install_tracing_logger: Option<bool>,
}

#[cfg(test)]
mod tests {
    use crate::config::{ApplicationConfig, OptionalApplicationConfig};

    #[test]
    fn should_fall_back_to_defaults() {
        let config: ApplicationConfig = OptionalApplicationConfig {
            install_tracing_logger: None,
        }
        .into();

        assert!(config.install_tracing_logger);
    }

    #[test]
    fn should_prefer_explicit_values() {
        let config: ApplicationConfig = OptionalApplicationConfig {
            install_tracing_logger: Some(false),
        }
        .into();

        assert!(!config.install_tracing_logger);
    }
}
