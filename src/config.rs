//! Session configuration using Figment.
//!
//! A session file holds the `[logging]` table and the registry definitions
//! (`[[filters]]`, `[[controls]]`, `[[sites]]`). Environment variables
//! prefixed with `HYBRID_SIM_` override file values, with `__` separating
//! nested keys:
//!
//! ```text
//! HYBRID_SIM_LOGGING__LEVEL=debug
//! ```
//!
//! # Example
//! ```no_run
//! use hybrid_sim::config::SessionConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SessionConfig::load("session.toml")?;
//! config.validate()?;
//! println!("{} controls", config.session.controls.len());
//! # Ok(())
//! # }
//! ```

use crate::logging::{self, LoggingConfig, LoggingError};
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use hsim_registry::Definitions;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Prefix of environment overrides.
pub const ENV_PREFIX: &str = "HYBRID_SIM_";

/// Top-level session configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionConfig {
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Filters, controls and sites to create.
    #[serde(flatten)]
    pub session: Definitions,
}

/// Configuration loading or validation failure.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The session file does not exist.
    #[error("configuration file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Merging or deserialising the providers failed.
    #[error(transparent)]
    Load(#[from] Box<figment::Error>),

    /// Invalid `[logging]` table.
    #[error(transparent)]
    Logging(#[from] LoggingError),

    /// Definitions are inconsistent.
    #[error(transparent)]
    Session(#[from] hsim_core::RegistryError),
}

impl SessionConfig {
    /// Load a session file merged with `HYBRID_SIM_` environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        Self::figment(path).extract().map_err(|e| ConfigError::Load(Box::new(e)))
    }

    /// Provider stack used by [`load`](Self::load).
    #[must_use]
    pub fn figment(path: &Path) -> Figment {
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Checks that need no transport: log level, unique tags per namespace,
    /// filter parameters, and site-to-control references.
    pub fn validate(&self) -> Result<(), ConfigError> {
        logging::parse_log_level(&self.logging.level)?;
        self.session.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hsim_core::{FilterSpec, Namespace, RegistryError};

    fn parse(text: &str) -> SessionConfig {
        Figment::new().merge(Toml::string(text)).extract().unwrap()
    }

    #[test]
    fn test_logging_table_is_optional() {
        let config = parse("[[controls]]\ntag = 1\ntype = \"SimFEAdapter\"");
        assert_eq!(config.logging, LoggingConfig::default());
        assert_eq!(config.session.controls.len(), 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_filters_and_sites_parsed() {
        let config = parse(
            r#"
            [logging]
            level = "debug"

            [[filters]]
            tag = 2
            type = "linear"
            gain = 0.5

            [[controls]]
            tag = 1
            type = "SimFEAdapter"

            [[sites]]
            tag = 3
            control = 1
            trial = { disp = 1 }
            daq = { disp = 1, force = 1 }
            "#,
        );
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.session.filters[0].spec, FilterSpec::Linear { gain: 0.5, offset: 0.0 });
        assert_eq!(config.session.sites[0].control, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = SessionConfig::default();
        config.logging.level = "invalid".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Logging(_))));
    }

    #[test]
    fn test_duplicate_control_tags() {
        let config = parse(
            "[[controls]]\ntag = 1\ntype = \"SimFEAdapter\"\n[[controls]]\ntag = 1\ntype = \"xPCtarget\"",
        );
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Session(RegistryError::DuplicateTag {
                namespace: Namespace::Controls,
                tag: 1
            }))
        ));
    }

    #[test]
    fn test_missing_file() {
        let err = SessionConfig::load("/nonexistent/session.toml").unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
        assert!(err.to_string().contains("session.toml"));
    }
}
