//! Configuration loading and validation.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::BeckonConfig;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Load the full Beckon configuration from a YAML file.
pub fn load_config(path: &Path) -> Result<BeckonConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: BeckonConfig = serde_yaml::from_str(&content)?;
    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &BeckonConfig) -> Result<(), ConfigError> {
    if config.version == 0 {
        return Err(ConfigError::Invalid(
            "version must be greater than 0".to_string(),
        ));
    }

    if config.app.name.trim().is_empty() {
        return Err(ConfigError::Invalid(
            "app.name must not be empty".to_string(),
        ));
    }

    if config.server.listen.trim().is_empty() {
        return Err(ConfigError::Invalid(
            "server.listen must not be empty".to_string(),
        ));
    }

    if config.planner.model.trim().is_empty() {
        return Err(ConfigError::Invalid(
            "planner.model must not be empty".to_string(),
        ));
    }

    if config.planner.endpoint.trim().is_empty() {
        return Err(ConfigError::Invalid(
            "planner.endpoint must not be empty".to_string(),
        ));
    }

    if config.plans.ttl_secs == 0 {
        return Err(ConfigError::Invalid(
            "plans.ttl_secs must be > 0".to_string(),
        ));
    }

    if config.plans.sweep_interval_secs == 0 {
        return Err(ConfigError::Invalid(
            "plans.sweep_interval_secs must be > 0".to_string(),
        ));
    }

    if config.session.max_messages == 0 {
        return Err(ConfigError::Invalid(
            "session.max_messages must be > 0".to_string(),
        ));
    }

    Ok(())
}
