//! Configuration for the directory adapter.
//!
//! Configured via a TOML file with `${VAR_NAME}` environment variable
//! interpolation, or directly from `KEYCLOAK_*` environment variables.
//!
//! # Example
//!
//! ```toml
//! [keycloak]
//! endpoint = "https://sso.example.com/"
//! admin_username = "admin"
//! admin_password = "${KEYCLOAK_PWD}"
//! realm = "corp"
//!
//! [logging]
//! level = "debug"
//! ```

mod keycloak;
mod observability;

use std::path::Path;

pub use keycloak::*;
pub use observability::*;
use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DirectoryConfig {
    /// Remote Keycloak connection and directory behaviour.
    pub keycloak: KeycloakConfig,

    /// Log output for the command-line front end.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl DirectoryConfig {
    /// Load configuration from a TOML file.
    ///
    /// Environment variables in the format `${VAR_NAME}` are expanded.
    /// Missing variables cause an error.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(e, path.as_ref().to_path_buf()))?;

        Self::from_str(&contents)
    }

    /// Parse configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(contents: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env_vars(contents)?;
        let config: DirectoryConfig = toml::from_str(&expanded).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Build configuration from `KEYCLOAK_HOST`, `KEYCLOAK_USER`,
    /// `KEYCLOAK_PWD` and `KEYCLOAK_REALM` (default `master`).
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            keycloak: KeycloakConfig::from_env()?,
            logging: LoggingConfig::default(),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.keycloak.validate()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {1}: {0}")]
    Io(std::io::Error, std::path::PathBuf),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}

/// Expand `${VAR}` references, leaving anything after a `#` comment marker
/// on the same line untouched.
fn expand_env_vars(input: &str) -> Result<String, ConfigError> {
    let re = regex::Regex::new(r"\$\{([^}]+)\}")
        .map_err(|e| ConfigError::Validation(format!("Invalid interpolation pattern: {e}")))?;
    let mut result = String::with_capacity(input.len());

    for line in input.lines() {
        let comment_pos = line.find('#');
        let mut last_end = 0;

        for cap in re.captures_iter(line) {
            let Some(whole) = cap.get(0) else {
                continue;
            };

            if let Some(pos) = comment_pos
                && whole.start() >= pos
            {
                continue;
            }

            result.push_str(&line[last_end..whole.start()]);

            let var_name = &cap[1];
            let value = std::env::var(var_name)
                .map_err(|_| ConfigError::EnvVarNotFound(var_name.to_string()))?;
            result.push_str(&value);

            last_end = whole.end();
        }

        result.push_str(&line[last_end..]);
        result.push('\n');
    }

    if !input.ends_with('\n') && result.ends_with('\n') {
        result.pop();
    }

    Ok(result)
}
