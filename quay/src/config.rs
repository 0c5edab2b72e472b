//! Application configuration.
//!
//! [`AppConfig`] is an explicit value handed to [`Quay`](crate::app::Quay) when
//! the application is assembled. Nothing here is process-wide: two applications
//! in the same test binary can run with different settings side by side.
//!
//! The environment helpers below read `QUAY_*` variables (optionally from a
//! `.env` file) for binaries that want to configure themselves at startup.

use std::env;
use std::str::FromStr;

/// Default maximum request body size (2 MiB).
pub const DEFAULT_BODY_LIMIT: usize = 2 * 1024 * 1024;

/// Runtime settings of a Quay application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Application name, used in logs.
    pub name: String,
    /// Testing mode. Server errors are propagated to the caller of
    /// [`App::dispatch`](crate::app::App::dispatch) instead of being rendered,
    /// unless `propagate_exceptions` says otherwise.
    pub testing: bool,
    /// Show internal error messages in rendered 5xx bodies.
    pub debug: bool,
    /// Explicit override for error propagation. `None` follows `testing`.
    pub propagate_exceptions: Option<bool>,
    /// Maximum accepted request body size in bytes.
    pub body_limit: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: "quay".to_string(),
            testing: false,
            debug: false,
            propagate_exceptions: None,
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }
}

impl AppConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration with testing mode enabled.
    pub fn testing() -> Self {
        Self {
            testing: true,
            ..Self::default()
        }
    }

    /// Loads the configuration from `QUAY_*` environment variables.
    ///
    /// Unset variables keep their defaults; set but unparsable ones are errors.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let config = Self {
            name: get_env_or("QUAY_NAME", &defaults.name),
            testing: optional_flag("QUAY_TESTING")?.unwrap_or(defaults.testing),
            debug: optional_flag("QUAY_DEBUG")?.unwrap_or(defaults.debug),
            propagate_exceptions: optional_flag("QUAY_PROPAGATE_EXCEPTIONS")?,
            body_limit: match env::var("QUAY_BODY_LIMIT") {
                Ok(_) => get_env_parsed("QUAY_BODY_LIMIT")?,
                Err(_) => defaults.body_limit,
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Whether server errors escape to the dispatcher's caller.
    pub fn propagate_exceptions(&self) -> bool {
        self.propagate_exceptions.unwrap_or(self.testing)
    }

    /// Checks the settings for values the application cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "name".to_string(),
                value: self.name.clone(),
            });
        }
        if self.body_limit == 0 {
            return Err(ConfigError::Invalid {
                key: "body_limit".to_string(),
                value: "0".to_string(),
            });
        }
        Ok(())
    }
}

/// Load environment variables from `.env` files if it exists.
///
/// Call this at the start of your application before accessing config.
pub fn load_dotenv() {
    let _ = dotenvy::dotenv();
}

/// Get a required environment variable.
pub fn get_env(key: &str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::Missing(key.to_string()))
}

/// Get an optional environment with a default value
pub fn get_env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Get and parse an environment variable.
pub fn get_env_parsed<T: FromStr>(key: &str) -> Result<T, ConfigError> {
    let value = get_env(key)?;
    value.parse().map_err(|_| ConfigError::Invalid {
        key: key.to_string(),
        value,
    })
}

/// Get and parse an environment variable with a default.
pub fn get_env_parsed_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Get a boolean flag. Accepts `1/true/yes/on` and `0/false/no/off`.
pub fn get_env_flag(key: &str) -> Result<bool, ConfigError> {
    let value = get_env(key)?;
    parse_flag(&value).ok_or(ConfigError::Invalid {
        key: key.to_string(),
        value,
    })
}

fn optional_flag(key: &str) -> Result<Option<bool>, ConfigError> {
    match get_env_flag(key) {
        Ok(flag) => Ok(Some(flag)),
        Err(ConfigError::Missing(_)) => Ok(None),
        Err(err) => Err(err),
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Configuration loading errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Environment variable is not set.
    Missing(String),
    /// Multiple environment variables are not set.
    MissingMultiple(Vec<String>),
    /// A setting has a value the application cannot use.
    Invalid { key: String, value: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Missing(key) => {
                write!(f, "Missing required environment variable '{}'", key)
            }
            ConfigError::MissingMultiple(keys) => {
                writeln!(f, "Missing required environment variables:")?;
                for key in keys {
                    writeln!(f, "  - {}", key)?;
                }
                Ok(())
            }
            ConfigError::Invalid { key, value } => {
                write!(f, "Invalid value '{}' for setting '{}'", value, key)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
