//! Embedding configuration: logging and bookkeeping limits.
//!
//! Loaded from a TOML file by the embedding daemon, with environment
//! variables (`MDS_SESSION_*`) taking precedence over file values.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::Limits;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid value {value:?} for {var}")]
    InvalidEnv { var: &'static str, value: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub limits: Limits,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 0 = errors only, 1 = info, 2+ = debug. The `LOG` env var overrides
    /// the derived filter entirely.
    pub verbosity: u8,
    pub stdout: bool,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            verbosity: 1,
            stdout: true,
            format: LogFormat::Compact,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Pretty,
    Json,
}

/// Load configuration from `path`; a missing file yields the defaults.
/// Environment overrides apply either way.
pub fn load(path: &Path) -> Result<Config, ConfigError> {
    let mut config = if path.exists() {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?
    } else {
        Config::default()
    };
    apply_env_overrides(&mut config)?;
    Ok(config)
}

fn apply_env_overrides(config: &mut Config) -> Result<(), ConfigError> {
    apply_overrides(
        config,
        std::env::var("MDS_SESSION_VERBOSITY").ok().as_deref(),
        std::env::var("MDS_SESSION_LOG_FORMAT").ok().as_deref(),
        std::env::var("MDS_SESSION_MAX_SESSIONS").ok().as_deref(),
    )
}

fn apply_overrides(
    config: &mut Config,
    verbosity: Option<&str>,
    log_format: Option<&str>,
    max_sessions: Option<&str>,
) -> Result<(), ConfigError> {
    if let Some(raw) = verbosity {
        config.logging.verbosity = raw.parse().map_err(|_| ConfigError::InvalidEnv {
            var: "MDS_SESSION_VERBOSITY",
            value: raw.to_string(),
        })?;
    }
    if let Some(raw) = log_format {
        config.logging.format = match raw {
            "compact" => LogFormat::Compact,
            "pretty" => LogFormat::Pretty,
            "json" => LogFormat::Json,
            other => {
                return Err(ConfigError::InvalidEnv {
                    var: "MDS_SESSION_LOG_FORMAT",
                    value: other.to_string(),
                })
            }
        };
    }
    if let Some(raw) = max_sessions {
        config.limits.max_sessions = raw.parse().map_err(|_| ConfigError::InvalidEnv {
            var: "MDS_SESSION_MAX_SESSIONS",
            value: raw.to_string(),
        })?;
    }
    Ok(())
}
