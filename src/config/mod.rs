//! Server configuration loading and management
//!
//! Configuration comes from YAML, then environment variables override
//! individual fields:
//!
//! | Variable | Field | Default |
//! |----------|-------|---------|
//! | `NESTAPI_ADDRESS` | `address` | `0.0.0.0:8080` |
//! | `NESTAPI_SHUTDOWN_GRACE_SECS` | `shutdown_grace_period_secs` | `10` |
//! | `NESTAPI_REQUEST_TIMEOUT_SECS` | `request_timeout_secs` | none |

use crate::core::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

pub const ENV_ADDRESS: &str = "NESTAPI_ADDRESS";
pub const ENV_SHUTDOWN_GRACE_SECS: &str = "NESTAPI_SHUTDOWN_GRACE_SECS";
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "NESTAPI_REQUEST_TIMEOUT_SECS";

/// How a [`Server`](crate::server::Server) binds and shuts down
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address to listen on
    pub address: String,

    /// Seconds in-flight requests may take to finish after a shutdown signal
    pub shutdown_grace_period_secs: u64,

    /// Per-request timeout; unlimited when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: "0.0.0.0:8080".to_string(),
            shutdown_grace_period_secs: 10,
            request_timeout_secs: None,
        }
    }
}

impl ServerConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Load configuration from a YAML string; missing fields keep their defaults
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Apply overrides from the process environment
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`, which maps variable names to values
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(address) = lookup(ENV_ADDRESS) {
            self.address = address;
        }
        if let Some(raw) = lookup(ENV_SHUTDOWN_GRACE_SECS) {
            self.shutdown_grace_period_secs = parse_value(ENV_SHUTDOWN_GRACE_SECS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_REQUEST_TIMEOUT_SECS) {
            self.request_timeout_secs = Some(parse_value(ENV_REQUEST_TIMEOUT_SECS, &raw)?);
        }
        Ok(self)
    }

    pub fn shutdown_grace_period(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_period_secs)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

fn parse_value<V: FromStr>(key: &str, raw: &str) -> Result<V, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: raw.to_string(),
    })
}
