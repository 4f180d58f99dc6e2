mod connection;
mod polling;
mod selection;

pub use connection::*;
pub use polling::*;
pub use selection::*;

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::stats::AddressRegistry;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TrackerConfig {
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub stats: StatsConfig,
}

impl TrackerConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing keys.
    pub fn load(path: impl AsRef<Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: TrackerConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load from file if it exists and parses, otherwise return defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(config) => config,
            Err(crate::Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                Self::default()
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "invalid config file, using defaults");
                Self::default()
            }
        }
    }

    /// Render the resolved configuration (defaults included) as TOML.
    pub fn to_toml(&self) -> crate::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl TrackerConfig {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.connection.host.trim().is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "connection.host".into(),
                message: "host must not be empty".into(),
            });
        }

        if self.connection.port == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "connection.port".into(),
                message: "port must be greater than 0".into(),
            });
        }

        if self.polling.interval_ms == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "polling.interval_ms".into(),
                message: "poll interval must be greater than 0".into(),
            });
        }

        if self.polling.timeout_ms == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "polling.timeout_ms".into(),
                message: "timeout must be greater than 0".into(),
            });
        } else if self.polling.timeout_ms <= self.polling.interval_ms {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "polling.timeout_ms".into(),
                message: "timeout not longer than the poll interval; the watchdog may trip while healthy".into(),
            });
        }

        let registry = AddressRegistry::new();
        for key in registry.unknown_keys(&self.stats.selected) {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "stats.selected".into(),
                message: format!("unknown stat \"{key}\" will be ignored"),
            });
        }

        errors
    }
}
