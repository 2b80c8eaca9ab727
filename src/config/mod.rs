//! Office and runtime configuration, loaded from a YAML document with env
//! var and CLI overrides layered on top.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// One monitored branch office, as described in the YAML config document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfficeConfig {
    pub name: String,
    pub gateway_ip: String,
    pub mx_ip: String,
    pub tunnel_probe_ip: String,
    #[serde(default = "default_retries_down")]
    pub retries_down: u32,
    #[serde(default = "default_retries_up")]
    pub retries_up: u32,
}

fn default_retries_down() -> u32 {
    2
}

fn default_retries_up() -> u32 {
    1
}

/// Top-level config document (`offices.yaml`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: u64,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_broadcast_seconds")]
    pub broadcast_seconds: u64,
    #[serde(default)]
    pub offices: Vec<OfficeConfig>,
}

fn default_interval_seconds() -> u64 {
    5
}

fn default_timeout_ms() -> u64 {
    900
}

fn default_broadcast_seconds() -> u64 {
    15
}

impl Default for Config {
    fn default() -> Self {
        Self {
            interval_seconds: default_interval_seconds(),
            timeout_ms: default_timeout_ms(),
            broadcast_seconds: default_broadcast_seconds(),
            offices: Vec::new(),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Read(std::io::Error),
    Parse(serde_yaml::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Read(e) => write!(f, "config read error: {e}"),
            ConfigError::Parse(e) => write!(f, "config parse error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Read(e)
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(e: serde_yaml::Error) -> Self {
        ConfigError::Parse(e)
    }
}

impl Config {
    /// Loads the YAML document at `path`. On parse failure the caller is
    /// expected to keep using whatever config it already has in force.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let cfg: Config = serde_yaml::from_str(&raw)?;
        Ok(cfg)
    }
}

/// Resolved env var overrides, read once at process startup.
#[derive(Debug, Clone)]
pub struct EnvOverrides {
    pub db_path: Option<String>,
    pub api_base: Option<String>,
    pub ping_concurrency: Option<usize>,
    pub offices_yaml: Option<String>,
}

impl EnvOverrides {
    pub fn from_env() -> Self {
        Self {
            db_path: std::env::var("SLA_DB").ok(),
            api_base: std::env::var("SLA_API").ok(),
            ping_concurrency: std::env::var("PING_CONCURRENCY")
                .ok()
                .and_then(|v| v.parse().ok()),
            offices_yaml: std::env::var("OFFICES_YAML").ok(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = Config::default();
        assert_eq!(cfg.interval_seconds, 5);
        assert_eq!(cfg.timeout_ms, 900);
        assert_eq!(cfg.broadcast_seconds, 15);
        assert!(cfg.offices.is_empty());
    }

    #[test]
    fn office_retry_defaults() {
        let yaml = "name: hq\ngateway_ip: 10.0.0.1\nmx_ip: 10.0.0.2\ntunnel_probe_ip: 10.0.0.3\n";
        let office: OfficeConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(office.retries_down, 2);
        assert_eq!(office.retries_up, 1);
    }

    #[test]
    fn load_missing_file_errors() {
        let result = Config::load("/nonexistent/path/offices.yaml");
        assert!(result.is_err());
    }
}
