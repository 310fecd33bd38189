//! Configuration for glrunner

use crate::token_store::DEFAULT_CONFIG_DIR;
use crate::RunnerError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration as TOML
pub const DEFAULT_CONFIG: &str = r#"# glrunner configuration

[gitlab]
# Base URL of the GitLab instance (host part only, e.g. "https://gitlab.com")
# url = "https://gitlab.example.org"

[transport]
# HTTP proxy used for API calls (direct connection when unset)
# proxy = "http://proxy.example.org:3128"
# PEM bundle used as the only trusted roots (https only)
# ca_file = "/etc/gitlab-runner/certs/ca.crt"
# Disable TLS peer verification entirely
ssl_insecure = false
# Time allowed to establish a connection (e.g., "30s", "1m")
connect_timeout = "60s"
# Time allowed for the whole request
timeout = "60s"

[runner]
# Directory holding auth-token-<runner-name> files
config_dir = "/etc/gitlab-runner"
# Report what would happen without contacting GitLab
noop = false
"#;

/// glrunner configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub gitlab: GitlabConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub runner: RunnerConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GitlabConfig {
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    #[serde(default)]
    pub proxy: Option<String>,
    #[serde(default)]
    pub ca_file: Option<PathBuf>,
    #[serde(default)]
    pub ssl_insecure: bool,
    #[serde(default = "default_timeout")]
    pub connect_timeout: String,
    #[serde(default = "default_timeout")]
    pub timeout: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    #[serde(default = "default_config_dir")]
    pub config_dir: PathBuf,
    #[serde(default)]
    pub noop: bool,
}

// Default value functions
fn default_timeout() -> String {
    "60s".to_string()
}
fn default_config_dir() -> PathBuf {
    PathBuf::from(DEFAULT_CONFIG_DIR)
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            proxy: None,
            ca_file: None,
            ssl_insecure: false,
            connect_timeout: default_timeout(),
            timeout: default_timeout(),
        }
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            config_dir: default_config_dir(),
            noop: false,
        }
    }
}

impl Config {
    /// Load config from a TOML file
    pub fn load(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse config from TOML string
    pub fn from_toml(content: &str) -> crate::Result<Self> {
        let config: Config =
            toml::from_str(content).map_err(|e| RunnerError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> crate::Result<()> {
        for (name, value) in [
            ("connect_timeout", &self.transport.connect_timeout),
            ("timeout", &self.transport.timeout),
        ] {
            if parse_duration(value).is_none() {
                return Err(RunnerError::ConfigParse(format!(
                    "transport.{}: invalid duration '{}'",
                    name, value
                )));
            }
        }
        Ok(())
    }

    /// Get connect timeout as Duration
    pub fn connect_timeout(&self) -> Duration {
        parse_duration(&self.transport.connect_timeout).unwrap_or(Duration::from_secs(60))
    }

    /// Get request timeout as Duration
    pub fn timeout(&self) -> Duration {
        parse_duration(&self.transport.timeout).unwrap_or(Duration::from_secs(60))
    }
}

/// Parse duration string (e.g., "30s", "5m", "1h", "1d")
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    let (idx, unit) = s.char_indices().last()?;
    let num: u64 = s[..idx].parse().ok()?;

    let secs = match unit {
        's' => num,
        'm' => num.checked_mul(60)?,
        'h' => num.checked_mul(3600)?,
        'd' => num.checked_mul(86400)?,
        _ => return None,
    };
    Some(Duration::from_secs(secs))
}
