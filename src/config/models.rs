// src/config/models.rs
use anyhow::{bail, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::net::SocketAddr;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub health: HealthConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub checks: Vec<CheckConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HealthConfig {
    /// Time for one full rotation through every check.
    #[serde(default = "default_frequency_secs")]
    pub frequency_secs: u64,
    /// Per-request timeout for HTTP probes.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_metrics_port")]
    pub port: u16,
    #[serde(default = "default_metrics_path")]
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckConfig {
    pub name: String,
    pub url: Url,
    #[serde(default)]
    pub observe_only: bool,
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.health.frequency_secs == 0 {
            bail!("health.frequency_secs must be greater than zero");
        }
        if self.health.timeout_secs == 0 {
            bail!("health.timeout_secs must be greater than zero");
        }
        if !self.metrics.path.starts_with('/') {
            bail!("metrics.path must start with '/', got {:?}", self.metrics.path);
        }

        let mut seen = HashSet::new();
        for check in &self.checks {
            if check.name.trim().is_empty() {
                bail!("check names must not be empty");
            }
            if !seen.insert(check.name.as_str()) {
                bail!("duplicate check name {:?}", check.name);
            }
        }
        Ok(())
    }
}

impl HealthConfig {
    pub fn frequency(&self) -> Duration {
        Duration::from_secs(self.frequency_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            frequency_secs: default_frequency_secs(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
            path: default_metrics_path(),
        }
    }
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_frequency_secs() -> u64 {
    60
}

fn default_timeout_secs() -> u64 {
    5
}

fn default_metrics_port() -> u16 {
    9090
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}
