// src/config/models.rs
use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub health: HealthConfig,
    pub metrics: MetricsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub shutdown_grace_secs: u64,
    pub service_name: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            shutdown_grace_secs: 10,
            service_name: "temperature-collector".to_string(),
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        socket_addr(&self.host, self.port)
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    pub check_timeout_ms: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            check_timeout_ms: 2000,
        }
    }
}

impl HealthConfig {
    pub fn check_timeout(&self) -> Duration {
        Duration::from_millis(self.check_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub path: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: "0.0.0.0".to_string(),
            port: 9090,
            path: "/metrics".to_string(),
        }
    }
}

impl MetricsConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        socket_addr(&self.host, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`.
    pub level: String,
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            ansi: true,
        }
    }
}

fn socket_addr(host: &str, port: u16) -> Result<SocketAddr> {
    let ip: IpAddr = host
        .parse()
        .with_context(|| format!("invalid bind host {host:?}: expected an IP address"))?;
    Ok(SocketAddr::new(ip, port))
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        self.server.socket_addr().context("server.host")?;
        ensure!(
            self.server.shutdown_grace_secs > 0,
            "server.shutdown_grace_secs must be greater than zero"
        );
        ensure!(
            !self.server.service_name.trim().is_empty(),
            "server.service_name must not be empty"
        );
        ensure!(
            self.health.check_timeout_ms > 0,
            "health.check_timeout_ms must be greater than zero"
        );

        if self.metrics.enabled {
            self.metrics.socket_addr().context("metrics.host")?;
            ensure!(
                self.metrics.path.starts_with('/'),
                "metrics.path must start with '/', got {:?}",
                self.metrics.path
            );
            ensure!(
                self.metrics.port == 0 || self.metrics.port != self.server.port,
                "metrics.port {} collides with server.port",
                self.metrics.port
            );
        }

        Ok(())
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to render config as YAML")
    }
}
