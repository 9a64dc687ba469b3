// src/probe.rs
//! Client side of the container `HEALTHCHECK`: query `/health` on a running
//! instance and turn the answer into an exit status.

use crate::health::{HealthState, HealthStatus};
use reqwest::Client;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;
use url::Url;

pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("invalid probe url {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("health request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("health endpoint answered HTTP {0}")]
    Status(reqwest::StatusCode),

    #[error("health endpoint returned an empty status")]
    EmptyStatus,
}

/// `http://<host>:<port>/health` for the address the service listens on.
/// Wildcard binds are reached through the loopback of the same family.
pub fn health_url(listen: SocketAddr) -> Result<Url, ProbeError> {
    let ip = match listen.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => IpAddr::V4(Ipv4Addr::LOCALHOST),
        IpAddr::V6(ip) if ip.is_unspecified() => IpAddr::V6(Ipv6Addr::LOCALHOST),
        ip => ip,
    };
    let base = format!("http://{}/", SocketAddr::new(ip, listen.port()));
    parse_url(&base)?
        .join("health")
        .map_err(|source| ProbeError::InvalidUrl { url: base, source })
}

pub fn parse_url(raw: &str) -> Result<Url, ProbeError> {
    Url::parse(raw).map_err(|source| ProbeError::InvalidUrl {
        url: raw.to_string(),
        source,
    })
}

/// GET `url` and require a 2xx with a non-empty `status` field.
pub async fn probe(url: &Url, timeout: Duration) -> Result<HealthState, ProbeError> {
    let client = Client::builder().timeout(timeout).build()?;
    let response = client.get(url.as_str()).send().await?;

    let status = response.status();
    if !status.is_success() {
        return Err(ProbeError::Status(status));
    }

    let body: serde_json::Value = response.json().await?;
    match body.get("status").and_then(|s| s.as_str()) {
        Some(s) if !s.is_empty() => {
            let parsed: Result<HealthStatus, _> = serde_json::from_value(body.clone());
            // Unrecognised markers are reported as degraded.
            Ok(parsed.map(|h| h.status).unwrap_or(HealthState::Degraded))
        }
        _ => Err(ProbeError::EmptyStatus),
    }
}
