// src/health/checker.rs
use super::{HealthState, HealthStatus};
use crate::metrics::MetricsCollector;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{timeout, Duration};
use tracing::{debug, warn};

/// A single dependency or process condition that contributes to `/health`.
#[async_trait]
pub trait HealthCheck: Send + Sync {
    fn name(&self) -> &str;

    /// `Err` carries a human readable reason and marks the service degraded.
    async fn check(&self) -> Result<(), String>;
}

#[derive(Debug)]
pub struct HealthCheckResult {
    pub name: String,
    pub healthy: bool,
    pub response_time_ms: u64,
    pub error: Option<String>,
}

pub struct HealthRegistry {
    checks: Vec<Arc<dyn HealthCheck>>,
    timeout: Duration,
    metrics: Option<Arc<MetricsCollector>>,
}

impl HealthRegistry {
    pub fn new(timeout: Duration) -> Self {
        Self {
            checks: Vec::new(),
            timeout,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn register(mut self, check: Arc<dyn HealthCheck>) -> Self {
        self.checks.push(check);
        self
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    /// Run every check concurrently and fold the results into a fresh
    /// [`HealthStatus`]. An empty registry is healthy.
    pub async fn evaluate(&self) -> HealthStatus {
        let results = futures::future::join_all(
            self.checks.iter().map(|check| self.run_check(check.as_ref())),
        )
        .await;

        let mut state = HealthState::Ok;
        for result in &results {
            if result.healthy {
                debug!(check = %result.name, ms = result.response_time_ms, "health check passed");
            } else {
                state = HealthState::Degraded;
                warn!(
                    check = %result.name,
                    ms = result.response_time_ms,
                    "health check failed: {}",
                    result.error.as_deref().unwrap_or("unknown")
                );
            }
        }

        if let Some(metrics) = &self.metrics {
            metrics.update_health_status(state.is_ok());
        }

        HealthStatus { status: state }
    }

    async fn run_check(&self, check: &dyn HealthCheck) -> HealthCheckResult {
        let start = std::time::Instant::now();
        let outcome = timeout(self.timeout, check.check()).await;
        let response_time_ms = start.elapsed().as_millis() as u64;

        let (healthy, error) = match outcome {
            Ok(Ok(())) => (true, None),
            Ok(Err(reason)) => (false, Some(reason)),
            Err(_) => (false, Some(format!("timed out after {:?}", self.timeout))),
        };

        HealthCheckResult {
            name: check.name().to_string(),
            healthy,
            response_time_ms,
            error,
        }
    }
}

/// Degraded as soon as shutdown has been requested, so that load balancers
/// stop routing new work while in-flight requests drain.
pub struct ShutdownCheck {
    shutdown_rx: watch::Receiver<bool>,
}

impl ShutdownCheck {
    pub fn new(shutdown_rx: watch::Receiver<bool>) -> Self {
        Self { shutdown_rx }
    }
}

#[async_trait]
impl HealthCheck for ShutdownCheck {
    fn name(&self) -> &str {
        "shutdown"
    }

    async fn check(&self) -> Result<(), String> {
        if *self.shutdown_rx.borrow() {
            Err("shutdown in progress".to_string())
        } else {
            Ok(())
        }
    }
}
