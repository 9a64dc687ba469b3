// src/health/mod.rs
mod checker;
mod status;

pub use checker::{HealthCheck, HealthCheckResult, HealthRegistry, ShutdownCheck};
pub use status::{HealthState, HealthStatus};
