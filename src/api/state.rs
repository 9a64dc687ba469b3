// src/api/state.rs
use crate::health::HealthRegistry;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Read-only state shared by every request.
#[derive(Clone)]
pub struct AppState {
    pub service_name: String,
    pub version: &'static str,
    pub started_at: DateTime<Utc>,
    pub health: Arc<HealthRegistry>,
}

impl AppState {
    pub fn new(service_name: impl Into<String>, health: Arc<HealthRegistry>) -> Self {
        Self {
            service_name: service_name.into(),
            version: env!("CARGO_PKG_VERSION"),
            started_at: Utc::now(),
            health,
        }
    }
}
