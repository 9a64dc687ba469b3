// src/app.rs
//! Wires configuration, health, metrics and listeners into one runnable unit.

use crate::api::AppState;
use crate::config::Config;
use crate::error::ServerError;
use crate::health::{HealthRegistry, ShutdownCheck};
use crate::metrics::{MetricsHandler, MetricsRegistry};
use crate::server::{wait_for_shutdown, RequestHandler, Server, ServerBuilder, ServerState};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};

pub struct App {
    http: Server<RequestHandler>,
    metrics: Option<Server<MetricsHandler>>,
}

impl App {
    /// Bind every configured listener. Any failure here is fatal.
    pub async fn bind(config: &Config, shutdown_rx: watch::Receiver<bool>) -> Result<Self, ServerError> {
        let addr = config
            .server
            .socket_addr()
            .map_err(|e| ServerError::InvalidAddress(format!("{e:#}")))?;

        let metrics_registry = Arc::new(
            MetricsRegistry::new().map_err(|e| ServerError::Metrics(format!("{e:#}")))?,
        );
        let collector = metrics_registry.collector();

        let health = HealthRegistry::new(config.health.check_timeout())
            .with_metrics(collector.clone())
            .register(Arc::new(ShutdownCheck::new(shutdown_rx)));
        let state = Arc::new(AppState::new(
            config.server.service_name.clone(),
            Arc::new(health),
        ));

        let http = ServerBuilder::new(addr)
            .with_name("http")
            .with_handler(RequestHandler::new(state).with_metrics(collector.clone()))
            .with_grace_period(config.server.grace_period())
            .with_metrics(collector)
            .bind()
            .await?;

        let metrics = if config.metrics.enabled {
            let metrics_addr = config
                .metrics
                .socket_addr()
                .map_err(|e| ServerError::InvalidAddress(format!("{e:#}")))?;
            let server = ServerBuilder::new(metrics_addr)
                .with_name("metrics")
                .with_handler(MetricsHandler::new(
                    metrics_registry,
                    config.metrics.path.as_str(),
                ))
                .with_grace_period(config.server.grace_period())
                .bind()
                .await?;
            info!(
                "Metrics available at http://{}{}",
                server.local_addr(),
                config.metrics.path
            );
            Some(server)
        } else {
            None
        };

        Ok(Self { http, metrics })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.http.local_addr()
    }

    pub fn metrics_addr(&self) -> Option<SocketAddr> {
        self.metrics.as_ref().map(|m| m.local_addr())
    }

    pub fn state(&self) -> watch::Receiver<ServerState> {
        self.http.state()
    }

    /// Serve until `shutdown_rx` flips to `true`, then drain every listener.
    pub async fn run(self, shutdown_rx: watch::Receiver<bool>) -> Result<(), ServerError> {
        let metrics_task = self.metrics.map(|server| {
            let rx = shutdown_rx.clone();
            tokio::spawn(server.serve_with_shutdown(wait_for_shutdown(rx)))
        });

        let result = self
            .http
            .serve_with_shutdown(wait_for_shutdown(shutdown_rx))
            .await;

        if let Some(task) = metrics_task {
            match task.await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => error!(%err, "metrics listener failed"),
                Err(err) => error!(%err, "metrics listener task panicked"),
            }
        }

        result
    }
}
