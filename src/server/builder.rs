// ────────────────────────────────
// src/server/builder.rs
// ────────────────────────────────
use crate::error::ServerError;
use crate::metrics::MetricsCollector;
use crate::server::listener::bind_tcp;
use hyper::{server::conn::Http, Body, Request, Response};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tower::Service;
use tracing::{debug, info, warn};

const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(10);
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Lifecycle of a listener. `Serving` is entered after a successful bind and
/// left exactly once, when the listener has been released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Stopped,
    Serving,
}

/// Builder pattern so `main.rs` can inject its handler.
pub struct ServerBuilder<H> {
    addr: SocketAddr,
    name: &'static str,
    handler: Option<H>,
    grace_period: Duration,
    metrics: Option<Arc<MetricsCollector>>,
}

impl<H> ServerBuilder<H>
where
    H: Service<Request<Body>, Response = Response<Body>> + Send + Clone + 'static,
    H::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    H::Future: Send + 'static,
{
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            name: "http",
            handler: None,
            grace_period: DEFAULT_GRACE_PERIOD,
            metrics: None,
        }
    }

    /// Label used in log lines, e.g. `http` or `metrics`.
    pub fn with_name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    pub fn with_handler(mut self, handler: H) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Upper bound on how long in-flight connections may drain after a
    /// shutdown signal.
    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Bind the TCP socket. On success the server is `Serving`.
    pub async fn bind(self) -> Result<Server<H>, ServerError> {
        let handler = self.handler.ok_or(ServerError::MissingHandler)?;
        let listener = bind_tcp(self.addr).await?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| ServerError::Bind {
                addr: self.addr,
                source,
            })?;

        let (state_tx, _) = watch::channel(ServerState::Stopped);
        state_tx.send_replace(ServerState::Serving);
        info!(server = self.name, "listening on {}", local_addr);

        Ok(Server {
            listener,
            local_addr,
            name: self.name,
            handler,
            grace_period: self.grace_period,
            metrics: self.metrics,
            state_tx,
        })
    }
}

pub struct Server<H> {
    listener: TcpListener,
    local_addr: SocketAddr,
    name: &'static str,
    handler: H,
    grace_period: Duration,
    metrics: Option<Arc<MetricsCollector>>,
    state_tx: watch::Sender<ServerState>,
}

impl<H> Server<H>
where
    H: Service<Request<Body>, Response = Response<Body>> + Send + Clone + 'static,
    H::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    H::Future: Send + 'static,
{
    /// The bound address; differs from the requested one when port 0 was used.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn state(&self) -> watch::Receiver<ServerState> {
        self.state_tx.subscribe()
    }

    /// Accept connections until `signal` resolves, then drain.
    ///
    /// Each connection runs on its own task. Once the signal fires the
    /// listener is dropped and every open connection is asked to finish its
    /// in-flight request and close. Connections still open after the grace
    /// period are aborted.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()>,
    {
        let Server {
            listener,
            local_addr,
            name,
            handler,
            grace_period,
            metrics,
            state_tx,
        } = self;

        let (drain_tx, drain_rx) = watch::channel(false);
        let mut connections = JoinSet::new();
        tokio::pin!(signal);

        loop {
            tokio::select! {
                _ = &mut signal => {
                    info!(server = name, "shutdown signal received, no longer accepting connections");
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let svc = handler.clone();
                        let drain = drain_rx.clone();
                        let guard = ConnectionGuard::new(metrics.clone());
                        connections.spawn(serve_connection(stream, peer, svc, drain, guard));
                    }
                    Err(err) => {
                        // Usually fd exhaustion; keep the listener alive.
                        warn!(server = name, %err, "failed to accept connection");
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    }
                },
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
            }
        }

        drop(listener);
        drain_tx.send_replace(true);

        let in_flight = connections.len();
        if in_flight > 0 {
            debug!(server = name, in_flight, "draining connections");
        }

        let drained = tokio::time::timeout(grace_period, async {
            while connections.join_next().await.is_some() {}
        })
        .await;

        match drained {
            Ok(()) => info!(server = name, "all connections drained"),
            Err(_) => {
                warn!(
                    server = name,
                    remaining = connections.len(),
                    "grace period of {:?} elapsed, dropping remaining connections",
                    grace_period
                );
                connections.abort_all();
                while connections.join_next().await.is_some() {}
            }
        }

        state_tx.send_replace(ServerState::Stopped);
        info!(server = name, "listener on {} stopped", local_addr);
        Ok(())
    }
}

async fn serve_connection<H>(
    stream: tokio::net::TcpStream,
    peer: SocketAddr,
    svc: H,
    mut drain: watch::Receiver<bool>,
    _guard: ConnectionGuard,
) where
    H: Service<Request<Body>, Response = Response<Body>> + Send + 'static,
    H::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    H::Future: Send + 'static,
{
    let conn = Http::new().serve_connection(stream, svc);
    tokio::pin!(conn);

    let result = tokio::select! {
        res = conn.as_mut() => res,
        _ = drain.changed() => {
            conn.as_mut().graceful_shutdown();
            conn.as_mut().await
        }
    };

    if let Err(err) = result {
        debug!(%peer, %err, "connection error");
    }
}

/// Keeps the active connection gauge honest even when a task is aborted.
struct ConnectionGuard(Option<Arc<MetricsCollector>>);

impl ConnectionGuard {
    fn new(metrics: Option<Arc<MetricsCollector>>) -> Self {
        if let Some(metrics) = &metrics {
            metrics.increment_active_connections();
        }
        Self(metrics)
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        if let Some(metrics) = &self.0 {
            metrics.decrement_active_connections();
        }
    }
}
