// src/server/shutdown.rs
use std::future::Future;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};

/// Resolves on Ctrl+C or SIGTERM.
///
/// Handlers are registered when this is called, not when the future is first
/// polled, so a signal arriving right after startup is not lost.
pub fn shutdown_signal() -> impl Future<Output = ()> + Send + 'static {
    #[cfg(unix)]
    let (interrupt, terminate) = (
        listen(signal::unix::SignalKind::interrupt(), "SIGINT"),
        listen(signal::unix::SignalKind::terminate(), "SIGTERM"),
    );

    async move {
        #[cfg(unix)]
        tokio::select! {
            _ = interrupt => {},
            _ = terminate => {},
        }

        #[cfg(not(unix))]
        if let Err(err) = signal::ctrl_c().await {
            error!(%err, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }

        info!("Shutdown signal received");
    }
}

#[cfg(unix)]
fn listen(
    kind: signal::unix::SignalKind,
    name: &'static str,
) -> impl Future<Output = ()> + Send + 'static {
    let registered = signal::unix::signal(kind);
    async move {
        match registered {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!(%err, "failed to install {} handler", name);
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Resolves once `rx` carries `true`, or its sender is gone.
pub async fn wait_for_shutdown(mut rx: watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}
