// src/error.rs
use std::net::SocketAddr;

/// Fatal errors raised while bringing a listener up.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid listen address: {0}")]
    InvalidAddress(String),

    #[error("no request handler configured")]
    MissingHandler,

    #[error("failed to initialise metrics: {0}")]
    Metrics(String),
}

impl ServerError {
    pub fn is_addr_in_use(&self) -> bool {
        matches!(
            self,
            ServerError::Bind { source, .. } if source.kind() == std::io::ErrorKind::AddrInUse
        )
    }
}
