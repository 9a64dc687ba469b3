// ────────────────────────────────
// src/server/listener.rs
// Encapsulates low‑level TCP bind so the fatal error carries the address.
// ────────────────────────────────
use crate::error::ServerError;
use std::net::SocketAddr;
use tokio::net::TcpListener;

pub async fn bind_tcp(addr: SocketAddr) -> Result<TcpListener, ServerError> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_bind_on_same_port_reports_addr_in_use() {
        let first = bind_tcp("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let taken = first.local_addr().unwrap();

        let err = bind_tcp(taken).await.unwrap_err();
        assert!(err.is_addr_in_use(), "unexpected error: {err}");
        assert!(err.to_string().contains(&taken.to_string()));
    }
}
