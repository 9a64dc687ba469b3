// src/logging.rs
use crate::config::LoggingConfig;
use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber. `RUST_LOG` wins over `logging.level`.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let rust_log = std::env::var("RUST_LOG").ok();
    let filter = build_filter(rust_log.as_deref(), config)?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(config.ansi)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))
}

/// A set but malformed `RUST_LOG` is an error, not a silent fallback.
fn build_filter(rust_log: Option<&str>, config: &LoggingConfig) -> Result<EnvFilter> {
    match rust_log.map(str::trim).filter(|s| !s.is_empty()) {
        Some(directives) => EnvFilter::try_new(directives)
            .with_context(|| format!("invalid RUST_LOG {directives:?}")),
        None => Ok(EnvFilter::try_new(&config.level)
            .with_context(|| format!("invalid logging.level {:?}", config.level))?
            .add_directive("hyper=info".parse()?)),
    }
}
