// src/main.rs
use anyhow::{bail, Context, Result};
use temperature_collector::{
    cli::{Args, Command, USAGE},
    config::{self, Config},
    health::HealthState,
    logging, probe,
    server::shutdown_signal,
    App,
};
use tokio::sync::watch;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse(std::env::args().skip(1))?;
    if args.command == Command::Help {
        println!("{USAGE}");
        return Ok(());
    }

    let config = config::load_config(args.config_path.as_deref())
        .context("Failed to load configuration")?;

    match args.command {
        Command::Help => Ok(()),
        Command::PrintConfig => {
            print!("{}", config.to_yaml()?);
            Ok(())
        }
        Command::Healthcheck { url } => healthcheck(&config, url.as_deref()).await,
        Command::Serve => serve(config).await,
    }
}

async fn serve(config: Config) -> Result<()> {
    logging::init(&config.logging)?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        service = %config.server.service_name,
        "starting"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    // Registered before binding so that a signal is never missed once the
    // port accepts connections.
    let signal = shutdown_signal();
    let app = App::bind(&config, shutdown_rx.clone())
        .await
        .context("Failed to start listener")?;

    tokio::spawn(async move {
        signal.await;
        let _ = shutdown_tx.send(true);
    });

    app.run(shutdown_rx).await?;
    info!("shutdown complete");
    Ok(())
}

async fn healthcheck(config: &Config, url: Option<&str>) -> Result<()> {
    let url = match url {
        Some(raw) => probe::parse_url(raw)?,
        None => probe::health_url(config.server.socket_addr()?)?,
    };

    match probe::probe(&url, probe::DEFAULT_PROBE_TIMEOUT).await? {
        HealthState::Ok => {
            println!("{url}: ok");
            Ok(())
        }
        HealthState::Degraded => bail!("{url} reported degraded"),
    }
}
