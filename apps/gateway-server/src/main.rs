mod app;
mod config;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use config::{CONFIG_ENV, Config, resolve_path};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Process-wide rustls provider, set before any TLS client is built.
    let _ = rustls::crypto::ring::default_provider().install_default();

    let path = resolve_path(std::env::args().nth(1), std::env::var(CONFIG_ENV).ok());
    let config = Config::load(&path)?;
    info!(config = %path.display(), listen = %config.listen_addr, "loaded configuration");

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("shutdown requested");
                shutdown.cancel();
            }
            Err(e) => warn!("failed to listen for ctrl-c: {e}"),
        }
    });

    app::run(config, cancel).await
}
