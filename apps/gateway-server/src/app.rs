//! Wiring of background tasks and the HTTP server.

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use bodyworn_device::{DeviceClient, TlsPolicy};
use bodyworn_events::{EventSubscriber, SubscriberConfig};
use bodyworn_gateway::{GatewayState, TokenMode, forward_events, router, serve};
use bodyworn_token::{RefreshPolicy, TokenManager};

use crate::config::Config;

/// Events buffered between the device subscriber and the broadcaster.
const EVENT_CHANNEL: usize = 256;

/// Runs the gateway until `cancel` fires.
pub async fn run(config: Config, cancel: CancellationToken) -> anyhow::Result<()> {
    let tls = TlsPolicy::from_flag(config.accept_invalid_device_certs);
    if tls.accepts_invalid_certs() {
        warn!(
            device = %config.device.address,
            "device certificate validation is disabled"
        );
    }

    let device = DeviceClient::from_config(&config.device, config.signaling_port, tls)?;
    let tokens = Arc::new(TokenManager::new(device.clone(), RefreshPolicy::default()));
    let state = Arc::new(GatewayState::new(
        config.device.clone(),
        tokens.clone(),
        config.token_mode,
        cancel.clone(),
    ));

    // Bind before spawning anything so a busy port fails startup cleanly.
    let listener = TcpListener::bind(config.listen_addr).await?;

    let mut tasks = Vec::new();

    match config.token_mode {
        TokenMode::Cached => {
            let cancel = cancel.child_token();
            tasks.push(tokio::spawn(async move { tokens.run(cancel).await }));
        }
        TokenMode::PerRequest => info!("token mode per_request, background refresh disabled"),
    }

    let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL);
    let subscriber = EventSubscriber::new(device, events_tx, SubscriberConfig::default());
    tasks.push(tokio::spawn(subscriber.run(cancel.child_token())));
    tasks.push(tokio::spawn(forward_events(
        state.clone(),
        events_rx,
        cancel.child_token(),
    )));

    info!(
        device = %config.device.address,
        static_dir = %config.static_dir.display(),
        token_mode = ?config.token_mode,
        "starting gateway"
    );
    let app = router(state, &config.static_dir);
    let result = serve(listener, app, cancel.clone()).await;

    cancel.cancel();
    for task in tasks {
        let _ = task.await;
    }
    result?;
    Ok(())
}
