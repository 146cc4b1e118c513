use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use bodyworn_protocol::NormalizedEvent;

use crate::state::GatewayState;

/// Feeds events from the subscriber channel to `/events` clients until the
/// channel closes or `cancel` fires.
pub async fn forward_events(
    state: Arc<GatewayState>,
    mut events: mpsc::Receiver<NormalizedEvent>,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => break,
            event = events.recv() => event,
        };
        let Some(event) = event else {
            debug!("event channel closed");
            break;
        };
        if let Err(e) = state.publish(&event) {
            warn!(error = %e, "failed to forward event");
        }
    }
}
