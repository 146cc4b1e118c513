//! Event stream connection loop.

use std::time::Duration;

use futures_util::{SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use bodyworn_device::DeviceClient;
use bodyworn_protocol::NormalizedEvent;
use bodyworn_protocol::constants::EVENT_STREAM_RETRY_DELAY;
use bodyworn_protocol::device::events_configure_request;

use crate::{EventError, normalize};

#[derive(Debug, Clone)]
pub struct SubscriberConfig {
    /// Wait before reconnecting after the stream fails or closes.
    pub retry_delay: Duration,
}

impl Default for SubscriberConfig {
    fn default() -> Self {
        Self {
            retry_delay: EVENT_STREAM_RETRY_DELAY,
        }
    }
}

/// Long-lived subscriber to the device event stream.
pub struct EventSubscriber {
    device: DeviceClient,
    events: mpsc::Sender<NormalizedEvent>,
    config: SubscriberConfig,
}

impl EventSubscriber {
    pub fn new(
        device: DeviceClient,
        events: mpsc::Sender<NormalizedEvent>,
        config: SubscriberConfig,
    ) -> Self {
        Self {
            device,
            events,
            config,
        }
    }

    /// Connects, reads and reconnects until `cancel` fires or the event
    /// receiver is dropped.
    pub async fn run(self, cancel: CancellationToken) {
        let mut attempt: u32 = 0;

        loop {
            attempt = attempt.saturating_add(1);

            let result = tokio::select! {
                _ = cancel.cancelled() => return,
                r = self.stream_once(&cancel) => r,
            };

            match result {
                Ok(()) if cancel.is_cancelled() => return,
                Ok(()) => info!(attempt, "event stream closed by device"),
                Err(EventError::ReceiverClosed) => {
                    debug!("event receiver dropped, stopping subscriber");
                    return;
                }
                Err(e) => warn!(attempt, error = %e, "event stream failed"),
            }

            debug!(
                delay_secs = self.config.retry_delay.as_secs_f64(),
                "reconnecting to event stream"
            );
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(self.config.retry_delay) => {}
            }
        }
    }

    /// One session: session id, dial, subscribe, read until the stream ends.
    async fn stream_once(&self, cancel: &CancellationToken) -> Result<(), EventError> {
        let session_id = self.device.open_session().await?;
        debug!("obtained event stream session");

        let socket = self.device.connect_event_stream(&session_id).await?;
        info!("connected to device event stream");

        let (mut write, read) = socket.split();
        let subscribe = serde_json::to_string(&events_configure_request())?;
        write.send(Message::Text(subscribe.into())).await?;

        let result = pump_events(read, &self.events, cancel).await;
        let _ = write.close().await;
        result
    }
}

/// Reads stream messages and forwards normalized events.
///
/// Returns `Ok(())` when the stream ends or `cancel` fires. Messages that
/// fail to parse are logged and skipped.
pub async fn pump_events<S>(
    mut read: S,
    events: &mpsc::Sender<NormalizedEvent>,
    cancel: &CancellationToken,
) -> Result<(), EventError>
where
    S: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    loop {
        let msg = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            msg = read.next() => msg,
        };

        let text = match msg {
            Some(Ok(Message::Text(text))) => text.as_str().to_owned(),
            Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes.to_vec()) {
                Ok(text) => text,
                Err(e) => {
                    warn!("dropping non-UTF-8 event message: {e}");
                    continue;
                }
            },
            Some(Ok(Message::Close(frame))) => {
                debug!(?frame, "event stream close frame");
                return Ok(());
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(e.into()),
            None => return Ok(()),
        };

        match normalize(&text) {
            Ok(Some(event)) => {
                info!(
                    session_id = %event.session_id,
                    subject = %event.subject,
                    "stream started event"
                );
                events
                    .send(event)
                    .await
                    .map_err(|_| EventError::ReceiverClosed)?;
            }
            Ok(None) => trace!("ignoring event stream message"),
            Err(e) => warn!("skipping event message: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use futures_util::stream;
    use serde_json::json;

    use bodyworn_protocol::constants::EVENT_STREAM_STARTED;

    use super::*;

    fn started(session_id: &str) -> Message {
        let event = json!({
            "subject": "target-1",
            "time": "2024-05-01T10:00:00Z",
            "data": { "sessionId": session_id }
        })
        .to_string();
        let raw = json!({
            "params": { "notification": { "message": { "data": {
                "eventType": EVENT_STREAM_STARTED,
                "event": event
            }}}}
        });
        Message::Text(raw.to_string().into())
    }

    #[tokio::test]
    async fn forwards_only_normalized_events() {
        let (tx, mut rx) = mpsc::channel(8);
        let input = stream::iter(vec![
            Ok(Message::Text("garbage".into())),
            Ok(started("s1")),
            Ok(Message::Ping(Vec::new().into())),
            Ok(Message::Binary(started("s2").into_data())),
        ]);

        pump_events(input, &tx, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(rx.recv().await.unwrap().session_id, "s1");
        assert_eq!(rx.recv().await.unwrap().session_id, "s2");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn stops_at_close_frame() {
        let (tx, mut rx) = mpsc::channel(8);
        let input = stream::iter(vec![Ok(Message::Close(None)), Ok(started("late"))]);

        pump_events(input, &tx, &CancellationToken::new())
            .await
            .unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn read_error_is_reported() {
        let (tx, _rx) = mpsc::channel(8);
        let input = stream::iter(vec![Err(tungstenite::Error::ConnectionClosed)]);

        let err = pump_events(input, &tx, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, EventError::WebSocket(_)));
    }

    #[tokio::test]
    async fn dropped_receiver_is_reported() {
        let (tx, rx) = mpsc::channel(8);
        drop(rx);
        let input = stream::iter(vec![Ok(started("s1"))]);

        let err = pump_events(input, &tx, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, EventError::ReceiverClosed));
    }

    #[tokio::test]
    async fn cancel_ends_pump() {
        let (tx, _rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let input = stream::pending::<Result<Message, tungstenite::Error>>();
        pump_events(input, &tx, &cancel).await.unwrap();
    }
}
