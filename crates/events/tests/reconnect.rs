//! Subscriber behaviour against the in-process device.

use std::time::Duration;

use bodyworn_device::mock::{MockDevice, wait_until};
use bodyworn_events::{EventSubscriber, SubscriberConfig};
use bodyworn_protocol::NormalizedEvent;
use bodyworn_protocol::constants::EVENT_STREAM_STARTED;
use bodyworn_protocol::device::events_configure_request;
use serde_json::json;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

fn fast() -> SubscriberConfig {
    SubscriberConfig {
        retry_delay: Duration::from_millis(50),
    }
}

fn notification(event_type: &str, session_id: &str) -> String {
    let event = json!({
        "subject": "target-7",
        "time": "2024-05-01T10:00:00Z",
        "data": {
            "sessionId": session_id,
            "recordingId": "rec1",
            "bearerId": "b1",
            "bearerName": "Officer A"
        }
    })
    .to_string();
    json!({
        "apiVersion": "1.0",
        "method": "events:notify",
        "params": { "notification": { "message": { "data": {
            "eventType": event_type,
            "event": event
        }}}}
    })
    .to_string()
}

fn spawn_subscriber(
    device: &MockDevice,
) -> (mpsc::Receiver<NormalizedEvent>, CancellationToken, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(16);
    let cancel = CancellationToken::new();
    let subscriber = EventSubscriber::new(device.client(), tx, fast());
    let handle = tokio::spawn(subscriber.run(cancel.clone()));
    (rx, cancel, handle)
}

async fn recv(rx: &mut mpsc::Receiver<NormalizedEvent>) -> NormalizedEvent {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("channel closed")
}

#[tokio::test]
async fn subscribes_and_forwards_stream_started() {
    let device = MockDevice::start().await;
    device.set_session_id("sess-1");
    let (mut rx, cancel, handle) = spawn_subscriber(&device);

    device.wait_for_subscriptions(1).await;
    assert_eq!(
        device.subscriptions()[0],
        serde_json::to_string(&events_configure_request()).unwrap()
    );
    assert_eq!(
        device.event_stream_queries(),
        vec!["wssession=sess-1&sources=events".to_string()]
    );

    device.emit_event(&notification("com.axis.bodyworn.stream.stopped", "x"));
    device.emit_event("{not json");
    device.emit_event(&notification(EVENT_STREAM_STARTED, "abc"));

    let ev = recv(&mut rx).await;
    assert_eq!(ev.session_id, "abc");
    assert_eq!(ev.recording_id, "rec1");
    assert_eq!(ev.bearer_id, "b1");
    assert_eq!(ev.bearer_name, "Officer A");
    assert_eq!(ev.subject, "target-7");
    assert_eq!(ev.time, "2024-05-01T10:00:00Z");

    cancel.cancel();
    handle.await.unwrap();
}

#[tokio::test]
async fn reconnects_after_device_closes_stream() {
    let device = MockDevice::start().await;
    let (mut rx, cancel, handle) = spawn_subscriber(&device);

    device.wait_for_subscriptions(1).await;
    device.drop_event_streams();
    device.wait_for_subscriptions(2).await;
    assert_eq!(device.session_requests(), 2);

    device.emit_event(&notification(EVENT_STREAM_STARTED, "after-reconnect"));
    assert_eq!(recv(&mut rx).await.session_id, "after-reconnect");

    cancel.cancel();
    handle.await.unwrap();
}

#[tokio::test]
async fn retries_until_session_is_available() {
    let device = MockDevice::start().await;
    device.set_session_id("");
    let (_rx, cancel, handle) = spawn_subscriber(&device);

    let probe = &device;
    wait_until(|| probe.session_requests() >= 2).await;
    assert!(device.subscriptions().is_empty());

    device.set_session_id("sess-2");
    device.wait_for_subscriptions(1).await;
    assert_eq!(
        device.event_stream_queries(),
        vec!["wssession=sess-2&sources=events".to_string()]
    );

    cancel.cancel();
    handle.await.unwrap();
}

#[tokio::test]
async fn stops_when_receiver_is_dropped() {
    let device = MockDevice::start().await;
    let (rx, cancel, handle) = spawn_subscriber(&device);

    device.wait_for_subscriptions(1).await;
    drop(rx);
    device.emit_event(&notification(EVENT_STREAM_STARTED, "abc"));

    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("subscriber should stop")
        .unwrap();
    assert!(!cancel.is_cancelled());
}
