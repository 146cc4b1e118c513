//! Token refresh against the in-process device.

use std::sync::Arc;
use std::time::Duration;

use bodyworn_device::mock::{MockDevice, TokenReply, wait_until};
use bodyworn_token::{RefreshPolicy, TokenManager};
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn fetches_from_device() {
    let device = MockDevice::start().await;
    device.push_token(TokenReply::token("T1", "2099-01-01T00:00:00Z"));

    let manager = TokenManager::new(device.client(), RefreshPolicy::default());
    manager.refresh_once().await.unwrap();

    let snap = manager.snapshot().unwrap();
    assert_eq!(snap.value, "T1");
    assert_eq!(snap.expires_at.to_rfc3339(), "2099-01-01T00:00:00+00:00");
}

#[tokio::test]
async fn loop_recovers_after_device_failure() {
    let device = MockDevice::start().await;
    device.push_token(TokenReply::status(500, "busy"));
    device.push_token(TokenReply::token("T1", ""));

    let policy = RefreshPolicy {
        retry_delay: Duration::from_millis(50),
        ..RefreshPolicy::default()
    };
    let manager = Arc::new(TokenManager::new(device.client(), policy));
    let cancel = CancellationToken::new();

    let m = manager.clone();
    let c = cancel.clone();
    let handle = tokio::spawn(async move { m.run(c).await });

    let m = manager.clone();
    wait_until(move || m.snapshot().is_some()).await;
    assert_eq!(manager.snapshot().unwrap().value, "T1");
    assert_eq!(device.token_requests(), 2);

    cancel.cancel();
    handle.await.unwrap();
}
