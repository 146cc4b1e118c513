//! WebSocket tunnel between a frontend and the device signaling server.
//!
//! Frames are relayed untouched in both directions. Text stays text and
//! binary stays binary. Ping/pong is answered by each side's WebSocket
//! layer and not forwarded.

use std::fmt::Display;

use axum::extract::ws::{self, WebSocket};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use bodyworn_device::DeviceClient;

/// What to do with one received frame.
enum Relayed<M> {
    Forward(M),
    Close,
    Skip,
}

/// Runs one tunnel for an upgraded frontend socket.
///
/// On dial failure the frontend receives a single `{"error": "..."}` text
/// frame before being closed.
pub async fn run_tunnel(
    mut client: WebSocket,
    device: &DeviceClient,
    token: &str,
    cancel: CancellationToken,
) {
    let upstream = match device.connect_signaling(token).await {
        Ok(socket) => socket,
        Err(e) => {
            warn!(error = %e, "failed to connect to signaling server");
            let frame = serde_json::json!({ "error": e.to_string() }).to_string();
            let _ = client.send(ws::Message::Text(frame.into())).await;
            let _ = client.send(ws::Message::Close(None)).await;
            return;
        }
    };
    info!("proxy connection established");

    let (client_sink, client_stream) = client.split();
    let (device_sink, device_stream) = upstream.split();

    let to_device = tokio::spawn(relay(
        client_stream,
        device_sink,
        from_client,
        cancel.clone(),
        "frontend -> device",
    ));
    let to_client = tokio::spawn(relay(
        device_stream,
        client_sink,
        from_device,
        cancel.clone(),
        "device -> frontend",
    ));

    let _ = tokio::join!(to_device, to_client);
    info!("proxy connection closed");
}

/// Copies frames from `source` to `sink` until either side stops or
/// `cancel` fires, then cancels the opposite direction and closes `sink`.
async fn relay<R, W, In, Out, RE, WE>(
    mut source: R,
    mut sink: W,
    convert: fn(In) -> Relayed<Out>,
    cancel: CancellationToken,
    direction: &'static str,
) where
    R: Stream<Item = Result<In, RE>> + Unpin,
    W: Sink<Out, Error = WE> + Unpin,
    RE: Display,
    WE: Display,
{
    loop {
        let msg = tokio::select! {
            _ = cancel.cancelled() => break,
            msg = source.next() => msg,
        };

        match msg {
            Some(Ok(frame)) => match convert(frame) {
                Relayed::Forward(out) => {
                    if let Err(e) = sink.send(out).await {
                        debug!(direction, "relay write failed: {e}");
                        break;
                    }
                }
                Relayed::Close => {
                    debug!(direction, "close frame received");
                    break;
                }
                Relayed::Skip => {}
            },
            Some(Err(e)) => {
                debug!(direction, "relay read failed: {e}");
                break;
            }
            None => {
                debug!(direction, "stream ended");
                break;
            }
        }
    }

    cancel.cancel();
    let _ = sink.close().await;
}

fn from_client(msg: ws::Message) -> Relayed<tungstenite::Message> {
    match msg {
        ws::Message::Text(text) => Relayed::Forward(tungstenite::Message::Text(text.as_str().into())),
        ws::Message::Binary(data) => Relayed::Forward(tungstenite::Message::Binary(data)),
        ws::Message::Close(_) => Relayed::Close,
        ws::Message::Ping(_) | ws::Message::Pong(_) => Relayed::Skip,
    }
}

fn from_device(msg: tungstenite::Message) -> Relayed<ws::Message> {
    match msg {
        tungstenite::Message::Text(text) => Relayed::Forward(ws::Message::Text(text.as_str().into())),
        tungstenite::Message::Binary(data) => Relayed::Forward(ws::Message::Binary(data)),
        tungstenite::Message::Close(_) => Relayed::Close,
        tungstenite::Message::Ping(_)
        | tungstenite::Message::Pong(_)
        | tungstenite::Message::Frame(_) => Relayed::Skip,
    }
}
