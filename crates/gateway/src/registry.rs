//! Frontend `/events` subscribers.
//!
//! Each connection gets a bounded outbound queue drained by its own write
//! pump. Broadcasting only enqueues, so a slow client never blocks the
//! others; a client whose queue is full or closed is dropped on the spot.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use axum::extract::ws::{Message, WebSocket};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Outbound queue length per client.
const CLIENT_QUEUE: usize = 64;

/// Identity of one `/events` connection.
pub type ClientId = Uuid;

struct EventClient {
    tx: mpsc::Sender<String>,
    cancel: CancellationToken,
}

#[derive(Default)]
pub struct ClientRegistry {
    clients: Mutex<HashMap<ClientId, EventClient>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a client. `cancel` is fired when the client is dropped.
    pub fn subscribe(&self, cancel: CancellationToken) -> (ClientId, mpsc::Receiver<String>) {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(CLIENT_QUEUE);
        self.lock().insert(id, EventClient { tx, cancel });
        (id, rx)
    }

    /// Removes a client. Returns false if it was already gone.
    pub fn unsubscribe(&self, id: ClientId) -> bool {
        match self.lock().remove(&id) {
            Some(client) => {
                client.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Queues `payload` for every client and returns how many accepted it.
    pub fn broadcast(&self, payload: &str) -> usize {
        let mut clients = self.lock();
        let mut delivered = 0;
        clients.retain(|id, client| match client.tx.try_send(payload.to_string()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(e) => {
                warn!(client = %id, "dropping event client: {e}");
                client.cancel.cancel();
                false
            }
        });
        delivered
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Serves one upgraded `/events` connection until it closes.
    pub async fn serve(&self, socket: WebSocket, cancel: CancellationToken) {
        let (id, rx) = self.subscribe(cancel.clone());
        info!(client = %id, clients = self.len(), "frontend subscribed to events");

        let (sink, stream) = socket.split();
        let writer = tokio::spawn(write_pump(sink, rx, cancel.clone()));
        read_pump(stream, cancel.clone()).await;

        self.unsubscribe(id);
        cancel.cancel();
        let _ = writer.await;
        info!(client = %id, clients = self.len(), "frontend disconnected from events");
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ClientId, EventClient>> {
        self.clients.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Drains the client queue into the socket.
async fn write_pump<S>(mut sink: S, mut rx: mpsc::Receiver<String>, cancel: CancellationToken)
where
    S: Sink<Message, Error = axum::Error> + Unpin,
{
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            msg = rx.recv() => match msg {
                Some(text) => {
                    if let Err(e) = sink.send(Message::Text(text.into())).await {
                        debug!("event client write error: {e}");
                        break;
                    }
                }
                None => break,
            },
        }
    }

    cancel.cancel();
    let _ = sink.send(Message::Close(None)).await;
}

/// Reads only to notice the client going away; frontend messages are ignored.
async fn read_pump<S>(mut stream: S, cancel: CancellationToken)
where
    S: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            msg = stream.next() => match msg {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!("event client read error: {e}");
                    break;
                }
            },
        }
    }
}
