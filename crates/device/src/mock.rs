//! In-process fake device for tests.
//!
//! Serves the token and session CGIs behind Digest authentication, the
//! event stream WebSocket and the signaling WebSocket on a loopback port.
//! Everything is plain HTTP/WS; use [`MockDevice::client`] to get a
//! [`DeviceClient`] pointed at it.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use axum::Router;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{RawQuery, State};
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use bodyworn_digest_auth::{Challenge, Credentials, compute_response, parse_digest_params};
use bodyworn_protocol::constants::{EVENT_STREAM_PATH, SIGNALING_PATH, TOKEN_PATH, WS_SESSION_PATH};

use crate::{DeviceClient, DeviceEndpoints, TlsPolicy};

const REALM: &str = "AXIS_MOCK";
const NONCE: &str = "bW9jay1ub25jZQ==";
const WAIT_TIMEOUT: Duration = Duration::from_secs(5);

/// A canned reply of the token CGI.
#[derive(Debug, Clone)]
pub struct TokenReply {
    status: u16,
    body: String,
}

impl TokenReply {
    /// A successful reply carrying `token` and `expires_at` verbatim.
    pub fn token(token: &str, expires_at: &str) -> Self {
        let body = serde_json::json!({
            "apiVersion": "1.0",
            "method": "getSignalingClientToken",
            "data": { "token": token, "expiresAt": expires_at },
        });
        Self {
            status: 200,
            body: body.to_string(),
        }
    }

    pub fn status(status: u16, body: &str) -> Self {
        Self {
            status,
            body: body.to_string(),
        }
    }
}

/// Device side of one accepted signaling connection.
pub struct SignalingPeer {
    /// Raw query string of the upgrade request.
    pub query: String,
    /// Frames sent by the client. Closed when the connection ends.
    pub received: mpsc::UnboundedReceiver<Message>,
    /// Frames to send to the client. Dropping it closes the connection.
    pub outbound: mpsc::UnboundedSender<Message>,
}

struct MockState {
    credentials: Credentials,
    token_replies: Mutex<VecDeque<TokenReply>>,
    token_requests: AtomicUsize,
    last_token_body: Mutex<Option<String>>,
    session_id: Mutex<String>,
    session_requests: AtomicUsize,
    events: broadcast::Sender<String>,
    stream_queries: Mutex<Vec<String>>,
    subscriptions: Mutex<Vec<String>>,
    stream_cancel: Mutex<CancellationToken>,
    reject_signaling: AtomicBool,
    peers: mpsc::UnboundedSender<SignalingPeer>,
}

/// Running fake device. The server stops when this is dropped.
pub struct MockDevice {
    addr: SocketAddr,
    state: Arc<MockState>,
    peers: tokio::sync::Mutex<mpsc::UnboundedReceiver<SignalingPeer>>,
    server: JoinHandle<()>,
}

impl MockDevice {
    /// Starts a device accepting `root` / `pass`.
    pub async fn start() -> Self {
        Self::start_with(Credentials::new("root", "pass")).await
    }

    pub async fn start_with(credentials: Credentials) -> Self {
        let (peers_tx, peers_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(64);
        let state = Arc::new(MockState {
            credentials,
            token_replies: Mutex::new(VecDeque::new()),
            token_requests: AtomicUsize::new(0),
            last_token_body: Mutex::new(None),
            session_id: Mutex::new("mock-session".into()),
            session_requests: AtomicUsize::new(0),
            events,
            stream_queries: Mutex::new(Vec::new()),
            subscriptions: Mutex::new(Vec::new()),
            stream_cancel: Mutex::new(CancellationToken::new()),
            reject_signaling: AtomicBool::new(false),
            peers: peers_tx,
        });

        let app = Router::new()
            .route(TOKEN_PATH, any(token))
            .route(WS_SESSION_PATH, any(session))
            .route(EVENT_STREAM_PATH, any(event_stream))
            .route(SIGNALING_PATH, any(signaling))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock device");
        let addr = listener.local_addr().expect("mock device address");
        let server = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            addr,
            state,
            peers: tokio::sync::Mutex::new(peers_rx),
            server,
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn credentials(&self) -> Credentials {
        self.state.credentials.clone()
    }

    pub fn endpoints(&self) -> DeviceEndpoints {
        DeviceEndpoints {
            http_base: format!("http://{}", self.addr),
            stream_base: format!("ws://{}", self.addr),
            signaling_base: format!("ws://{}", self.addr),
        }
    }

    pub fn client(&self) -> DeviceClient {
        DeviceClient::new(self.endpoints(), self.credentials(), TlsPolicy::Verify)
            .expect("mock device client")
    }

    /// Queues a token reply. The last queued reply is repeated once the
    /// queue is down to one entry; an empty queue answers 503.
    pub fn push_token(&self, reply: TokenReply) {
        lock(&self.state.token_replies).push_back(reply);
    }

    /// Authenticated token requests served so far.
    pub fn token_requests(&self) -> usize {
        self.state.token_requests.load(Ordering::SeqCst)
    }

    pub fn last_token_body(&self) -> Option<String> {
        lock(&self.state.last_token_body).clone()
    }

    pub fn set_session_id(&self, id: &str) {
        *lock(&self.state.session_id) = id.to_string();
    }

    pub fn session_requests(&self) -> usize {
        self.state.session_requests.load(Ordering::SeqCst)
    }

    /// Sends a text frame to every connected event stream.
    pub fn emit_event(&self, raw: &str) {
        let _ = self.state.events.send(raw.to_string());
    }

    /// Query strings of every event stream upgrade, in order.
    pub fn event_stream_queries(&self) -> Vec<String> {
        lock(&self.state.stream_queries).clone()
    }

    /// Text frames received on event streams, in order.
    pub fn subscriptions(&self) -> Vec<String> {
        lock(&self.state.subscriptions).clone()
    }

    /// Waits until at least `n` subscribe messages have arrived.
    pub async fn wait_for_subscriptions(&self, n: usize) {
        let state = self.state.clone();
        wait_until(move || lock(&state.subscriptions).len() >= n).await;
    }

    /// Closes every open event stream from the device side.
    pub fn drop_event_streams(&self) {
        let old = std::mem::replace(
            &mut *lock(&self.state.stream_cancel),
            CancellationToken::new(),
        );
        old.cancel();
    }

    /// Makes signaling upgrades fail with 403.
    pub fn reject_signaling(&self, reject: bool) {
        self.state.reject_signaling.store(reject, Ordering::SeqCst);
    }

    /// Waits for the next accepted signaling connection.
    pub async fn next_signaling_peer(&self) -> SignalingPeer {
        let mut peers = self.peers.lock().await;
        tokio::time::timeout(WAIT_TIMEOUT, peers.recv())
            .await
            .expect("timed out waiting for signaling connection")
            .expect("mock device stopped")
    }
}

impl Drop for MockDevice {
    fn drop(&mut self) {
        lock(&self.state.stream_cancel).cancel();
        self.server.abort();
    }
}

/// Polls `cond` until it holds, panicking after a few seconds.
pub async fn wait_until(mut cond: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + WAIT_TIMEOUT;
    while !cond() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached in time"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

fn challenge_reply() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(
            "WWW-Authenticate",
            format!(r#"Digest realm="{REALM}", nonce="{NONCE}", algorithm=MD5, qop="auth""#),
        )],
    )
        .into_response()
}

fn authorized(state: &MockState, method: &Method, uri: &Uri, headers: &HeaderMap) -> bool {
    let Some(auth) = headers.get("authorization").and_then(|v| v.to_str().ok()) else {
        return false;
    };
    let params: HashMap<String, String> = parse_digest_params(auth).into_iter().collect();
    if params.get("username") != Some(&state.credentials.username)
        || params.get("uri").map(String::as_str) != Some(uri.path())
    {
        return false;
    }

    let challenge = Challenge {
        nonce: NONCE.into(),
        opaque: String::new(),
        qop: params.get("qop").cloned().unwrap_or_default(),
        realm: REALM.into(),
        algorithm: "MD5".into(),
        nonce_count: 1,
    };
    let cnonce = params.get("cnonce").cloned().unwrap_or_default();
    let expected = compute_response(
        &challenge,
        method.as_str(),
        uri.path(),
        &state.credentials,
        &cnonce,
    );
    matches!((expected, params.get("response")), (Ok(e), Some(r)) if &e == r)
}

async fn token(
    State(state): State<Arc<MockState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> Response {
    if headers.get("authorization").is_none() {
        return challenge_reply();
    }
    if !authorized(&state, &method, &uri, &headers) {
        return (StatusCode::UNAUTHORIZED, "bad credentials").into_response();
    }

    state.token_requests.fetch_add(1, Ordering::SeqCst);
    *lock(&state.last_token_body) = Some(body);

    let reply = {
        let mut replies = lock(&state.token_replies);
        if replies.len() > 1 {
            replies.pop_front()
        } else {
            replies.front().cloned()
        }
    };
    match reply {
        Some(reply) => {
            let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::OK);
            (status, reply.body).into_response()
        }
        None => (StatusCode::SERVICE_UNAVAILABLE, "no token").into_response(),
    }
}

async fn session(
    State(state): State<Arc<MockState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    if headers.get("authorization").is_none() {
        return challenge_reply();
    }
    if !authorized(&state, &method, &uri, &headers) {
        return (StatusCode::UNAUTHORIZED, "bad credentials").into_response();
    }
    state.session_requests.fetch_add(1, Ordering::SeqCst);
    let id = lock(&state.session_id).clone();
    (StatusCode::OK, id).into_response()
}

async fn event_stream(
    State(state): State<Arc<MockState>>,
    RawQuery(query): RawQuery,
    ws: WebSocketUpgrade,
) -> Response {
    lock(&state.stream_queries).push(query.unwrap_or_default());
    let events = state.events.subscribe();
    let cancel = lock(&state.stream_cancel).clone();
    ws.on_upgrade(move |socket| serve_event_stream(socket, state, events, cancel))
}

async fn serve_event_stream(
    mut socket: WebSocket,
    state: Arc<MockState>,
    mut events: broadcast::Receiver<String>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = socket.send(Message::Close(None)).await;
                break;
            }
            msg = socket.recv() => match msg {
                Some(Ok(Message::Text(text))) => {
                    lock(&state.subscriptions).push(text.as_str().to_owned());
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
            ev = events.recv() => match ev {
                Ok(raw) => {
                    if socket.send(Message::Text(raw.into())).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }
}

async fn signaling(
    State(state): State<Arc<MockState>>,
    RawQuery(query): RawQuery,
    ws: WebSocketUpgrade,
) -> Response {
    if state.reject_signaling.load(Ordering::SeqCst) {
        return (StatusCode::FORBIDDEN, "token rejected").into_response();
    }
    let query = query.unwrap_or_default();
    ws.on_upgrade(move |socket| serve_signaling(socket, state, query))
}

async fn serve_signaling(mut socket: WebSocket, state: Arc<MockState>, query: String) {
    let (received_tx, received) = mpsc::unbounded_channel();
    let (outbound, mut outbound_rx) = mpsc::unbounded_channel();
    let peer = SignalingPeer {
        query,
        received,
        outbound,
    };
    if state.peers.send(peer).is_err() {
        return;
    }

    loop {
        tokio::select! {
            msg = socket.recv() => match msg {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                Some(Ok(msg)) => {
                    let _ = received_tx.send(msg);
                }
            },
            out = outbound_rx.recv() => match out {
                Some(msg) => {
                    if socket.send(msg).await.is_err() {
                        break;
                    }
                }
                None => {
                    let _ = socket.send(Message::Close(None)).await;
                    break;
                }
            },
        }
    }
}
