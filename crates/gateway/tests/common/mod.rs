#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bodyworn_device::mock::MockDevice;
use bodyworn_gateway::{GatewayState, TokenMode, router, serve};
use bodyworn_protocol::DeviceConfig;
use bodyworn_token::{RefreshPolicy, TokenManager};
use futures_util::StreamExt;
use tempfile::TempDir;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

pub type ClientSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub const INDEX_HTML: &str = "<html><body>bodyworn</body></html>";
pub const APP_JS: &str = "console.log('bodyworn');";

/// A gateway served on a loopback port, talking to a mock device.
pub struct Gateway {
    pub device: MockDevice,
    pub state: Arc<GatewayState>,
    pub addr: SocketAddr,
    pub cancel: CancellationToken,
    _static_dir: TempDir,
}

impl Gateway {
    pub async fn start(mode: TokenMode) -> Self {
        let device = MockDevice::start().await;
        let tokens = Arc::new(TokenManager::new(device.client(), RefreshPolicy::default()));
        let config = DeviceConfig {
            address: device.addr().to_string(),
            username: "root".into(),
            password: "pass".into(),
            target_id: "cfg-target".into(),
        };
        let cancel = CancellationToken::new();
        let state = Arc::new(GatewayState::new(config, tokens, mode, cancel.clone()));

        let static_dir = tempfile::tempdir().unwrap();
        std::fs::write(static_dir.path().join("index.html"), INDEX_HTML).unwrap();
        std::fs::write(static_dir.path().join("app.js"), APP_JS).unwrap();

        let app = router(state.clone(), static_dir.path());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(serve(listener, app, cancel.clone()));

        Self {
            device,
            state,
            addr,
            cancel,
            _static_dir: static_dir,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    pub async fn connect(&self, path: &str) -> ClientSocket {
        let (socket, _) = tokio_tungstenite::connect_async(format!("ws://{}{path}", self.addr))
            .await
            .unwrap();
        socket
    }
}

impl Drop for Gateway {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Next data frame, skipping control frames. `None` once the socket closes.
pub async fn next_frame(socket: &mut ClientSocket) -> Option<Message> {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), socket.next())
            .await
            .expect("timed out waiting for frame");
        match msg {
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
            Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return None,
            Some(Ok(msg)) => return Some(msg),
        }
    }
}
