//! Authenticated calls against one device.

use chrono::{DateTime, Utc};
use reqwest::Method;
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

use bodyworn_digest_auth::{Credentials, DigestClient};
use bodyworn_protocol::DeviceConfig;
use bodyworn_protocol::constants::DEVICE_HTTP_TIMEOUT;
use bodyworn_protocol::device::{TokenEnvelope, signaling_token_request};

use crate::endpoints::DeviceEndpoints;
use crate::tls::TlsPolicy;
use crate::DeviceError;

/// WebSocket connection to a device service.
pub type DeviceSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A signaling token as issued by the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub value: String,
    /// `None` when the device omitted the expiry or sent one that does
    /// not parse as RFC 3339.
    pub expires_at: Option<DateTime<Utc>>,
}

/// Device API client.
///
/// Cheap to clone; clones share the underlying HTTP connection pool.
#[derive(Clone)]
pub struct DeviceClient {
    digest: DigestClient,
    endpoints: DeviceEndpoints,
    tls: TlsPolicy,
    connector: Option<tokio_tungstenite::Connector>,
}

impl DeviceClient {
    pub fn new(
        endpoints: DeviceEndpoints,
        credentials: Credentials,
        tls: TlsPolicy,
    ) -> Result<Self, DeviceError> {
        let http = reqwest::Client::builder()
            .timeout(DEVICE_HTTP_TIMEOUT)
            .danger_accept_invalid_certs(tls.accepts_invalid_certs())
            .build()?;

        Ok(Self {
            digest: DigestClient::new(http, credentials),
            endpoints,
            tls,
            connector: tls.connector()?,
        })
    }

    /// Client for the device described by `config`.
    pub fn from_config(
        config: &DeviceConfig,
        signaling_port: u16,
        tls: TlsPolicy,
    ) -> Result<Self, DeviceError> {
        Self::new(
            DeviceEndpoints::for_address(&config.address, signaling_port),
            Credentials::new(&config.username, &config.password),
            tls,
        )
    }

    pub fn endpoints(&self) -> &DeviceEndpoints {
        &self.endpoints
    }

    pub fn tls_policy(&self) -> TlsPolicy {
        self.tls
    }

    /// Requests a new signaling token.
    pub async fn fetch_token(&self) -> Result<IssuedToken, DeviceError> {
        let url = self.endpoints.token_url();
        let body = serde_json::to_string(&signaling_token_request())?;
        debug!(%url, "requesting signaling token");

        let text = self.post(&url, &body).await?;
        let envelope: TokenEnvelope = serde_json::from_str(&text)?;

        let value = envelope.data.token.trim();
        if value.is_empty() {
            return Err(DeviceError::EmptyToken);
        }

        Ok(IssuedToken {
            value: value.to_string(),
            expires_at: parse_expiry(envelope.data.expires_at.trim()),
        })
    }

    /// Opens a WebSocket session and returns its id.
    pub async fn open_session(&self) -> Result<String, DeviceError> {
        let url = self.endpoints.session_url();
        let text = self.post(&url, "").await?;

        let session_id = text.trim();
        if session_id.is_empty() {
            return Err(DeviceError::EmptySession);
        }
        Ok(session_id.to_string())
    }

    /// Dials the event stream for an open session.
    pub async fn connect_event_stream(&self, session_id: &str) -> Result<DeviceSocket, DeviceError> {
        self.connect(&self.endpoints.event_stream_url(session_id))
            .await
    }

    /// Dials the signaling server, authorizing with `token`.
    pub async fn connect_signaling(&self, token: &str) -> Result<DeviceSocket, DeviceError> {
        self.connect(&self.endpoints.signaling_url(token)).await
    }

    async fn connect(&self, url: &str) -> Result<DeviceSocket, DeviceError> {
        let (socket, response) = tokio_tungstenite::connect_async_tls_with_config(
            url,
            None,
            false,
            self.connector.clone(),
        )
        .await?;
        debug!(status = %response.status(), "device WebSocket connected");
        Ok(socket)
    }

    async fn post(&self, url: &str, body: &str) -> Result<String, DeviceError> {
        let resp = self.digest.send(Method::POST, url, body).await?;
        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            return Err(DeviceError::Status {
                status: status.as_u16(),
                body: text,
            });
        }
        Ok(text)
    }
}

fn parse_expiry(raw: &str) -> Option<DateTime<Utc>> {
    if raw.is_empty() {
        return None;
    }
    match DateTime::parse_from_rfc3339(raw) {
        Ok(t) => Some(t.with_timezone(&Utc)),
        Err(e) => {
            warn!(expires_at = %raw, "unparsable token expiry: {e}");
            None
        }
    }
}
