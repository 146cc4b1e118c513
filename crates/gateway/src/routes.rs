//! Router and handlers.

use std::path::Path;
use std::sync::Arc;

use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::services::{ServeDir, ServeFile};
use tracing::{debug, info, warn};

use crate::state::{GatewayState, TokenMode};
use crate::{GatewayError, proxy};

const TOKEN_NOT_READY: &str = "Token not initialized yet. Please wait for background refresh.";

/// Body of `GET /token`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub token: String,
    pub target_id: String,
    /// When the token was fetched, RFC 3339.
    pub refreshed: String,
    pub expires_at: String,
}

#[derive(Debug, Deserialize)]
struct ProxyQuery {
    #[serde(default)]
    token: String,
}

/// Builds the gateway router. Assets are served from `static_dir`, with
/// `index.html` at `/`.
pub fn router(state: Arc<GatewayState>, static_dir: &Path) -> Router {
    Router::new()
        .route("/token", get(token))
        .route("/api/auth", get(auth))
        .route("/events", get(events))
        .route("/ws-proxy", get(ws_proxy))
        .nest_service("/static", ServeDir::new(static_dir))
        .route_service("/", ServeFile::new(static_dir.join("index.html")))
        .with_state(state)
}

/// Serves `app` on `listener` until `cancel` fires.
pub async fn serve(
    listener: TcpListener,
    app: Router,
    cancel: CancellationToken,
) -> Result<(), GatewayError> {
    info!(addr = %listener.local_addr()?, "gateway listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await?;
    Ok(())
}

async fn token(State(state): State<Arc<GatewayState>>) -> Response {
    let snapshot = match state.token_mode() {
        TokenMode::Cached => state.tokens().snapshot(),
        TokenMode::PerRequest => match state.tokens().fetch_fresh().await {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!(error = %e, "per-request token fetch failed");
                return (StatusCode::BAD_GATEWAY, format!("Failed to fetch token: {e}"))
                    .into_response();
            }
        },
    };

    let Some(snapshot) = snapshot.filter(|s| !s.value.is_empty()) else {
        return (StatusCode::SERVICE_UNAVAILABLE, TOKEN_NOT_READY).into_response();
    };

    let body = TokenResponse {
        token: snapshot.value,
        target_id: state.target_id(),
        refreshed: snapshot.issued_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        expires_at: snapshot.expires_at.to_rfc3339_opts(SecondsFormat::Secs, true),
    };
    debug!(refreshed = %body.refreshed, expires_at = %body.expires_at, "returning token");
    Json(body).into_response()
}

async fn auth(State(state): State<Arc<GatewayState>>) -> Response {
    Json(state.device_config()).into_response()
}

async fn events(State(state): State<Arc<GatewayState>>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| async move {
        let cancel = state.cancel_token().child_token();
        state.registry().serve(socket, cancel).await;
    })
}

async fn ws_proxy(
    State(state): State<Arc<GatewayState>>,
    Query(query): Query<ProxyQuery>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    if query.token.is_empty() {
        return (StatusCode::BAD_REQUEST, "Missing token").into_response();
    }
    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return rejection.into_response(),
    };

    ws.on_upgrade(move |socket| async move {
        let cancel = state.cancel_token().child_token();
        proxy::run_tunnel(socket, state.device(), &query.token, cancel).await;
    })
}
