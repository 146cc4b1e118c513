use std::time::Duration;

/// Timeout applied to every plain HTTP call made to the device.
pub const DEVICE_HTTP_TIMEOUT: Duration = Duration::from_secs(5);

/// How long before `expiresAt` the token is refreshed.
pub const TOKEN_REFRESH_LEAD: Duration = Duration::from_secs(10);

/// Lower bound on the delay between two successful token fetches.
pub const TOKEN_MIN_REFRESH_DELAY: Duration = Duration::from_secs(10);

/// Delay before retrying after a failed token fetch.
pub const TOKEN_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Lifetime assumed when the device omits `expiresAt`.
pub const TOKEN_DEFAULT_LIFETIME: Duration = Duration::from_secs(60);

/// Delay before reconnecting the event stream after any failure.
pub const EVENT_STREAM_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Port of the device signaling WebSocket server.
pub const DEFAULT_SIGNALING_PORT: u16 = 8082;

/// Path of the signaling token endpoint (ACAP CGI).
pub const TOKEN_PATH: &str = "/local/BodyWornLiveSelfHosted/auth.cgi";

/// Path of the WebSocket session endpoint.
pub const WS_SESSION_PATH: &str = "/axis-cgi/wssession.cgi";

/// Path of the device event stream.
pub const EVENT_STREAM_PATH: &str = "/vapix/ws-data-stream";

/// Path of the device signaling endpoint.
pub const SIGNALING_PATH: &str = "/client";

/// API version sent in every device JSON request.
pub const API_VERSION: &str = "1.0";

/// JSON-RPC method that issues a signaling client token.
pub const METHOD_GET_SIGNALING_TOKEN: &str = "getSignalingClientToken";

/// JSON-RPC method that configures the event stream filters.
pub const METHOD_EVENTS_CONFIGURE: &str = "events:configure";

/// Topic filter for the signaling cloud events.
pub const SIGNALING_TOPIC_FILTER: &str = "tns1:WebRTC/tnsaxis:Signaling/CloudEvent";

/// The only event type forwarded to frontends.
pub const EVENT_STREAM_STARTED: &str = "com.axis.bodyworn.stream.started";
