//! Device URL layout.

use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};

use bodyworn_protocol::constants::{
    DEFAULT_SIGNALING_PORT, EVENT_STREAM_PATH, SIGNALING_PATH, TOKEN_PATH, WS_SESSION_PATH,
};

/// Base URLs of the device services.
///
/// A real device serves its CGIs over plain HTTP, the event stream over
/// WSS on the default port and the signaling server over WSS on a
/// separate port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceEndpoints {
    /// e.g. `http://10.0.0.5`
    pub http_base: String,
    /// e.g. `wss://10.0.0.5`
    pub stream_base: String,
    /// e.g. `wss://10.0.0.5:8082`
    pub signaling_base: String,
}

impl DeviceEndpoints {
    /// Endpoints of a device reachable at `address` (host or IP).
    pub fn for_address(address: &str, signaling_port: u16) -> Self {
        Self {
            http_base: format!("http://{address}"),
            stream_base: format!("wss://{address}"),
            signaling_base: format!("wss://{address}:{signaling_port}"),
        }
    }

    pub fn token_url(&self) -> String {
        format!("{}{TOKEN_PATH}", self.http_base)
    }

    pub fn session_url(&self) -> String {
        format!("{}{WS_SESSION_PATH}", self.http_base)
    }

    pub fn event_stream_url(&self, session_id: &str) -> String {
        format!(
            "{}{EVENT_STREAM_PATH}?wssession={}&sources=events",
            self.stream_base,
            escape(session_id)
        )
    }

    pub fn signaling_url(&self, token: &str) -> String {
        format!(
            "{}{SIGNALING_PATH}?authorization={}",
            self.signaling_base,
            escape(token)
        )
    }
}

impl Default for DeviceEndpoints {
    fn default() -> Self {
        Self::for_address("127.0.0.1", DEFAULT_SIGNALING_PORT)
    }
}

fn escape(value: &str) -> String {
    utf8_percent_encode(value, NON_ALPHANUMERIC).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_urls() {
        let ep = DeviceEndpoints::for_address("10.0.0.5", 8082);
        assert_eq!(
            ep.token_url(),
            "http://10.0.0.5/local/BodyWornLiveSelfHosted/auth.cgi"
        );
        assert_eq!(ep.session_url(), "http://10.0.0.5/axis-cgi/wssession.cgi");
        assert_eq!(
            ep.event_stream_url("abc"),
            "wss://10.0.0.5/vapix/ws-data-stream?wssession=abc&sources=events"
        );
        assert_eq!(
            ep.signaling_url("T1"),
            "wss://10.0.0.5:8082/client?authorization=T1"
        );
    }

    #[test]
    fn query_values_are_escaped() {
        let ep = DeviceEndpoints::for_address("cam.local", 9000);
        assert_eq!(
            ep.signaling_url("a+b/c=="),
            "wss://cam.local:9000/client?authorization=a%2Bb%2Fc%3D%3D"
        );
        assert_eq!(
            ep.event_stream_url("s id&x"),
            "wss://cam.local/vapix/ws-data-stream?wssession=s%20id%26x&sources=events"
        );
    }
}
