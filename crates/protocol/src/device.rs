//! JSON envelopes exchanged with the device.

use serde::{Deserialize, Serialize};

use crate::constants::{
    API_VERSION, METHOD_EVENTS_CONFIGURE, METHOD_GET_SIGNALING_TOKEN, SIGNALING_TOPIC_FILTER,
};

/// Request envelope for the device JSON-RPC style CGIs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiRequest<P> {
    pub api_version: String,
    pub method: String,
    pub params: P,
}

impl<P> ApiRequest<P> {
    pub fn new(method: &str, params: P) -> Self {
        Self {
            api_version: API_VERSION.into(),
            method: method.into(),
            params,
        }
    }
}

/// Serializes as `{}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmptyParams {}

/// Body of the `getSignalingClientToken` call.
pub fn signaling_token_request() -> ApiRequest<EmptyParams> {
    ApiRequest::new(METHOD_GET_SIGNALING_TOKEN, EmptyParams {})
}

/// Response of the token CGI. Missing fields decode as empty strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenEnvelope {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub method: String,
    #[serde(default)]
    pub data: TokenData,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenData {
    #[serde(default)]
    pub token: String,
    /// RFC 3339 timestamp; empty when the device does not send one.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub expires_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventsConfigureParams {
    pub event_filter_list: Vec<EventFilter>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventFilter {
    pub topic_filter: String,
}

/// The single subscribe message sent after the event stream opens.
pub fn events_configure_request() -> ApiRequest<EventsConfigureParams> {
    ApiRequest::new(
        METHOD_EVENTS_CONFIGURE,
        EventsConfigureParams {
            event_filter_list: vec![EventFilter {
                topic_filter: SIGNALING_TOPIC_FILTER.into(),
            }],
        },
    )
}

/// Inbound event stream message.
///
/// Only the path `params.notification.message.data.{eventType,event}` is
/// decoded; everything else in the message is ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamMessage {
    #[serde(default)]
    pub params: StreamParams,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamParams {
    #[serde(default)]
    pub notification: Notification,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Notification {
    #[serde(default)]
    pub message: NotificationMessage,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationMessage {
    #[serde(default)]
    pub data: NotificationData,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationData {
    #[serde(default)]
    pub event_type: String,
    /// The cloud event, itself JSON encoded as a string.
    #[serde(default)]
    pub event: String,
}

impl StreamMessage {
    pub fn event_type(&self) -> &str {
        &self.params.notification.message.data.event_type
    }

    pub fn event(&self) -> &str {
        &self.params.notification.message.data.event
    }
}

/// The cloud event carried in [`NotificationData::event`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CloudEvent {
    #[serde(default)]
    pub subject: Option<serde_json::Value>,
    #[serde(default)]
    pub time: Option<serde_json::Value>,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}
