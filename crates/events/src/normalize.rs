use serde_json::Value;

use bodyworn_protocol::NormalizedEvent;
use bodyworn_protocol::constants::EVENT_STREAM_STARTED;
use bodyworn_protocol::device::{CloudEvent, StreamMessage};

use crate::EventError;

/// Extracts a frontend event from one raw event stream message.
///
/// Returns `Ok(None)` for messages that carry no event or an event of any
/// other type. Non-string fields decode as empty strings.
pub fn normalize(raw: &str) -> Result<Option<NormalizedEvent>, EventError> {
    let message: StreamMessage = serde_json::from_str(raw)?;

    let event = message.event();
    if event.trim().is_empty() {
        return Ok(None);
    }

    let cloud: CloudEvent = serde_json::from_str(event).map_err(EventError::Body)?;
    if message.event_type() != EVENT_STREAM_STARTED {
        return Ok(None);
    }

    let Some(Value::Object(data)) = cloud.data else {
        return Err(EventError::InvalidData);
    };
    let field = |key: &str| {
        data.get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };

    Ok(Some(NormalizedEvent {
        event_type: EVENT_STREAM_STARTED.into(),
        subject: as_string(cloud.subject.as_ref()),
        session_id: field("sessionId"),
        recording_id: field("recordingId"),
        bearer_id: field("bearerId"),
        bearer_name: field("bearerName"),
        time: as_string(cloud.time.as_ref()),
    }))
}

fn as_string(value: Option<&Value>) -> String {
    value
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}
