use serde::{Deserialize, Serialize};

/// Event pushed to `/events` subscribers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub subject: String,
    pub session_id: String,
    pub recording_id: String,
    pub bearer_id: String,
    pub bearer_name: String,
    pub time: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_frontend_keys() {
        let ev = NormalizedEvent {
            event_type: "com.axis.bodyworn.stream.started".into(),
            subject: "target-1".into(),
            session_id: "abc".into(),
            recording_id: "rec1".into(),
            bearer_id: "b1".into(),
            bearer_name: "Officer A".into(),
            time: "2024-05-01T10:00:00Z".into(),
        };
        let v = serde_json::to_value(&ev).unwrap();
        assert_eq!(v["type"], "com.axis.bodyworn.stream.started");
        assert_eq!(v["sessionId"], "abc");
        assert_eq!(v["recordingId"], "rec1");
        assert_eq!(v["bearerId"], "b1");
        assert_eq!(v["bearerName"], "Officer A");
        assert_eq!(v["subject"], "target-1");
        assert_eq!(v["time"], "2024-05-01T10:00:00Z");
        assert_eq!(v.as_object().unwrap().len(), 7);
    }
}
