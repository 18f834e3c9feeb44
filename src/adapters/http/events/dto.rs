//! Request/response DTOs for event ingestion.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::application::{EventStatus, IncomingEvent};
use crate::domain::foundation::Timestamp;

/// One event inside a batch.
#[derive(Debug, Deserialize)]
pub struct EventItem {
    pub event_name: String,
    #[serde(default)]
    pub component_id: Option<String>,
    #[serde(default)]
    pub properties: Map<String, Value>,
    #[serde(default)]
    pub timestamp: Option<Timestamp>,
}

impl From<EventItem> for IncomingEvent {
    fn from(item: EventItem) -> Self {
        Self {
            event_name: item.event_name,
            component_id: item.component_id,
            properties: item.properties,
            timestamp: item.timestamp,
        }
    }
}

/// Body of `POST /api/events/track`.
#[derive(Debug, Deserialize)]
pub struct TrackEventRequest {
    pub user_id: String,
    pub session_id: String,
    #[serde(default)]
    pub global_uid: Option<String>,
    pub event_name: String,
    #[serde(default)]
    pub component_id: Option<String>,
    #[serde(default)]
    pub properties: Map<String, Value>,
    #[serde(default)]
    pub timestamp: Option<Timestamp>,
}

/// Body of `POST /api/events/batch`.
#[derive(Debug, Deserialize)]
pub struct BatchEventRequest {
    pub user_id: String,
    pub session_id: String,
    #[serde(default)]
    pub global_uid: Option<String>,
    pub events: Vec<EventItem>,
}

/// Response of the single-event endpoint.
#[derive(Debug, Serialize)]
pub struct TrackEventResponse {
    pub status: &'static str,
    pub event_name: String,
}

/// Response of the batch endpoint: counts plus per-index statuses.
#[derive(Debug, Serialize)]
pub struct BatchEventResponse {
    pub status: &'static str,
    pub accepted: usize,
    pub coalesced: usize,
    pub dropped: usize,
    pub statuses: Vec<EventStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_body_parses_with_minimal_items() {
        let json = serde_json::json!({
            "user_id": "user_1",
            "session_id": "session_1",
            "events": [
                {"event_name": "click"},
                {"event_name": "hover", "component_id": "hero",
                 "properties": {"duration_seconds": 2.5}}
            ]
        });
        let request: BatchEventRequest = serde_json::from_value(json).unwrap();

        assert_eq!(request.events.len(), 2);
        assert_eq!(request.events[1].component_id.as_deref(), Some("hero"));
    }

    #[test]
    fn track_body_accepts_a_client_timestamp() {
        let json = serde_json::json!({
            "user_id": "user_1",
            "session_id": "session_1",
            "event_name": "click",
            "timestamp": "2026-07-01T12:00:00Z"
        });
        let request: TrackEventRequest = serde_json::from_value(json).unwrap();
        assert!(request.timestamp.is_some());
    }
}
