//! Detection event types
//!
//! A detection event is the emitted notification for one meaningful device
//! state change. Events are immutable once built and serialized verbatim
//! into their artifact file.

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

static SESSION_ID: OnceLock<String> = OnceLock::new();

/// Capture-run correlation id, generated once per process.
pub fn capture_session_id() -> String {
    SESSION_ID
        .get_or_init(|| Uuid::new_v4().to_string())
        .clone()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionEvent {
    pub session_id: String,
    pub pan_id: Option<String>,
    pub pkt_number: Option<i64>,
    pub timestamp: i64,
    pub channel: i64,
    pub device_address: String,
    pub detection: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_key_secret: Option<String>,
    pub capture_source: String,
}

impl DetectionEvent {
    pub fn with_action(mut self, action: &str) -> Self {
        self.action = Some(action.to_string());
        self
    }

    pub fn with_key(mut self, key: &str) -> Self {
        self.network_key_secret = Some(key.to_string());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_consistency() {
        assert_eq!(capture_session_id(), capture_session_id());
    }

    #[test]
    fn test_optional_fields_omitted_from_body() {
        let event = DetectionEvent {
            session_id: "s".to_string(),
            pan_id: None,
            pkt_number: None,
            timestamp: 0,
            channel: 11,
            device_address: "0x0001".to_string(),
            detection: "d".to_string(),
            action: None,
            network_key_secret: None,
            capture_source: "live".to_string(),
        };
        let body = serde_json::to_string(&event).unwrap();
        assert!(!body.contains("network_key_secret"));
        assert!(!body.contains("\"action\""));
    }
}
