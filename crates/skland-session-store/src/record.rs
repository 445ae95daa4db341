//! The durable session record.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Current on-disk format version.
pub const SESSION_FORMAT_VERSION: u32 = 1;

/// Durable session state: the long-lived platform token plus minimal account
/// identity. Short-lived credentials never appear here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSession {
    /// Long-lived token from the Hypergryph identity service.
    pub platform_token: String,
    /// Skland account id.
    pub account_id: String,
    /// Last-known-good profile data (binding roles), for display while a
    /// refresh is in flight. Optional and advisory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_snapshot: Option<Value>,
    /// Unix milliseconds when this record was saved.
    pub saved_at: i64,
    /// Record format version.
    pub format_version: u32,
}

impl StoredSession {
    /// Build a record stamped with the current time.
    pub fn new(platform_token: String, account_id: String, profile_snapshot: Option<Value>) -> Self {
        Self {
            platform_token,
            account_id,
            profile_snapshot,
            saved_at: chrono::Utc::now().timestamp_millis(),
            format_version: SESSION_FORMAT_VERSION,
        }
    }

    /// Schema completeness check. A record failing this is treated the same
    /// as a missing record.
    pub fn is_complete(&self) -> bool {
        !self.platform_token.is_empty() && self.saved_at > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serde_round_trip() {
        let record = StoredSession::new(
            "tok".to_string(),
            "id1".to_string(),
            Some(serde_json::json!([{"uid": "123"}])),
        );

        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("platformToken"));
        assert!(json.contains("savedAt"));

        let parsed: StoredSession = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn test_completeness() {
        let mut record = StoredSession::new("tok".to_string(), "id1".to_string(), None);
        assert!(record.is_complete());

        record.platform_token.clear();
        assert!(!record.is_complete());
    }

    #[test]
    fn test_missing_snapshot_field_parses() {
        let json = r#"{"platformToken":"tok","accountId":"id1","savedAt":1700000000000,"formatVersion":1}"#;
        let parsed: StoredSession = serde_json::from_str(json).unwrap();
        assert!(parsed.profile_snapshot.is_none());
        assert!(parsed.is_complete());
    }
}
