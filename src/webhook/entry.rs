use crate::error::{AppError, Result};
use anyhow::anyhow;
use serde::{Deserialize, Serialize};

/// Message replayed when a cached failure carries no error text.
pub const DEFAULT_FAILURE_MESSAGE: &str = "Previous processing failed";

/// Outcome of an attempt, stored as JSON under the event's cache key.
///
/// Fields are optional on decode so entries written by other processors still
/// replay; this crate always writes them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CacheEntry {
    Success {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        transaction_id: Option<String>,
    },
    Failed {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

impl CacheEntry {
    pub fn success(transaction_id: impl Into<String>) -> Self {
        CacheEntry::Success {
            transaction_id: Some(transaction_id.into()),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        CacheEntry::Failed {
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, CacheEntry::Success { .. })
    }

    /// Error text to replay for a failed entry.
    pub fn failure_message(&self) -> Option<String> {
        match self {
            CacheEntry::Failed { error } => Some(
                error
                    .clone()
                    .unwrap_or_else(|| DEFAULT_FAILURE_MESSAGE.to_string()),
            ),
            CacheEntry::Success { .. } => None,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self)
            .map_err(|e| AppError::Internal(anyhow!("Failed to serialize cache entry: {}", e)))
    }

    pub fn decode(raw: &[u8]) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_slice(raw)
    }
}

/// Result handed back to the caller of `process_event`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// The payment was made by this call.
    Success { transaction_id: String },
    /// An earlier call already succeeded for this event.
    AlreadyProcessed { event_id: String },
}

impl Outcome {
    pub fn status(&self) -> &'static str {
        match self {
            Outcome::Success { .. } => "success",
            Outcome::AlreadyProcessed { .. } => "already_processed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_entry_wire_format() {
        let json = String::from_utf8(CacheEntry::success("txn_1").encode().unwrap()).unwrap();
        assert_eq!(json, r#"{"status":"success","transaction_id":"txn_1"}"#);
    }

    #[test]
    fn test_failed_entry_wire_format() {
        let json = String::from_utf8(CacheEntry::failed("boom").encode().unwrap()).unwrap();
        assert_eq!(json, r#"{"status":"failed","error":"boom"}"#);
    }

    #[test]
    fn test_decodes_entries_with_whitespace() {
        let entry =
            CacheEntry::decode(br#"{"status": "failed", "error": "Payment gateway timeout"}"#)
                .unwrap();
        assert_eq!(
            entry.failure_message().as_deref(),
            Some("Payment gateway timeout")
        );
    }

    #[test]
    fn test_failed_entry_without_error_uses_default_message() {
        let entry = CacheEntry::decode(br#"{"status":"failed"}"#).unwrap();
        assert_eq!(
            entry.failure_message().as_deref(),
            Some(DEFAULT_FAILURE_MESSAGE)
        );
    }

    #[test]
    fn test_success_entry_without_transaction_id() {
        let entry = CacheEntry::decode(br#"{"status":"success"}"#).unwrap();
        assert!(entry.is_success());
        assert_eq!(entry.failure_message(), None);
    }

    #[test]
    fn test_rejects_unknown_status_and_garbage() {
        assert!(CacheEntry::decode(br#"{"status":"pending"}"#).is_err());
        assert!(CacheEntry::decode(b"not json").is_err());
    }

    #[test]
    fn test_outcome_serialization() {
        let success = serde_json::to_value(Outcome::Success {
            transaction_id: "txn_test123".into(),
        })
        .unwrap();
        assert_eq!(
            success,
            serde_json::json!({"status": "success", "transaction_id": "txn_test123"})
        );

        let duplicate = Outcome::AlreadyProcessed {
            event_id: "evt_123".into(),
        };
        assert_eq!(duplicate.status(), "already_processed");
        assert_eq!(
            serde_json::to_value(&duplicate).unwrap(),
            serde_json::json!({"status": "already_processed", "event_id": "evt_123"})
        );
    }
}
