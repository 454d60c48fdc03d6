//! Saga state.

use chrono::{DateTime, Utc};
use common::CorrelationId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::history::HistoryEntry;

/// The status of a saga in its lifecycle.
///
/// State transitions:
/// ```text
/// (none) ──► Active ──► Terminated
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SagaStatus {
    /// The saga is waiting for its next event.
    Active,

    /// A terminal event was processed; the row is soft-deleted (terminal state).
    Terminated,
}

impl SagaStatus {
    /// Returns true if this is a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SagaStatus::Terminated)
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            SagaStatus::Active => "Active",
            SagaStatus::Terminated => "Terminated",
        }
    }
}

impl std::fmt::Display for SagaStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Persisted progress of one saga instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SagaState {
    pub id: Uuid,
    pub correlation_id: CorrelationId,
    pub name: String,
    pub history: Vec<HistoryEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl SagaState {
    /// Creates a fresh, active saga.
    pub fn new(correlation_id: CorrelationId, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            correlation_id,
            name: name.into(),
            history: Vec::new(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    /// Status derived from the soft-delete marker.
    pub fn status(&self) -> SagaStatus {
        if self.deleted_at.is_some() {
            SagaStatus::Terminated
        } else {
            SagaStatus::Active
        }
    }

    /// Whether an event with identity `key` was already recorded.
    pub fn has_seen(&self, key: &str) -> bool {
        self.history
            .iter()
            .any(|entry| entry.event_key().as_deref() == Some(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(object: &str, id: i64) -> HistoryEntry {
        let event = match json!({"id": id, "action": "ORDER_CREATED", "object": object, "data": {}}) {
            serde_json::Value::Object(map) => map,
            _ => unreachable!(),
        };
        HistoryEntry {
            event,
            command: None,
            stream_id: None,
        }
    }

    #[test]
    fn test_new_saga_is_active() {
        let saga = SagaState::new(CorrelationId::new(), "CREATE_ORDER_SAGA");
        assert_eq!(saga.status(), SagaStatus::Active);
        assert!(saga.history.is_empty());
        assert!(!saga.status().is_terminal());
    }

    #[test]
    fn test_deleted_saga_is_terminated() {
        let mut saga = SagaState::new(CorrelationId::new(), "CREATE_ORDER_SAGA");
        saga.deleted_at = Some(Utc::now());
        assert_eq!(saga.status(), SagaStatus::Terminated);
        assert!(saga.status().is_terminal());
    }

    #[test]
    fn test_has_seen_matches_object_and_id() {
        let mut saga = SagaState::new(CorrelationId::new(), "CREATE_ORDER_SAGA");
        saga.history.push(entry("order", 1));

        assert!(saga.has_seen("order:1"));
        assert!(!saga.has_seen("payment:1"));
        assert!(!saga.has_seen("order:2"));
    }

    #[test]
    fn test_display() {
        assert_eq!(SagaStatus::Active.to_string(), "Active");
        assert_eq!(SagaStatus::Terminated.to_string(), "Terminated");
    }

    #[test]
    fn test_serialization() {
        let saga = SagaState::new(CorrelationId::new(), "CREATE_ORDER_SAGA");
        let json = serde_json::to_value(&saga).unwrap();
        assert!(json.get("correlationId").is_some());
        let deserialized: SagaState = serde_json::from_value(json).unwrap();
        assert_eq!(saga, deserialized);
    }
}
