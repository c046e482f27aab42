use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Envelope for every domain event raised by the sales aggregates and the saga
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainEvent {
    pub event_id: Uuid,
    pub event_type: String,
    pub aggregate_type: String,
    pub aggregate_id: Uuid,
    pub tenant_id: Uuid,
    pub version: i64,
    pub occurred_at: DateTime<Utc>,
    pub payload: Value,
}

impl DomainEvent {
    /// Build an event envelope around a serializable payload
    pub fn new(
        event_type: impl Into<String>,
        aggregate_type: impl Into<String>,
        aggregate_id: Uuid,
        tenant_id: Uuid,
        version: i64,
        payload: impl Serialize,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            event_type: event_type.into(),
            aggregate_type: aggregate_type.into(),
            aggregate_id,
            tenant_id,
            version,
            occurred_at: Utc::now(),
            payload: serde_json::to_value(payload).unwrap_or_default(),
        }
    }

    /// Look up a top-level payload field
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }
}
