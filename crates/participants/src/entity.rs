//! Participant entity rows.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use common::{CORRELATION_ID, CorrelationId, Payload};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{ParticipantError, Result};

/// Lifecycle status of an order, payment or delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
    Refunded,
    Failed,
}

impl EntityStatus {
    /// Returns the stored name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityStatus::Pending => "pending",
            EntityStatus::Approved => "approved",
            EntityStatus::Rejected => "rejected",
            EntityStatus::Cancelled => "cancelled",
            EntityStatus::Refunded => "refunded",
            EntityStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for EntityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EntityStatus {
    type Err = ParticipantError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(EntityStatus::Pending),
            "approved" => Ok(EntityStatus::Approved),
            "rejected" => Ok(EntityStatus::Rejected),
            "cancelled" => Ok(EntityStatus::Cancelled),
            "refunded" => Ok(EntityStatus::Refunded),
            "failed" => Ok(EntityStatus::Failed),
            other => Err(ParticipantError::UnknownStatus(other.to_string())),
        }
    }
}

/// An order, payment or delivery row.
///
/// Orders have no `order_id`: their own id is the saga's correlation id.
/// Payments and deliveries point at their order through `order_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: Uuid,
    pub name: String,
    pub status: EntityStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<CorrelationId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity {
    /// Creates a new order entity.
    pub fn order(name: impl Into<String>, status: EntityStatus) -> Self {
        Self::new(name, status, None)
    }

    /// Creates a payment or delivery entity belonging to `order_id`.
    pub fn for_order(order_id: CorrelationId, name: impl Into<String>, status: EntityStatus) -> Self {
        Self::new(name, status, Some(order_id))
    }

    fn new(name: impl Into<String>, status: EntityStatus, order_id: Option<CorrelationId>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            status,
            order_id,
            created_at: now,
            updated_at: now,
        }
    }

    /// The saga this entity takes part in.
    pub fn correlation_id(&self) -> CorrelationId {
        self.order_id
            .unwrap_or_else(|| CorrelationId::from_uuid(self.id))
    }

    /// Event data describing this row: its fields plus `correlationId`.
    pub fn event_data(&self) -> Result<Payload> {
        let mut data = match serde_json::to_value(self)? {
            Value::Object(map) => map,
            _ => Payload::new(),
        };
        data.insert(
            CORRELATION_ID.to_string(),
            Value::String(self.correlation_id().to_string()),
        );
        Ok(data)
    }
}
