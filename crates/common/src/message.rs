//! Message contract: commands sent to participants and events sent back.
//!
//! Both travel as flat maps on the wire (see the `channel` codec). These types
//! give them a typed shape once decoded and know how to turn back into maps
//! for publishing.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::action::{CommandAction, EventAction, Participant};
use crate::error::ContractError;
use crate::types::CorrelationId;

/// A decoded message body.
pub type Payload = Map<String, Value>;

/// Field every command payload and event data map carries.
pub const CORRELATION_ID: &str = "correlationId";

/// A command addressed to one participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub action: CommandAction,
    pub payload: Payload,
}

impl Command {
    /// Creates a command with an arbitrary payload.
    pub fn new(action: CommandAction, payload: Payload) -> Self {
        Self { action, payload }
    }

    /// Creates a saga command: the triggering event's data plus the
    /// correlation id, which always wins over any field of the same name.
    pub fn for_saga(action: CommandAction, correlation_id: CorrelationId, data: &Payload) -> Self {
        let mut payload = data.clone();
        payload.insert(
            CORRELATION_ID.to_string(),
            Value::String(correlation_id.to_string()),
        );
        Self { action, payload }
    }

    /// Interprets a decoded message as a command.
    pub fn from_message(message: &Payload) -> Result<Self, ContractError> {
        let action = message
            .get("action")
            .and_then(Value::as_str)
            .ok_or_else(|| ContractError::Malformed("command without action".to_string()))?
            .parse::<CommandAction>()?;

        let payload = match message.get("payload") {
            Some(Value::Object(map)) => map.clone(),
            None | Some(Value::Null) => Payload::new(),
            Some(other) => {
                return Err(ContractError::Malformed(format!(
                    "command payload must be an object, got {other}"
                )));
            }
        };

        Ok(Self { action, payload })
    }

    /// Returns the message form published on a command stream.
    pub fn to_message(&self) -> Payload {
        let mut message = Payload::new();
        message.insert(
            "action".to_string(),
            Value::String(self.action.as_str().to_string()),
        );
        message.insert("payload".to_string(), Value::Object(self.payload.clone()));
        message
    }

    /// The participant this command is addressed to.
    pub fn target(&self) -> Participant {
        self.action.target()
    }

    /// The correlation id carried by the payload, if any.
    pub fn correlation_id(&self) -> Option<CorrelationId> {
        self.payload.get(CORRELATION_ID).and_then(CorrelationId::from_value)
    }
}

/// An event read from the shared reply stream.
///
/// `id` is the outbox row id assigned by the emitting participant; together
/// with `object` it identifies the event independently of the broker record
/// that carried it.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplyEvent {
    pub id: Option<i64>,
    pub action: EventAction,
    pub object: String,
    pub data: Payload,
}

impl ReplyEvent {
    /// Interprets a decoded message as a participant event.
    pub fn from_message(message: &Payload) -> Result<Self, ContractError> {
        let action = message
            .get("action")
            .and_then(Value::as_str)
            .ok_or_else(|| ContractError::Malformed("event without action".to_string()))?
            .parse::<EventAction>()?;

        let object = message
            .get("object")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| action.family().as_str().to_string());

        let data = match message.get("data") {
            Some(Value::Object(map)) => map.clone(),
            _ => {
                return Err(ContractError::Malformed(format!(
                    "{action} event without data object"
                )));
            }
        };

        let id = message.get("id").and_then(|v| match v {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        });

        Ok(Self {
            id,
            action,
            object,
            data,
        })
    }

    /// Resolves the correlation id of this event.
    pub fn correlation_id(&self) -> Option<CorrelationId> {
        resolve_correlation_id(self.action, &self.data)
    }

    /// Stable identity of the event: emitting participant plus outbox id.
    pub fn key(&self) -> Option<String> {
        self.id.map(|id| format!("{}:{}", self.object, id))
    }
}

/// Resolves the correlation id from an event's data.
///
/// The explicit `correlationId` field is authoritative. Events from older
/// producers only carry the family field: the row `id` for order events and
/// `order_id` for payment and delivery events, with `orderId` as a last resort.
pub fn resolve_correlation_id(action: EventAction, data: &Payload) -> Option<CorrelationId> {
    if let Some(id) = data.get(CORRELATION_ID).and_then(CorrelationId::from_value) {
        return Some(id);
    }

    let family_field = match action.family() {
        Participant::Order => "id",
        Participant::Payment | Participant::Delivery => "order_id",
    };

    data.get(family_field)
        .and_then(CorrelationId::from_value)
        .or_else(|| data.get("orderId").and_then(CorrelationId::from_value))
}
