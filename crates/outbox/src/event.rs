use common::{EventAction, Payload};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A domain event waiting in a participant's outbox.
///
/// `id` is assigned by the outbox on insert and increases monotonically, so it
/// doubles as the publish order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxEvent {
    pub id: i64,
    pub action: EventAction,
    pub object: String,
    pub data: Payload,
}

impl OutboxEvent {
    /// Returns the message form published on the reply stream.
    pub fn to_message(&self) -> Payload {
        let mut message = Payload::new();
        message.insert("id".to_string(), Value::from(self.id));
        message.insert(
            "action".to_string(),
            Value::String(self.action.as_str().to_string()),
        );
        message.insert("object".to_string(), Value::String(self.object.clone()));
        message.insert("data".to_string(), Value::Object(self.data.clone()));
        message
    }
}
