use common::{Command, Payload, ReplyEvent};
use serde::{Deserialize, Serialize};

/// One processed event and what the coordinator did about it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    /// The inbound event message as received.
    pub event: Payload,
    /// The command issued in response, if any.
    pub command: Option<Command>,
    /// Broker id of the issued command, if any.
    pub stream_id: Option<String>,
}

impl HistoryEntry {
    /// Identity of the recorded event (`object:id`), when it carries one.
    pub fn event_key(&self) -> Option<String> {
        ReplyEvent::from_message(&self.event).ok()?.key()
    }
}
