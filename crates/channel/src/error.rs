use thiserror::Error;

use crate::RecordId;

/// Errors that can occur when talking to a durable stream.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The Redis backend reported an error.
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// A message could not be serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A message did not serialize to a JSON object.
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// The consumer group does not exist on the stream.
    #[error("No consumer group {group} on stream {stream}")]
    NoGroup { stream: String, group: String },

    /// The handler refused a record; it stays pending for redelivery.
    #[error("Handler failed for record {record_id}: {source}")]
    Handler {
        record_id: RecordId,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Result type for channel operations.
pub type Result<T> = std::result::Result<T, ChannelError>;
