use std::time::Duration;

use thiserror::Error;

/// Errors that can occur when recording or draining outbox events.
#[derive(Debug, Error)]
pub enum OutboxError {
    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored row does not match the message contract.
    #[error("Contract error: {0}")]
    Contract(#[from] common::ContractError),

    /// Publishing to the stream failed.
    #[error("Channel error: {0}")]
    Channel(#[from] channel::ChannelError),

    /// Publishing did not complete within the configured deadline.
    #[error("Publish timed out after {0:?}")]
    PublishTimeout(Duration),
}

/// Result type for outbox operations.
pub type Result<T> = std::result::Result<T, OutboxError>;
