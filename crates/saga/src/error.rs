//! Saga error types.

use channel::ChannelError;
use common::{ContractError, CorrelationId, EventAction};
use thiserror::Error;

/// Errors that can occur while coordinating a saga.
///
/// Every error is fatal for the event being processed only: the event stays
/// unacknowledged and is retried on a later tick.
#[derive(Debug, Error)]
pub enum SagaError {
    /// The event action is not part of the vocabulary.
    #[error("event \"{0}\" not implemented")]
    UnknownEvent(String),

    /// The event message is missing required fields.
    #[error("Malformed event: {0}")]
    Malformed(String),

    /// The transition table has no entry for the event.
    #[error("No transition for event {0}")]
    NoTransition(EventAction),

    /// The event carries no usable correlation id.
    #[error("Event {0} has no correlation id")]
    MissingCorrelationId(EventAction),

    /// No saga exists for the correlation id.
    #[error("Saga not found: {0}")]
    SagaNotFound(CorrelationId),

    /// The saga already finished and cannot take further events.
    #[error("Saga already terminated: {0}")]
    SagaTerminated(CorrelationId),

    /// Publishing a command failed.
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<ContractError> for SagaError {
    fn from(err: ContractError) -> Self {
        match err {
            ContractError::UnknownEvent(action) => SagaError::UnknownEvent(action),
            other => SagaError::Malformed(other.to_string()),
        }
    }
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, SagaError>;
