//! Participant error types.

use common::{CommandAction, ContractError, CorrelationId, Participant};
use outbox::OutboxError;
use thiserror::Error;

/// Errors that can occur while a participant executes a command.
#[derive(Debug, Error)]
pub enum ParticipantError {
    /// The command message does not match the contract.
    #[error("Contract error: {0}")]
    Contract(#[from] ContractError),

    /// The command is addressed to another participant.
    #[error("{participant} does not handle {command}")]
    WrongParticipant {
        participant: Participant,
        command: CommandAction,
    },

    /// The command payload has no usable correlation id.
    #[error("Command {0} has no correlation id")]
    MissingCorrelationId(CommandAction),

    /// No entity exists for the correlation id.
    #[error("Entity not found for {0}")]
    EntityNotFound(CorrelationId),

    /// A new saga's entity already exists.
    #[error("Entity already exists for {0}")]
    AlreadyExists(CorrelationId),

    /// A stored status is not recognised.
    #[error("Unknown entity status: {0}")]
    UnknownStatus(String),

    /// Outbox error.
    #[error("Outbox error: {0}")]
    Outbox(#[from] OutboxError),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience type alias for participant results.
pub type Result<T> = std::result::Result<T, ParticipantError>;
