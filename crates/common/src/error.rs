use thiserror::Error;

/// Errors raised while interpreting a decoded message against the contract.
#[derive(Debug, Error)]
pub enum ContractError {
    /// The command action is not part of the vocabulary.
    #[error("command \"{0}\" not implemented")]
    UnknownCommand(String),

    /// The event action is not part of the vocabulary.
    #[error("event \"{0}\" not implemented")]
    UnknownEvent(String),

    /// The participant name is not recognised.
    #[error("unknown participant: {0}")]
    UnknownParticipant(String),

    /// A required field is absent or has the wrong type.
    #[error("malformed message: {0}")]
    Malformed(String),
}
