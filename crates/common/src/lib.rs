//! Shared types for the saga orchestration services.
//!
//! Everything that crosses a process boundary is defined here: the correlation
//! id, the command and event vocabulary, and the typed view of decoded
//! messages.

pub mod action;
pub mod error;
pub mod message;
pub mod types;

pub use action::{CommandAction, EventAction, Participant, REPLY_GROUP, REPLY_STREAM};
pub use error::ContractError;
pub use message::{CORRELATION_ID, Command, Payload, ReplyEvent, resolve_correlation_id};
pub use types::CorrelationId;
