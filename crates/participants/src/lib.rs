//! Order, payment and delivery participants.
//!
//! Each participant consumes its own command stream, applies the command to
//! its entity table and records the resulting event in its outbox, in one
//! transaction. Whether a command is accepted is decided by a [`Policy`].

pub mod commands;
pub mod entity;
pub mod error;
pub mod memory;
pub mod policy;
pub mod postgres;
pub mod repository;
pub mod service;

pub use commands::{Step, step};
pub use entity::{Entity, EntityStatus};
pub use error::{ParticipantError, Result};
pub use memory::InMemoryParticipantRepository;
pub use policy::{AcceptAll, Decision, Policy, RejectAll, RejectWhen};
pub use postgres::PostgresParticipantRepository;
pub use repository::ParticipantRepository;
pub use service::{Execution, ParticipantService};
