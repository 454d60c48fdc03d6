//! Transactional outbox.
//!
//! A participant records each domain event in its outbox table within the
//! same transaction as the state change it describes. An [`OutboxPoller`]
//! later drains the table in id order onto a stream, deleting only what it
//! actually published.

pub mod error;
pub mod event;
pub mod memory;
pub mod poller;
pub mod postgres;
pub mod store;

pub use error::{OutboxError, Result};
pub use event::OutboxEvent;
pub use memory::InMemoryOutbox;
pub use poller::{DEFAULT_BATCH_SIZE, OutboxPoller};
pub use postgres::PostgresOutbox;
pub use store::{DEFAULT_TIME_BUDGET, DrainReport, OutboxPublisher, OutboxStore};
