//! Saga execution coordinator for the create-order saga.
//!
//! This crate orchestrates a multi-step transaction across the order, payment
//! and delivery services, which only talk to each other through streams.
//!
//! The create-order saga follows these steps:
//! 1. Create payment
//! 2. Create delivery
//! 3. Approve order
//!
//! If any participant rejects or fails its step, the completed steps are
//! compensated in reverse order, ending with the order being cancelled.

pub mod coordinator;
pub mod error;
pub mod history;
pub mod memory;
pub mod postgres;
pub mod state;
pub mod store;
pub mod transitions;

pub use coordinator::{
    CommandProducers, CoordinatorConfig, EventOutcome, SagaExecutionCoordinator,
};
pub use error::{Result, SagaError};
pub use history::HistoryEntry;
pub use memory::InMemorySagaStore;
pub use postgres::PostgresSagaStore;
pub use state::{SagaState, SagaStatus};
pub use store::SagaStore;
pub use transitions::{SAGA_NAME, Transition};
