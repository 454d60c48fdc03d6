use async_trait::async_trait;
use common::CorrelationId;

use crate::{HistoryEntry, Result, SagaState};

/// Durable storage of saga progress, keyed by correlation id.
///
/// Rows are never physically removed: terminating a saga soft-deletes it and
/// keeps its history.
#[async_trait]
pub trait SagaStore: Send + Sync {
    /// Creates the saga for `correlation_id`, or returns the existing one.
    async fn create(&self, correlation_id: CorrelationId, name: &str) -> Result<SagaState>;

    /// Loads a saga, terminated or not.
    async fn find_by_correlation_id(
        &self,
        correlation_id: CorrelationId,
    ) -> Result<Option<SagaState>>;

    /// Appends an entry to a saga's history.
    ///
    /// Fails with `SagaNotFound` if no saga exists.
    async fn append_history(
        &self,
        correlation_id: CorrelationId,
        entry: &HistoryEntry,
    ) -> Result<()>;

    /// Appends the final history entry and soft-deletes the saga as one
    /// atomic update.
    ///
    /// Fails with `SagaNotFound` if no saga exists.
    async fn complete(&self, correlation_id: CorrelationId, entry: &HistoryEntry) -> Result<()>;

    /// Soft-deletes a saga. Terminating an already-terminated saga keeps the
    /// original termination time.
    ///
    /// Fails with `SagaNotFound` if no saga exists.
    async fn terminate(&self, correlation_id: CorrelationId) -> Result<()>;
}
