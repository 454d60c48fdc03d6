use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use common::CorrelationId;
use tokio::sync::RwLock;

use crate::{HistoryEntry, Result, SagaError, SagaState, SagaStore};

/// In-memory saga store for testing.
#[derive(Clone, Default)]
pub struct InMemorySagaStore {
    sagas: Arc<RwLock<HashMap<CorrelationId, SagaState>>>,
}

impl InMemorySagaStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored sagas, terminated ones included.
    pub async fn saga_count(&self) -> usize {
        self.sagas.read().await.len()
    }
}

#[async_trait]
impl SagaStore for InMemorySagaStore {
    async fn create(&self, correlation_id: CorrelationId, name: &str) -> Result<SagaState> {
        let mut sagas = self.sagas.write().await;
        let saga = sagas
            .entry(correlation_id)
            .and_modify(|s| s.updated_at = Utc::now())
            .or_insert_with(|| SagaState::new(correlation_id, name));
        Ok(saga.clone())
    }

    async fn find_by_correlation_id(
        &self,
        correlation_id: CorrelationId,
    ) -> Result<Option<SagaState>> {
        Ok(self.sagas.read().await.get(&correlation_id).cloned())
    }

    async fn append_history(
        &self,
        correlation_id: CorrelationId,
        entry: &HistoryEntry,
    ) -> Result<()> {
        let mut sagas = self.sagas.write().await;
        let saga = sagas
            .get_mut(&correlation_id)
            .ok_or(SagaError::SagaNotFound(correlation_id))?;
        saga.history.push(entry.clone());
        saga.updated_at = Utc::now();
        Ok(())
    }

    async fn complete(&self, correlation_id: CorrelationId, entry: &HistoryEntry) -> Result<()> {
        let mut sagas = self.sagas.write().await;
        let saga = sagas
            .get_mut(&correlation_id)
            .ok_or(SagaError::SagaNotFound(correlation_id))?;
        let now = Utc::now();
        saga.history.push(entry.clone());
        saga.deleted_at.get_or_insert(now);
        saga.updated_at = now;
        Ok(())
    }

    async fn terminate(&self, correlation_id: CorrelationId) -> Result<()> {
        let mut sagas = self.sagas.write().await;
        let saga = sagas
            .get_mut(&correlation_id)
            .ok_or(SagaError::SagaNotFound(correlation_id))?;
        let now = Utc::now();
        saga.deleted_at.get_or_insert(now);
        saga.updated_at = now;
        Ok(())
    }
}
