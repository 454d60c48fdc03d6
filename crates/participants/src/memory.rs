use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use common::{CorrelationId, EventAction, Participant};
use outbox::{InMemoryOutbox, OutboxEvent};
use tokio::sync::RwLock;

use crate::{Entity, EntityStatus, ParticipantError, ParticipantRepository, Result};

/// In-memory participant repository for testing.
#[derive(Clone)]
pub struct InMemoryParticipantRepository {
    participant: Participant,
    entities: Arc<RwLock<Vec<Entity>>>,
    outbox: InMemoryOutbox,
}

impl InMemoryParticipantRepository {
    /// Creates an empty repository for `participant`.
    pub fn new(participant: Participant) -> Self {
        Self {
            participant,
            entities: Arc::new(RwLock::new(Vec::new())),
            outbox: InMemoryOutbox::new(),
        }
    }

    /// Returns every stored entity, oldest first.
    pub async fn entities(&self) -> Vec<Entity> {
        self.entities.read().await.clone()
    }
}

#[async_trait]
impl ParticipantRepository for InMemoryParticipantRepository {
    type Outbox = InMemoryOutbox;

    fn participant(&self) -> Participant {
        self.participant
    }

    fn outbox(&self) -> InMemoryOutbox {
        self.outbox.clone()
    }

    async fn create(&self, entity: &Entity, event: EventAction) -> Result<Option<OutboxEvent>> {
        let mut entities = self.entities.write().await;
        let correlation_id = entity.correlation_id();
        if entities.iter().any(|e| e.correlation_id() == correlation_id) {
            return Ok(None);
        }

        let data = entity.event_data()?;
        entities.push(entity.clone());
        Ok(Some(
            self.outbox
                .record(event, self.participant.as_str(), data)
                .await,
        ))
    }

    async fn update_status(
        &self,
        correlation_id: CorrelationId,
        status: EntityStatus,
        event: EventAction,
    ) -> Result<Option<(Entity, OutboxEvent)>> {
        let mut entities = self.entities.write().await;
        let updated = {
            let mut saga = entities
                .iter_mut()
                .filter(|e| e.correlation_id() == correlation_id)
                .peekable();
            if saga.peek().is_none() {
                return Err(ParticipantError::EntityNotFound(correlation_id));
            }

            let now = Utc::now();
            let mut updated = None;
            for entity in saga.filter(|e| e.status != status) {
                entity.status = status;
                entity.updated_at = now;
                updated = Some(entity.clone());
            }
            updated
        };
        let Some(entity) = updated else {
            return Ok(None);
        };

        let event = self
            .outbox
            .record(event, self.participant.as_str(), entity.event_data()?)
            .await;
        Ok(Some((entity, event)))
    }

    async fn find_by_correlation_id(
        &self,
        correlation_id: CorrelationId,
    ) -> Result<Option<Entity>> {
        let entities = self.entities.read().await;
        Ok(entities
            .iter()
            .rev()
            .find(|e| e.correlation_id() == correlation_id)
            .cloned())
    }
}
