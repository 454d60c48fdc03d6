use async_trait::async_trait;
use common::{CorrelationId, EventAction, Participant};
use outbox::{OutboxEvent, OutboxStore};

use crate::{Entity, EntityStatus, Result};

/// Storage of one participant's entities together with its outbox.
///
/// Every write records the event describing it in the same unit of work, so
/// an entity change is never visible without its event and vice versa.
#[async_trait]
pub trait ParticipantRepository: Send + Sync {
    /// Outbox drained by this participant's poller.
    type Outbox: OutboxStore + Clone + 'static;

    /// The participant whose rows this repository holds.
    fn participant(&self) -> Participant;

    /// Handle on the outbox sharing this repository's storage.
    fn outbox(&self) -> Self::Outbox;

    /// Inserts `entity` and records `event` describing it.
    ///
    /// Returns `None` without writing anything when the saga already has an
    /// entity, so a redelivered create command leaves a single row and a
    /// single event behind.
    async fn create(&self, entity: &Entity, event: EventAction) -> Result<Option<OutboxEvent>>;

    /// Moves the saga's entity to `status` and records `event`.
    ///
    /// Returns `None` without writing anything when the entity is already in
    /// `status`. Fails with `EntityNotFound` when no entity belongs to the
    /// saga.
    async fn update_status(
        &self,
        correlation_id: CorrelationId,
        status: EntityStatus,
        event: EventAction,
    ) -> Result<Option<(Entity, OutboxEvent)>>;

    /// Finds the saga's most recent entity.
    async fn find_by_correlation_id(&self, correlation_id: CorrelationId)
    -> Result<Option<Entity>>;
}
