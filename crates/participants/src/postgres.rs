use async_trait::async_trait;
use common::{CorrelationId, EventAction, Participant};
use outbox::{OutboxEvent, PostgresOutbox};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{Entity, EntityStatus, ParticipantError, ParticipantRepository, Result};

const ENTITY_COLUMNS: &str = "id, name, status, order_id, created_at, updated_at";

/// PostgreSQL-backed repository over a participant's schema.
///
/// Entities live in `"<participant>".entity` and events in
/// `"<participant>".event`.
#[derive(Clone)]
pub struct PostgresParticipantRepository {
    participant: Participant,
    table: String,
    outbox: PostgresOutbox,
}

impl PostgresParticipantRepository {
    /// Creates a repository for `participant`.
    pub fn new(pool: PgPool, participant: Participant) -> Self {
        Self {
            participant,
            table: format!("\"{}\".entity", participant.as_str()),
            outbox: PostgresOutbox::new(pool, participant.as_str()),
        }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        self.outbox.pool()
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        self.outbox.run_migrations().await
    }

    /// Column holding the saga's correlation id.
    fn correlation_column(&self) -> &'static str {
        match self.participant {
            Participant::Order => "id",
            Participant::Payment | Participant::Delivery => "order_id",
        }
    }

    fn row_to_entity(row: PgRow) -> Result<Entity> {
        let status: String = row.try_get("status")?;
        let order_id: Option<Uuid> = row.try_get("order_id")?;

        Ok(Entity {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            status: status.parse()?,
            order_id: order_id.map(CorrelationId::from_uuid),
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl ParticipantRepository for PostgresParticipantRepository {
    type Outbox = PostgresOutbox;

    fn participant(&self) -> Participant {
        self.participant
    }

    fn outbox(&self) -> PostgresOutbox {
        self.outbox.clone()
    }

    #[tracing::instrument(skip(self, entity), fields(entity_id = %entity.id))]
    async fn create(&self, entity: &Entity, event: EventAction) -> Result<Option<OutboxEvent>> {
        let mut tx = self.pool().begin().await?;

        // The order id is the primary key of orders and unique for payments
        // and deliveries, so a saga gets at most one entity.
        let inserted = sqlx::query(&format!(
            r#"
            INSERT INTO {} (id, name, status, order_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT DO NOTHING
            "#,
            self.table
        ))
        .bind(entity.id)
        .bind(&entity.name)
        .bind(entity.status.as_str())
        .bind(entity.order_id.map(|id| id.as_uuid()))
        .bind(entity.created_at)
        .bind(entity.updated_at)
        .execute(&mut *tx)
        .await?;

        if inserted.rows_affected() == 0 {
            tracing::debug!(correlation_id = %entity.correlation_id(), "entity already exists");
            return Ok(None);
        }

        let recorded = self
            .outbox
            .record(&mut *tx, event, self.participant.as_str(), &entity.event_data()?)
            .await?;

        tx.commit().await?;
        Ok(Some(recorded))
    }

    #[tracing::instrument(skip(self))]
    async fn update_status(
        &self,
        correlation_id: CorrelationId,
        status: EntityStatus,
        event: EventAction,
    ) -> Result<Option<(Entity, OutboxEvent)>> {
        let mut tx = self.pool().begin().await?;

        let rows = sqlx::query(&format!(
            r#"
            UPDATE {}
            SET status = $1, updated_at = NOW()
            WHERE {} = $2 AND status <> $1
            RETURNING {ENTITY_COLUMNS}
            "#,
            self.table,
            self.correlation_column()
        ))
        .bind(status.as_str())
        .bind(correlation_id.as_uuid())
        .fetch_all(&mut *tx)
        .await?;

        let updated = rows
            .into_iter()
            .map(Self::row_to_entity)
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .max_by_key(|e| e.created_at);

        let Some(entity) = updated else {
            let exists: bool = sqlx::query_scalar(&format!(
                "SELECT EXISTS (SELECT 1 FROM {} WHERE {} = $1)",
                self.table,
                self.correlation_column()
            ))
            .bind(correlation_id.as_uuid())
            .fetch_one(&mut *tx)
            .await?;

            return if exists {
                Ok(None)
            } else {
                Err(ParticipantError::EntityNotFound(correlation_id))
            };
        };

        let recorded = self
            .outbox
            .record(&mut *tx, event, self.participant.as_str(), &entity.event_data()?)
            .await?;

        tx.commit().await?;
        Ok(Some((entity, recorded)))
    }

    async fn find_by_correlation_id(
        &self,
        correlation_id: CorrelationId,
    ) -> Result<Option<Entity>> {
        let row = sqlx::query(&format!(
            "SELECT {ENTITY_COLUMNS} FROM {} WHERE {} = $1 ORDER BY created_at DESC LIMIT 1",
            self.table,
            self.correlation_column()
        ))
        .bind(correlation_id.as_uuid())
        .fetch_optional(self.pool())
        .await?;

        row.map(Self::row_to_entity).transpose()
    }
}
