use async_trait::async_trait;
use common::CorrelationId;
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{HistoryEntry, Result, SagaError, SagaState, SagaStore};

const SAGA_COLUMNS: &str =
    "id, correlation_id, name, to_jsonb(history) AS history, created_at, updated_at, deleted_at";

/// PostgreSQL-backed saga store over the `saga_state` table.
#[derive(Clone)]
pub struct PostgresSagaStore {
    pool: PgPool,
}

impl PostgresSagaStore {
    /// Creates a new PostgreSQL saga store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_saga(row: PgRow) -> Result<SagaState> {
        let history: serde_json::Value = row.try_get("history")?;

        Ok(SagaState {
            id: row.try_get("id")?,
            correlation_id: CorrelationId::from_uuid(row.try_get::<Uuid, _>("correlation_id")?),
            name: row.try_get("name")?,
            history: serde_json::from_value(history)?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            deleted_at: row.try_get("deleted_at")?,
        })
    }
}

#[async_trait]
impl SagaStore for PostgresSagaStore {
    #[tracing::instrument(skip(self))]
    async fn create(&self, correlation_id: CorrelationId, name: &str) -> Result<SagaState> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO saga_state (id, correlation_id, name)
            VALUES ($1, $2, $3)
            ON CONFLICT (correlation_id) DO UPDATE SET updated_at = NOW()
            RETURNING {SAGA_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(correlation_id.as_uuid())
        .bind(name)
        .fetch_one(&self.pool)
        .await?;

        Self::row_to_saga(row)
    }

    async fn find_by_correlation_id(
        &self,
        correlation_id: CorrelationId,
    ) -> Result<Option<SagaState>> {
        let row = sqlx::query(&format!(
            "SELECT {SAGA_COLUMNS} FROM saga_state WHERE correlation_id = $1"
        ))
        .bind(correlation_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_saga).transpose()
    }

    #[tracing::instrument(skip(self, entry))]
    async fn append_history(
        &self,
        correlation_id: CorrelationId,
        entry: &HistoryEntry,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE saga_state
            SET history = array_append(history, $1::jsonb), updated_at = NOW()
            WHERE correlation_id = $2
            "#,
        )
        .bind(serde_json::to_value(entry)?)
        .bind(correlation_id.as_uuid())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(SagaError::SagaNotFound(correlation_id));
        }
        Ok(())
    }

    #[tracing::instrument(skip(self, entry))]
    async fn complete(&self, correlation_id: CorrelationId, entry: &HistoryEntry) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE saga_state
            SET history = array_append(history, $1::jsonb),
                deleted_at = COALESCE(deleted_at, NOW()),
                updated_at = NOW()
            WHERE correlation_id = $2
            "#,
        )
        .bind(serde_json::to_value(entry)?)
        .bind(correlation_id.as_uuid())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(SagaError::SagaNotFound(correlation_id));
        }
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn terminate(&self, correlation_id: CorrelationId) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE saga_state
            SET deleted_at = COALESCE(deleted_at, NOW()), updated_at = NOW()
            WHERE correlation_id = $1
            "#,
        )
        .bind(correlation_id.as_uuid())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(SagaError::SagaNotFound(correlation_id));
        }
        Ok(())
    }
}
