use std::time::Duration;

use async_trait::async_trait;
use common::{EventAction, Payload};
use sqlx::{PgConnection, PgPool, Row, postgres::PgRow};

use crate::store::publish_in_order;
use crate::{DrainReport, OutboxEvent, OutboxPublisher, OutboxStore, Result};

/// PostgreSQL-backed outbox living in a participant's schema.
///
/// The table has the shape `(id bigint identity, action text, object text,
/// data jsonb, created_at timestamptz)`.
#[derive(Clone)]
pub struct PostgresOutbox {
    pool: PgPool,
    table: String,
}

impl PostgresOutbox {
    /// Creates an outbox over the `event` table of `schema`.
    pub fn new(pool: PgPool, schema: &str) -> Self {
        Self {
            pool,
            table: format!("\"{schema}\".event"),
        }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Fully qualified table name.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    /// Inserts an event on `conn`, normally inside the transaction that
    /// performs the domain write the event describes.
    pub async fn record(
        &self,
        conn: &mut PgConnection,
        action: EventAction,
        object: &str,
        data: &Payload,
    ) -> Result<OutboxEvent> {
        let id: i64 = sqlx::query_scalar(&format!(
            "INSERT INTO {} (action, object, data) VALUES ($1, $2, $3) RETURNING id",
            self.table
        ))
        .bind(action.as_str())
        .bind(object)
        .bind(serde_json::Value::Object(data.clone()))
        .fetch_one(&mut *conn)
        .await?;

        Ok(OutboxEvent {
            id,
            action,
            object: object.to_string(),
            data: data.clone(),
        })
    }

    fn row_to_event(row: PgRow) -> Result<OutboxEvent> {
        let action: String = row.try_get("action")?;
        let data: serde_json::Value = row.try_get("data")?;

        Ok(OutboxEvent {
            id: row.try_get("id")?,
            action: action.parse()?,
            object: row.try_get("object")?,
            data: serde_json::from_value(data)?,
        })
    }
}

#[async_trait]
impl OutboxStore for PostgresOutbox {
    #[tracing::instrument(skip(self, publisher), fields(table = %self.table))]
    async fn drain(
        &self,
        limit: usize,
        time_budget: Duration,
        publisher: &dyn OutboxPublisher,
    ) -> Result<DrainReport> {
        let mut tx = self.pool.begin().await?;

        let rows = sqlx::query(&format!(
            r#"
            SELECT id, action, object, data
            FROM {}
            ORDER BY id ASC
            LIMIT $1
            FOR UPDATE SKIP LOCKED
            "#,
            self.table
        ))
        .bind(limit as i64)
        .fetch_all(&mut *tx)
        .await?;

        let batch = rows
            .into_iter()
            .map(Self::row_to_event)
            .collect::<Result<Vec<_>>>()?;

        let outcome = publish_in_order(&batch, time_budget, publisher).await;

        if !outcome.published.is_empty() {
            sqlx::query(&format!("DELETE FROM {} WHERE id = ANY($1)", self.table))
                .bind(&outcome.published)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(outcome.into_report(batch.len()))
    }

    async fn pending_count(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", self.table))
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }
}
