use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::{EventAction, Payload};
use tokio::sync::Mutex;

use crate::store::publish_in_order;
use crate::{DrainReport, OutboxEvent, OutboxPublisher, OutboxStore, Result};

#[derive(Default)]
struct Inner {
    last_id: i64,
    rows: BTreeMap<i64, OutboxEvent>,
    claimed: HashSet<i64>,
}

/// In-memory outbox for testing.
///
/// Rows selected by a running drain are claimed so that a concurrent drain
/// skips them, like `FOR UPDATE SKIP LOCKED` does in PostgreSQL.
#[derive(Clone, Default)]
pub struct InMemoryOutbox {
    inner: Arc<Mutex<Inner>>,
}

impl InMemoryOutbox {
    /// Creates an empty outbox.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an event, assigning the next id.
    pub async fn record(
        &self,
        action: EventAction,
        object: impl Into<String>,
        data: Payload,
    ) -> OutboxEvent {
        let mut inner = self.inner.lock().await;
        inner.last_id += 1;
        let event = OutboxEvent {
            id: inner.last_id,
            action,
            object: object.into(),
            data,
        };
        inner.rows.insert(event.id, event.clone());
        event
    }

    /// Returns every event still in the outbox, oldest first.
    pub async fn events(&self) -> Vec<OutboxEvent> {
        self.inner.lock().await.rows.values().cloned().collect()
    }
}

#[async_trait]
impl OutboxStore for InMemoryOutbox {
    async fn drain(
        &self,
        limit: usize,
        time_budget: Duration,
        publisher: &dyn OutboxPublisher,
    ) -> Result<DrainReport> {
        let batch: Vec<OutboxEvent> = {
            let mut inner = self.inner.lock().await;
            let batch: Vec<OutboxEvent> = inner
                .rows
                .values()
                .filter(|e| !inner.claimed.contains(&e.id))
                .take(limit)
                .cloned()
                .collect();
            inner.claimed.extend(batch.iter().map(|e| e.id));
            batch
        };

        let outcome = publish_in_order(&batch, time_budget, publisher).await;

        {
            let mut inner = self.inner.lock().await;
            for id in &outcome.published {
                inner.rows.remove(id);
            }
            for event in &batch {
                inner.claimed.remove(&event.id);
            }
        }

        Ok(outcome.into_report(batch.len()))
    }

    async fn pending_count(&self) -> Result<usize> {
        Ok(self.inner.lock().await.rows.len())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use super::*;
    use crate::OutboxError;
    use serde_json::json;

    /// Publisher recording ids and failing on a chosen id.
    #[derive(Default)]
    struct Recorder {
        published: StdMutex<Vec<i64>>,
        fail_on: Option<i64>,
        delay: Option<Duration>,
    }

    #[async_trait]
    impl OutboxPublisher for Recorder {
        async fn publish(&self, event: &OutboxEvent) -> Result<()> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail_on == Some(event.id) {
                return Err(OutboxError::PublishTimeout(Duration::ZERO));
            }
            self.published.lock().unwrap().push(event.id);
            Ok(())
        }
    }

    async fn outbox_with(n: usize) -> InMemoryOutbox {
        let outbox = InMemoryOutbox::new();
        for i in 0..n {
            let mut data = Payload::new();
            data.insert("n".to_string(), json!(i));
            outbox.record(EventAction::OrderCreated, "order", data).await;
        }
        outbox
    }

    fn ids(events: &[OutboxEvent]) -> Vec<i64> {
        events.iter().map(|e| e.id).collect()
    }

    #[tokio::test]
    async fn test_ids_increase() {
        let outbox = outbox_with(3).await;
        assert_eq!(ids(&outbox.events().await), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_drain_publishes_in_order_and_deletes() {
        let outbox = outbox_with(3).await;
        let publisher = Recorder::default();

        let report = outbox.drain(10, Duration::from_secs(5), &publisher).await.unwrap();

        assert_eq!(*publisher.published.lock().unwrap(), vec![1, 2, 3]);
        assert_eq!(report.claimed, 3);
        assert_eq!(report.published, 3);
        assert_eq!(report.failed_at, None);
        assert_eq!(outbox.pending_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_failure_keeps_failed_event_and_rest() {
        let outbox = outbox_with(5).await;
        let publisher = Recorder {
            fail_on: Some(3),
            ..Default::default()
        };

        let report = outbox.drain(10, Duration::from_secs(5), &publisher).await.unwrap();

        assert_eq!(*publisher.published.lock().unwrap(), vec![1, 2]);
        assert_eq!(report.failed_at, Some(3));
        assert_eq!(ids(&outbox.events().await), vec![3, 4, 5]);

        // Claims are released: the next drain retries from the failed event.
        let retry = Recorder::default();
        outbox.drain(10, Duration::from_secs(5), &retry).await.unwrap();
        assert_eq!(*retry.published.lock().unwrap(), vec![3, 4, 5]);
    }

    #[tokio::test]
    async fn test_limit_takes_oldest() {
        let outbox = outbox_with(5).await;
        let publisher = Recorder::default();

        outbox.drain(2, Duration::from_secs(5), &publisher).await.unwrap();

        assert_eq!(*publisher.published.lock().unwrap(), vec![1, 2]);
        assert_eq!(ids(&outbox.events().await), vec![3, 4, 5]);
    }

    #[tokio::test]
    async fn test_exhausted_budget_starts_no_new_publish() {
        let outbox = outbox_with(3).await;
        let publisher = Recorder {
            delay: Some(Duration::from_millis(30)),
            ..Default::default()
        };

        let report = outbox
            .drain(10, Duration::from_millis(10), &publisher)
            .await
            .unwrap();

        // The first publish started within budget and is never preempted.
        assert_eq!(report.published, 1);
        assert!(report.budget_exhausted);
        assert_eq!(ids(&outbox.events().await), vec![2, 3]);
    }

    #[tokio::test]
    async fn test_concurrent_drains_skip_claimed_rows() {
        let outbox = outbox_with(4).await;
        let slow = Recorder {
            delay: Some(Duration::from_millis(20)),
            ..Default::default()
        };
        let fast = Recorder::default();

        let (a, b) = tokio::join!(
            outbox.drain(2, Duration::from_secs(5), &slow),
            async {
                tokio::time::sleep(Duration::from_millis(5)).await;
                outbox.drain(10, Duration::from_secs(5), &fast).await
            }
        );
        a.unwrap();
        b.unwrap();

        assert_eq!(*slow.published.lock().unwrap(), vec![1, 2]);
        assert_eq!(*fast.published.lock().unwrap(), vec![3, 4]);
        assert_eq!(outbox.pending_count().await.unwrap(), 0);
    }
}
