use std::time::Duration;

use async_trait::async_trait;
use channel::{Producer, StreamBroker};

use crate::store::DEFAULT_TIME_BUDGET;
use crate::{DrainReport, OutboxError, OutboxEvent, OutboxPublisher, OutboxStore, Result};

/// Default number of events drained per tick.
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Publishes outbox events through a [`Producer`].
struct ProducerPublisher<'a, B> {
    producer: &'a Producer<B>,
    timeout: Option<Duration>,
}

#[async_trait]
impl<'a, B: StreamBroker> OutboxPublisher for ProducerPublisher<'a, B> {
    async fn publish(&self, event: &OutboxEvent) -> Result<()> {
        let message = event.to_message();
        let publish = self.producer.publish(&message);

        let id = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, publish)
                .await
                .map_err(|_| OutboxError::PublishTimeout(limit))??,
            None => publish.await?,
        };

        tracing::debug!(event_id = event.id, action = %event.action, record_id = %id, "outbox event published");
        Ok(())
    }
}

/// Moves events from an outbox to a stream, one drain per tick.
pub struct OutboxPoller<S, B> {
    store: S,
    producer: Producer<B>,
    batch_size: usize,
    time_budget: Duration,
    publish_timeout: Option<Duration>,
}

impl<S: OutboxStore, B: StreamBroker> OutboxPoller<S, B> {
    /// Creates a poller with the default batch size and time budget and no
    /// publish deadline.
    pub fn new(store: S, producer: Producer<B>) -> Self {
        Self {
            store,
            producer,
            batch_size: DEFAULT_BATCH_SIZE,
            time_budget: DEFAULT_TIME_BUDGET,
            publish_timeout: None,
        }
    }

    /// Sets the maximum number of events drained per tick.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Sets the advisory time budget of one tick.
    pub fn with_time_budget(mut self, time_budget: Duration) -> Self {
        self.time_budget = time_budget;
        self
    }

    /// Fails a publish that takes longer than `timeout`; the event stays in
    /// the outbox.
    pub fn with_publish_timeout(mut self, timeout: Duration) -> Self {
        self.publish_timeout = Some(timeout);
        self
    }

    /// The drained store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Runs one drain.
    #[tracing::instrument(skip(self), fields(stream = %self.producer.stream()))]
    pub async fn tick(&self) -> Result<DrainReport> {
        let start = std::time::Instant::now();
        let publisher = ProducerPublisher {
            producer: &self.producer,
            timeout: self.publish_timeout,
        };

        let report = self
            .store
            .drain(self.batch_size, self.time_budget, &publisher)
            .await?;

        metrics::histogram!("outbox_drain_duration_seconds").record(start.elapsed().as_secs_f64());
        if report.published > 0 {
            tracing::debug!(published = report.published, claimed = report.claimed, "outbox drained");
        }
        Ok(report)
    }
}
