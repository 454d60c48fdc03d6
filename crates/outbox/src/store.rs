use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::{OutboxError, OutboxEvent, Result};

/// Default advisory time budget of one drain call.
pub const DEFAULT_TIME_BUDGET: Duration = Duration::from_secs(5);

/// Hands drained events to the broker.
#[async_trait]
pub trait OutboxPublisher: Send + Sync {
    /// Publishes one event. An error stops the drain at this event.
    async fn publish(&self, event: &OutboxEvent) -> Result<()>;
}

/// Outcome of one drain call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Rows selected (and locked) for this drain.
    pub claimed: usize,
    /// Rows published and deleted.
    pub published: usize,
    /// Id of the event whose publish failed, if any.
    pub failed_at: Option<i64>,
    /// Whether the time budget cut the batch short.
    pub budget_exhausted: bool,
}

/// Durable table of not-yet-published events.
#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// Publishes up to `limit` of the oldest unclaimed events in id order.
    ///
    /// Stops at the first publish failure, and starts no new publish once
    /// `time_budget` has elapsed. Exactly the events that were published are
    /// deleted; everything else stays for a later drain.
    async fn drain(
        &self,
        limit: usize,
        time_budget: Duration,
        publisher: &dyn OutboxPublisher,
    ) -> Result<DrainReport>;

    /// Number of events still waiting to be published.
    async fn pending_count(&self) -> Result<usize>;
}

/// Result of publishing a claimed batch.
pub(crate) struct BatchOutcome {
    pub published: Vec<i64>,
    pub failure: Option<(i64, OutboxError)>,
    pub budget_exhausted: bool,
}

/// Publishes `events` in order until one fails or the budget runs out.
pub(crate) async fn publish_in_order(
    events: &[OutboxEvent],
    time_budget: Duration,
    publisher: &dyn OutboxPublisher,
) -> BatchOutcome {
    let started = Instant::now();
    let mut outcome = BatchOutcome {
        published: Vec::with_capacity(events.len()),
        failure: None,
        budget_exhausted: false,
    };

    for event in events {
        if started.elapsed() >= time_budget {
            outcome.budget_exhausted = true;
            break;
        }
        if let Err(e) = publisher.publish(event).await {
            outcome.failure = Some((event.id, e));
            break;
        }
        outcome.published.push(event.id);
    }

    outcome
}

impl BatchOutcome {
    /// Logs and counts the outcome, turning it into a report.
    pub(crate) fn into_report(self, claimed: usize) -> DrainReport {
        metrics::counter!("outbox_events_published_total").increment(self.published.len() as u64);

        let failed_at = self.failure.map(|(id, e)| {
            metrics::counter!("outbox_publish_failures_total").increment(1);
            tracing::warn!(event_id = id, error = %e, "publish failed, batch stopped");
            id
        });
        if self.budget_exhausted {
            tracing::warn!(
                published = self.published.len(),
                claimed,
                "drain time budget exhausted"
            );
        }

        DrainReport {
            claimed,
            published: self.published.len(),
            failed_at,
            budget_exhausted: self.budget_exhausted,
        }
    }
}
