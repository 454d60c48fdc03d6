//! Consumer-group consumer with backlog-then-live cursor.
//!
//! A fresh consumer first drains its own pending entries (records delivered
//! to it before a restart but never acknowledged). The first read that comes
//! back empty switches it to reading new records, permanently. A handler
//! failure while live re-arms a pending replay so the refused record is
//! retried before any new record is taken.
//!
//! Replay is bounded: a record refused `max_deliveries` times is copied to the
//! dead-letter stream and acknowledged, so one bad record cannot hold back the
//! rest of the stream. Pending entries whose record was trimmed from the
//! stream come back without fields; they are acknowledged and skipped.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use common::Payload;
use tokio::sync::Mutex;

use crate::{
    ChannelError, DEFAULT_MAX_LEN, ReadCursor, RecordId, Result, StreamBroker, StreamRecord,
    codec,
};

/// Default number of refused deliveries before a record is dead-lettered.
pub const DEFAULT_MAX_DELIVERIES: u32 = 3;

/// A decoded record handed to a [`MessageHandler`].
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub id: RecordId,
    pub stream: String,
    pub message: Payload,
}

/// Processes delivered messages.
///
/// Returning `Ok` acknowledges the record; returning an error leaves it and
/// every later record of the batch pending for redelivery.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    async fn handle(&self, delivery: &Delivery) -> std::result::Result<(), Self::Error>;
}

/// Which records the consumer is currently reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorMode {
    /// Replaying this consumer's unacknowledged records.
    Backlog,
    /// Reading records never delivered to the group.
    Live,
}

/// Consumer-group reader of one stream.
pub struct Consumer<B> {
    broker: B,
    stream: String,
    group: String,
    name: String,
    dead_letter_stream: String,
    max_deliveries: u32,
    live: AtomicBool,
    pending_replay: AtomicBool,
    refusals: Mutex<HashMap<RecordId, u32>>,
}

impl<B: StreamBroker> Consumer<B> {
    /// Creates a consumer named `name` in `group` on `stream`.
    ///
    /// Dead letters go to `<stream>_dead_letter`.
    pub fn new(
        broker: B,
        stream: impl Into<String>,
        group: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        let stream = stream.into();
        Self {
            broker,
            dead_letter_stream: format!("{stream}_dead_letter"),
            stream,
            group: group.into(),
            name: name.into(),
            max_deliveries: DEFAULT_MAX_DELIVERIES,
            live: AtomicBool::new(false),
            pending_replay: AtomicBool::new(false),
            refusals: Mutex::new(HashMap::new()),
        }
    }

    /// Sets how many refused deliveries a record gets before it is
    /// dead-lettered. Values below one are treated as one.
    pub fn with_max_deliveries(mut self, max_deliveries: u32) -> Self {
        self.max_deliveries = max_deliveries.max(1);
        self
    }

    /// Sets the stream refused records are moved to.
    pub fn with_dead_letter_stream(mut self, stream: impl Into<String>) -> Self {
        self.dead_letter_stream = stream.into();
        self
    }

    /// Current cursor mode.
    pub fn mode(&self) -> CursorMode {
        if self.live.load(Ordering::SeqCst) {
            CursorMode::Live
        } else {
            CursorMode::Backlog
        }
    }

    /// Name of the consumed stream.
    pub fn stream(&self) -> &str {
        &self.stream
    }

    /// Name of the dead-letter stream.
    pub fn dead_letter_stream(&self) -> &str {
        &self.dead_letter_stream
    }

    fn cursor(&self) -> ReadCursor {
        if self.mode() == CursorMode::Backlog || self.pending_replay.load(Ordering::SeqCst) {
            ReadCursor::Pending
        } else {
            ReadCursor::New
        }
    }

    /// Runs one fetch-and-process cycle of up to `limit` records.
    ///
    /// Returns `false` when the broker had no reply for the read. Records are
    /// handled in order; the first handler failure stops the batch and is
    /// returned as [`ChannelError::Handler`].
    #[tracing::instrument(skip(self, handler), fields(stream = %self.stream, group = %self.group, consumer = %self.name))]
    pub async fn consume<H>(&self, handler: &H, limit: usize) -> Result<bool>
    where
        H: MessageHandler + ?Sized,
    {
        self.broker.create_group(&self.stream, &self.group).await?;

        let cursor = self.cursor();
        let Some(records) = self
            .broker
            .read_group(&self.stream, &self.group, &self.name, cursor, limit)
            .await?
        else {
            return Ok(false);
        };

        if records.is_empty() {
            if cursor == ReadCursor::Pending {
                if !self.live.swap(true, Ordering::SeqCst) {
                    tracing::info!("backlog drained, switching to live");
                }
                self.pending_replay.store(false, Ordering::SeqCst);
            }
            return Ok(true);
        }

        for record in records {
            if record.fields.is_empty() {
                tracing::warn!(record_id = %record.id, "pending record was trimmed from the stream, skipping");
                metrics::counter!("channel_records_trimmed_total", "stream" => self.stream.clone())
                    .increment(1);
                self.broker
                    .ack(&self.stream, &self.group, &record.id)
                    .await?;
                continue;
            }

            let delivery = Delivery {
                id: record.id.clone(),
                stream: self.stream.clone(),
                message: codec::decode(&record.fields),
            };

            if let Err(e) = handler.handle(&delivery).await {
                self.pending_replay.store(true, Ordering::SeqCst);
                metrics::counter!("channel_handler_failures_total", "stream" => self.stream.clone())
                    .increment(1);
                tracing::warn!(record_id = %delivery.id, error = %e, "handler failed, batch stopped");

                if self.refused(&delivery.id).await >= self.max_deliveries {
                    self.dead_letter(&record, e.to_string()).await?;
                }
                return Err(ChannelError::Handler {
                    record_id: delivery.id,
                    source: Box::new(e),
                });
            }

            self.broker
                .ack(&self.stream, &self.group, &delivery.id)
                .await?;
            self.refusals.lock().await.remove(&delivery.id);
            metrics::counter!("channel_records_acked_total", "stream" => self.stream.clone())
                .increment(1);
        }

        Ok(true)
    }

    /// Counts one more refusal of `id` and returns the total.
    async fn refused(&self, id: &RecordId) -> u32 {
        let mut refusals = self.refusals.lock().await;
        let count = refusals.entry(id.clone()).or_insert(0);
        *count += 1;
        *count
    }

    /// Copies a refused record to the dead-letter stream, then acknowledges it.
    async fn dead_letter(&self, record: &StreamRecord, error: String) -> Result<()> {
        let mut fields = record.fields.clone();
        fields.extend([
            "deadLetterSource".to_string(),
            format!("{}:{}", self.stream, record.id),
            "deadLetterError".to_string(),
            error,
        ]);
        let id = self
            .broker
            .append(&self.dead_letter_stream, DEFAULT_MAX_LEN, &fields)
            .await?;
        self.broker
            .ack(&self.stream, &self.group, &record.id)
            .await?;
        self.refusals.lock().await.remove(&record.id);

        metrics::counter!("channel_records_dead_lettered_total", "stream" => self.stream.clone())
            .increment(1);
        tracing::error!(
            record_id = %record.id,
            dead_letter_id = %id,
            dead_letter_stream = %self.dead_letter_stream,
            attempts = self.max_deliveries,
            "record refused too often, moved to dead-letter stream"
        );
        Ok(())
    }
}
