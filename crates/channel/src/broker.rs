use async_trait::async_trait;

use crate::{ReadCursor, RecordId, Result, StreamRecord};

/// Durable append-only log with consumer groups.
///
/// This is the capability the channel needs from a broker. Semantics follow
/// Redis Streams: a group starts at the tail of the stream, every delivered
/// record sits in the reading consumer's pending list until acknowledged, and
/// a `New` read with nothing to deliver yields no reply at all.
#[async_trait]
pub trait StreamBroker: Send + Sync {
    /// Appends a record, trimming the stream to roughly `max_len` records.
    async fn append(&self, stream: &str, max_len: usize, fields: &[String]) -> Result<RecordId>;

    /// Creates a consumer group positioned at the current tail, creating the
    /// stream if needed. Creating an existing group is not an error.
    async fn create_group(&self, stream: &str, group: &str) -> Result<()>;

    /// Reads up to `count` records for `consumer`.
    ///
    /// Returns `None` when the broker has no reply for the read.
    async fn read_group(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        cursor: ReadCursor,
        count: usize,
    ) -> Result<Option<Vec<StreamRecord>>>;

    /// Acknowledges a record, removing it from the group's pending entries.
    async fn ack(&self, stream: &str, group: &str, id: &RecordId) -> Result<()>;
}
