use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{ChannelError, ReadCursor, RecordId, Result, StreamBroker, StreamRecord};

#[derive(Default)]
struct Group {
    last_delivered: u64,
    pending: HashMap<String, BTreeSet<u64>>,
}

#[derive(Default)]
struct Stream {
    next_seq: u64,
    entries: BTreeMap<u64, Vec<String>>,
    groups: HashMap<String, Group>,
}

impl Stream {
    fn record(&self, seq: u64) -> StreamRecord {
        StreamRecord {
            id: record_id(seq),
            // Trimmed entries are still listed as pending, without fields.
            fields: self.entries.get(&seq).cloned().unwrap_or_default(),
        }
    }
}

fn record_id(seq: u64) -> RecordId {
    RecordId::new(format!("0-{seq}"))
}

fn parse_seq(id: &RecordId) -> Option<u64> {
    id.as_str().strip_prefix("0-").and_then(|s| s.parse().ok())
}

/// In-memory stream broker for testing.
///
/// Mirrors the Redis Streams consumer-group behaviour the channel relies on,
/// including per-consumer pending lists and the empty reply for `New` reads
/// with nothing to deliver.
#[derive(Clone, Default)]
pub struct InMemoryBroker {
    streams: Arc<RwLock<HashMap<String, Stream>>>,
}

impl InMemoryBroker {
    /// Creates an empty broker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the decoded-field records currently held by a stream.
    pub async fn records(&self, stream: &str) -> Vec<StreamRecord> {
        let streams = self.streams.read().await;
        streams
            .get(stream)
            .map(|s| s.entries.keys().map(|seq| s.record(*seq)).collect())
            .unwrap_or_default()
    }

    /// Returns the number of records a group has delivered but not acknowledged.
    pub async fn pending_count(&self, stream: &str, group: &str) -> usize {
        let streams = self.streams.read().await;
        streams
            .get(stream)
            .and_then(|s| s.groups.get(group))
            .map(|g| g.pending.values().map(BTreeSet::len).sum())
            .unwrap_or(0)
    }
}

#[async_trait]
impl StreamBroker for InMemoryBroker {
    async fn append(&self, stream: &str, max_len: usize, fields: &[String]) -> Result<RecordId> {
        let mut streams = self.streams.write().await;
        let s = streams.entry(stream.to_string()).or_default();

        s.next_seq += 1;
        let seq = s.next_seq;
        s.entries.insert(seq, fields.to_vec());

        while s.entries.len() > max_len {
            s.entries.pop_first();
        }

        Ok(record_id(seq))
    }

    async fn create_group(&self, stream: &str, group: &str) -> Result<()> {
        let mut streams = self.streams.write().await;
        let s = streams.entry(stream.to_string()).or_default();
        let tail = s.next_seq;
        s.groups.entry(group.to_string()).or_insert_with(|| Group {
            last_delivered: tail,
            pending: HashMap::new(),
        });
        Ok(())
    }

    async fn read_group(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        cursor: ReadCursor,
        count: usize,
    ) -> Result<Option<Vec<StreamRecord>>> {
        let mut streams = self.streams.write().await;
        let no_group = || ChannelError::NoGroup {
            stream: stream.to_string(),
            group: group.to_string(),
        };
        let s = streams.get_mut(stream).ok_or_else(no_group)?;
        let g = s.groups.get(group).ok_or_else(no_group)?;

        match cursor {
            ReadCursor::Pending => {
                let seqs: Vec<u64> = g
                    .pending
                    .get(consumer)
                    .map(|p| p.iter().take(count).copied().collect())
                    .unwrap_or_default();
                Ok(Some(seqs.into_iter().map(|seq| s.record(seq)).collect()))
            }
            ReadCursor::New => {
                let seqs: Vec<u64> = s
                    .entries
                    .range(g.last_delivered + 1..)
                    .take(count)
                    .map(|(seq, _)| *seq)
                    .collect();
                if seqs.is_empty() {
                    return Ok(None);
                }

                let records = seqs.iter().map(|seq| s.record(*seq)).collect();
                let g = s.groups.get_mut(group).ok_or_else(no_group)?;
                if let Some(last) = seqs.last() {
                    g.last_delivered = *last;
                }
                g.pending
                    .entry(consumer.to_string())
                    .or_default()
                    .extend(seqs);
                Ok(Some(records))
            }
        }
    }

    async fn ack(&self, stream: &str, group: &str, id: &RecordId) -> Result<()> {
        let Some(seq) = parse_seq(id) else {
            return Ok(());
        };
        let mut streams = self.streams.write().await;
        if let Some(g) = streams.get_mut(stream).and_then(|s| s.groups.get_mut(group)) {
            for pending in g.pending.values_mut() {
                pending.remove(&seq);
            }
        }
        Ok(())
    }
}
