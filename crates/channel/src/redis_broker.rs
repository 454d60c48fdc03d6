use async_trait::async_trait;
use redis::aio::MultiplexedConnection;

use crate::{ReadCursor, RecordId, Result, StreamBroker, StreamRecord};

/// Reply shape of `XREADGROUP`: `[[stream, [[id, [field, value, ...]], ...]], ...]`.
type ReadReply = Option<Vec<(String, Vec<(String, Vec<String>)>)>>;

/// Redis Streams-backed broker.
#[derive(Clone)]
pub struct RedisBroker {
    conn: MultiplexedConnection,
}

impl RedisBroker {
    /// Connects to Redis at `url`.
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        Ok(Self { conn })
    }

    /// Wraps an existing multiplexed connection.
    pub fn new(conn: MultiplexedConnection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl StreamBroker for RedisBroker {
    #[tracing::instrument(skip(self, fields))]
    async fn append(&self, stream: &str, max_len: usize, fields: &[String]) -> Result<RecordId> {
        let mut conn = self.conn.clone();
        let id: String = redis::cmd("XADD")
            .arg(stream)
            .arg("MAXLEN")
            .arg("~")
            .arg(max_len)
            .arg("*")
            .arg(fields)
            .query_async(&mut conn)
            .await?;
        Ok(RecordId::new(id))
    }

    #[tracing::instrument(skip(self))]
    async fn create_group(&self, stream: &str, group: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let created: redis::RedisResult<()> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(stream)
            .arg(group)
            .arg("$")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;

        match created {
            Ok(()) => Ok(()),
            Err(e) if e.code() == Some("BUSYGROUP") => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    #[tracing::instrument(skip(self))]
    async fn read_group(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        cursor: ReadCursor,
        count: usize,
    ) -> Result<Option<Vec<StreamRecord>>> {
        let mut conn = self.conn.clone();
        let reply: ReadReply = redis::cmd("XREADGROUP")
            .arg("GROUP")
            .arg(group)
            .arg(consumer)
            .arg("COUNT")
            .arg(count)
            .arg("STREAMS")
            .arg(stream)
            .arg(cursor.as_arg())
            .query_async(&mut conn)
            .await?;

        Ok(reply.map(|streams| {
            streams
                .into_iter()
                .filter(|(name, _)| name == stream)
                .flat_map(|(_, entries)| entries)
                .map(|(id, fields)| StreamRecord {
                    id: RecordId::new(id),
                    fields,
                })
                .collect()
        }))
    }

    #[tracing::instrument(skip(self))]
    async fn ack(&self, stream: &str, group: &str, id: &RecordId) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: i64 = redis::cmd("XACK")
            .arg(stream)
            .arg(group)
            .arg(id.as_str())
            .query_async(&mut conn)
            .await?;
        Ok(())
    }
}
