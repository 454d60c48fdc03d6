use serde::Serialize;
use serde_json::Value;

use crate::{ChannelError, RecordId, Result, StreamBroker, codec};

/// Default approximate cap on stream length.
pub const DEFAULT_MAX_LEN: usize = 1_000_000;

/// Appends messages to one stream.
#[derive(Clone)]
pub struct Producer<B> {
    broker: B,
    stream: String,
    max_len: usize,
}

impl<B: StreamBroker> Producer<B> {
    /// Creates a producer for `stream` with the default length cap.
    pub fn new(broker: B, stream: impl Into<String>) -> Self {
        Self {
            broker,
            stream: stream.into(),
            max_len: DEFAULT_MAX_LEN,
        }
    }

    /// Sets the approximate length cap of the stream.
    pub fn with_max_len(mut self, max_len: usize) -> Self {
        self.max_len = max_len;
        self
    }

    /// Name of the stream this producer appends to.
    pub fn stream(&self) -> &str {
        &self.stream
    }

    /// Encodes `message` and appends it, returning the broker-assigned id.
    ///
    /// The message must serialize to a JSON object.
    #[tracing::instrument(skip(self, message), fields(stream = %self.stream))]
    pub async fn publish<T: Serialize + ?Sized>(&self, message: &T) -> Result<RecordId> {
        let fields = match serde_json::to_value(message)? {
            Value::Object(map) => codec::encode(&map),
            other => {
                return Err(ChannelError::InvalidPayload(format!(
                    "expected an object, got {other}"
                )));
            }
        };

        let id = self
            .broker
            .append(&self.stream, self.max_len, &fields)
            .await?;

        metrics::counter!("channel_messages_published_total", "stream" => self.stream.clone())
            .increment(1);
        tracing::debug!(%id, "message published");
        Ok(id)
    }
}
