use serde::{Deserialize, Serialize};

/// Broker-assigned identifier of a stream record.
///
/// Ids are opaque outside the broker; the only property relied upon is that
/// they are unique and increase within a stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Wraps a raw broker id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the raw broker id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for RecordId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A record as stored on a stream: id plus flattened fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRecord {
    pub id: RecordId,
    pub fields: Vec<String>,
}

/// Where a consumer-group read starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadCursor {
    /// Records already delivered to this consumer but not yet acknowledged.
    Pending,
    /// Records never delivered to any consumer of the group.
    New,
}

impl ReadCursor {
    /// The id argument understood by `XREADGROUP`.
    pub fn as_arg(&self) -> &'static str {
        match self {
            ReadCursor::Pending => "0",
            ReadCursor::New => ">",
        }
    }
}
