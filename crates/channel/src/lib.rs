//! Durable message channel over an append-only stream broker.
//!
//! [`Producer`] appends encoded messages to a stream; [`Consumer`] reads them
//! through a consumer group, acknowledging each record only after its handler
//! succeeds.

pub mod broker;
pub mod codec;
pub mod consumer;
pub mod error;
pub mod memory;
pub mod producer;
pub mod record;
pub mod redis_broker;

pub use broker::StreamBroker;
pub use consumer::{Consumer, CursorMode, DEFAULT_MAX_DELIVERIES, Delivery, MessageHandler};
pub use error::{ChannelError, Result};
pub use memory::InMemoryBroker;
pub use producer::{DEFAULT_MAX_LEN, Producer};
pub use record::{ReadCursor, RecordId, StreamRecord};
pub use redis_broker::RedisBroker;
