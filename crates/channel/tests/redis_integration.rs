//! Redis integration tests
//!
//! These tests use a shared Redis container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p channel --test redis_integration -- --test-threads=1
//! ```

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use channel::{
    ChannelError, Consumer, CursorMode, Delivery, MessageHandler, Producer, ReadCursor,
    RedisBroker, StreamBroker,
};
use serde_json::{Value, json};
use serial_test::serial;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::redis::{REDIS_PORT, Redis};
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Redis>,
    url: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Redis::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(REDIS_PORT).await.unwrap();

            Arc::new(ContainerInfo {
                container,
                url: format!("redis://{}:{}", host, port),
            })
        })
        .await
        .clone()
}

/// Get a broker on a flushed database
async fn get_test_broker() -> RedisBroker {
    let info = get_container_info().await;

    let client = redis::Client::open(info.url.as_str()).unwrap();
    let mut conn = client.get_multiplexed_async_connection().await.unwrap();
    let _: () = redis::cmd("FLUSHALL").query_async(&mut conn).await.unwrap();

    RedisBroker::connect(&info.url).await.unwrap()
}

#[derive(Debug, thiserror::Error)]
#[error("refused")]
struct Refused;

#[derive(Default)]
struct Recorder {
    seen: Mutex<Vec<Value>>,
    refuse_first: Mutex<bool>,
    refuse_all: Mutex<bool>,
}

#[async_trait]
impl MessageHandler for Recorder {
    type Error = Refused;

    async fn handle(&self, delivery: &Delivery) -> Result<(), Refused> {
        self.seen.lock().unwrap().push(Value::Object(delivery.message.clone()));
        if *self.refuse_all.lock().unwrap() && delivery.message["n"] == json!(1) {
            return Err(Refused);
        }
        let mut refuse = self.refuse_first.lock().unwrap();
        if *refuse {
            *refuse = false;
            return Err(Refused);
        }
        Ok(())
    }
}

#[tokio::test]
#[serial]
async fn append_assigns_increasing_ids() {
    let broker = get_test_broker().await;
    let fields = vec!["k".to_string(), "v".to_string()];

    let a = broker.append("ids", 1000, &fields).await.unwrap();
    let b = broker.append("ids", 1000, &fields).await.unwrap();
    assert_ne!(a, b);
}

#[tokio::test]
#[serial]
async fn create_group_twice_is_not_an_error() {
    let broker = get_test_broker().await;
    broker.create_group("groups", "g").await.unwrap();
    broker.create_group("groups", "g").await.unwrap();
}

#[tokio::test]
#[serial]
async fn live_read_without_records_has_no_reply() {
    let broker = get_test_broker().await;
    broker.create_group("empty", "g").await.unwrap();

    let pending = broker
        .read_group("empty", "g", "c", ReadCursor::Pending, 10)
        .await
        .unwrap();
    assert_eq!(pending.map(|r| r.len()), Some(0));

    let live = broker
        .read_group("empty", "g", "c", ReadCursor::New, 10)
        .await
        .unwrap();
    assert!(live.is_none());
}

#[tokio::test]
#[serial]
async fn read_without_group_is_an_error() {
    let broker = get_test_broker().await;
    broker
        .append("nogroup", 1000, &["k".to_string(), "v".to_string()])
        .await
        .unwrap();

    let result = broker
        .read_group("nogroup", "missing", "c", ReadCursor::New, 10)
        .await;
    assert!(matches!(result, Err(ChannelError::Redis(_))));
}

#[tokio::test]
#[serial]
async fn produce_and_consume_roundtrip() {
    let broker = get_test_broker().await;
    let producer = Producer::new(broker.clone(), "orders");
    let consumer = Consumer::new(broker.clone(), "orders", "orders_cg", "c1");
    let handler = Recorder::default();

    assert!(consumer.consume(&handler, 10).await.unwrap());
    assert_eq!(consumer.mode(), CursorMode::Live);

    producer
        .publish(&json!({"action": "CREATE_ORDER", "payload": {"name": "book"}, "code": "123"}))
        .await
        .unwrap();
    assert!(consumer.consume(&handler, 10).await.unwrap());

    let seen = handler.seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0]["action"], json!("CREATE_ORDER"));
    assert_eq!(seen[0]["payload"], json!({"name": "book"}));
    assert_eq!(seen[0]["code"], json!(123));
}

#[tokio::test]
#[serial]
async fn refused_record_is_redelivered() {
    let broker = get_test_broker().await;
    let producer = Producer::new(broker.clone(), "retry");
    let consumer = Consumer::new(broker.clone(), "retry", "retry_cg", "c1");
    let handler = Recorder::default();

    consumer.consume(&handler, 10).await.unwrap();
    producer.publish(&json!({"n": 1})).await.unwrap();

    *handler.refuse_first.lock().unwrap() = true;
    let err = consumer.consume(&handler, 10).await.unwrap_err();
    assert!(matches!(err, ChannelError::Handler { .. }));

    consumer.consume(&handler, 10).await.unwrap();

    let seen = handler.seen.lock().unwrap().clone();
    assert_eq!(seen, vec![json!({"n": 1}), json!({"n": 1})]);

    let pending = broker
        .read_group("retry", "retry_cg", "c1", ReadCursor::Pending, 10)
        .await
        .unwrap()
        .unwrap();
    assert!(pending.is_empty());
}

#[tokio::test]
#[serial]
async fn refused_record_moves_to_dead_letter_stream() {
    let broker = get_test_broker().await;
    let producer = Producer::new(broker.clone(), "poison");
    let consumer =
        Consumer::new(broker.clone(), "poison", "poison_cg", "c1").with_max_deliveries(2);
    let handler = Recorder::default();

    consumer.consume(&handler, 10).await.unwrap();
    producer.publish(&json!({"n": 1})).await.unwrap();
    producer.publish(&json!({"n": 2})).await.unwrap();
    *handler.refuse_all.lock().unwrap() = true;

    assert!(consumer.consume(&handler, 10).await.is_err());
    assert!(consumer.consume(&handler, 10).await.is_err());
    consumer.consume(&handler, 10).await.unwrap();

    let seen = handler.seen.lock().unwrap().clone();
    assert_eq!(seen.last(), Some(&json!({"n": 2})));

    let pending = broker
        .read_group("poison", "poison_cg", "c1", ReadCursor::Pending, 10)
        .await
        .unwrap()
        .unwrap();
    assert!(pending.is_empty());

    let client = redis::Client::open(get_container_info().await.url.as_str()).unwrap();
    let mut conn = client.get_multiplexed_async_connection().await.unwrap();
    let len: usize = redis::cmd("XLEN")
        .arg(consumer.dead_letter_stream())
        .query_async(&mut conn)
        .await
        .unwrap();
    assert_eq!(len, 1);
}
