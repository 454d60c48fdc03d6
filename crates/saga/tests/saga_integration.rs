//! Integration tests for the saga execution coordinator.
//!
//! Participants are simulated by publishing their events straight onto the
//! reply stream; the coordinator reads them through a consumer group exactly
//! as it does in production.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use channel::{
    ChannelError, Consumer, DEFAULT_MAX_DELIVERIES, InMemoryBroker, Producer, codec,
};
use common::{CorrelationId, EventAction, Participant, Payload, REPLY_GROUP, REPLY_STREAM};
use saga::{
    CommandProducers, CoordinatorConfig, HistoryEntry, InMemorySagaStore, SAGA_NAME, SagaError,
    SagaExecutionCoordinator, SagaState, SagaStatus, SagaStore,
};
use serde_json::{Value, json};

struct TestHarness {
    broker: InMemoryBroker,
    store: InMemorySagaStore,
    coordinator: SagaExecutionCoordinator<InMemorySagaStore, InMemoryBroker>,
    consumer: Consumer<InMemoryBroker>,
    replies: Producer<InMemoryBroker>,
    next_event_id: std::cell::Cell<i64>,
}

impl TestHarness {
    async fn new() -> Self {
        Self::with_config(CoordinatorConfig::default()).await
    }

    async fn with_config(config: CoordinatorConfig) -> Self {
        let broker = InMemoryBroker::new();
        let store = InMemorySagaStore::new();
        let coordinator = SagaExecutionCoordinator::with_config(
            store.clone(),
            CommandProducers::new(broker.clone()),
            config,
        );
        let consumer = Consumer::new(broker.clone(), REPLY_STREAM, REPLY_GROUP, "sec-1");
        let replies = Producer::new(broker.clone(), REPLY_STREAM);

        // Drain the (empty) backlog so the consumer is live.
        consumer.consume(&coordinator, 10).await.unwrap();

        Self {
            broker,
            store,
            coordinator,
            consumer,
            replies,
            next_event_id: std::cell::Cell::new(1),
        }
    }

    /// Publishes a participant event the way an outbox poller would.
    async fn emit(&self, action: EventAction, data: Value) {
        let id = self.next_event_id.get();
        self.next_event_id.set(id + 1);
        self.replies
            .publish(&json!({
                "id": id,
                "action": action.as_str(),
                "object": action.family().as_str(),
                "data": data,
            }))
            .await
            .unwrap();
    }

    async fn tick(&self) -> channel::Result<bool> {
        self.consumer.consume(&self.coordinator, 10).await
    }

    async fn commands(&self, participant: Participant) -> Vec<String> {
        self.broker
            .records(participant.command_stream())
            .await
            .iter()
            .map(|r| codec::decode(&r.fields)["action"].as_str().unwrap_or("").to_string())
            .collect()
    }

    async fn command_payloads(&self, participant: Participant) -> Vec<Payload> {
        self.broker
            .records(participant.command_stream())
            .await
            .iter()
            .filter_map(|r| match codec::decode(&r.fields).remove("payload") {
                Some(Value::Object(map)) => Some(map),
                _ => None,
            })
            .collect()
    }
}

#[tokio::test]
async fn test_happy_path_full_order_saga() {
    let h = TestHarness::new().await;
    let order_id = CorrelationId::new();
    let cid = order_id.to_string();

    h.emit(
        EventAction::OrderCreated,
        json!({"id": cid, "name": "book", "status": "pending"}),
    )
    .await;
    h.tick().await.unwrap();

    h.emit(
        EventAction::PaymentCreated,
        json!({"id": CorrelationId::new().to_string(), "order_id": cid, "correlationId": cid}),
    )
    .await;
    h.tick().await.unwrap();

    h.emit(
        EventAction::DeliveryCreated,
        json!({"id": CorrelationId::new().to_string(), "order_id": cid, "correlationId": cid}),
    )
    .await;
    h.tick().await.unwrap();

    h.emit(
        EventAction::OrderApproved,
        json!({"id": cid, "status": "approved", "correlationId": cid}),
    )
    .await;
    h.tick().await.unwrap();

    assert_eq!(h.commands(Participant::Payment).await, vec!["CREATE_PAYMENT"]);
    assert_eq!(h.commands(Participant::Delivery).await, vec!["CREATE_DELIVERY"]);
    assert_eq!(h.commands(Participant::Order).await, vec!["APPROVE_ORDER"]);

    for payload in h.command_payloads(Participant::Delivery).await {
        assert_eq!(payload["correlationId"], json!(cid));
    }

    let saga = h.store.find_by_correlation_id(order_id).await.unwrap().unwrap();
    assert_eq!(saga.name, SAGA_NAME);
    assert_eq!(saga.status(), SagaStatus::Terminated);
    assert_eq!(saga.history.len(), 4);
    assert!(saga.history[3].command.is_none());
    assert!(saga.history[3].stream_id.is_none());
    assert_eq!(h.broker.pending_count(REPLY_STREAM, REPLY_GROUP).await, 0);
}

#[tokio::test]
async fn test_payment_rejection_cancels_order() {
    let h = TestHarness::new().await;
    let order_id = CorrelationId::new();
    let cid = order_id.to_string();

    h.emit(EventAction::OrderCreated, json!({"id": cid, "name": "book"}))
        .await;
    h.tick().await.unwrap();

    h.emit(
        EventAction::PaymentRejected,
        json!({"id": CorrelationId::new().to_string(), "order_id": cid}),
    )
    .await;
    h.tick().await.unwrap();

    assert_eq!(h.commands(Participant::Payment).await, vec!["CREATE_PAYMENT"]);
    assert_eq!(h.commands(Participant::Order).await, vec!["CANCEL_ORDER"]);

    let saga = h.store.find_by_correlation_id(order_id).await.unwrap().unwrap();
    assert_eq!(saga.status(), SagaStatus::Active);

    h.emit(
        EventAction::OrderCancelled,
        json!({"id": cid, "status": "cancelled"}),
    )
    .await;
    h.tick().await.unwrap();

    let saga = h.store.find_by_correlation_id(order_id).await.unwrap().unwrap();
    assert_eq!(saga.status(), SagaStatus::Terminated);
    assert_eq!(saga.history.len(), 3);
}

#[tokio::test]
async fn test_order_rejection_walks_back_every_step() {
    let h = TestHarness::new().await;
    let order_id = CorrelationId::new();
    let cid = order_id.to_string();

    let steps = [
        (EventAction::OrderCreated, json!({"id": cid})),
        (EventAction::PaymentCreated, json!({"order_id": cid})),
        (EventAction::DeliveryCreated, json!({"order_id": cid})),
        (EventAction::OrderRejected, json!({"id": cid})),
        (EventAction::DeliveryCancelled, json!({"order_id": cid})),
        (EventAction::PaymentCancelled, json!({"order_id": cid})),
        (EventAction::OrderCancelled, json!({"id": cid})),
    ];
    for (action, data) in steps {
        h.emit(action, data).await;
        h.tick().await.unwrap();
    }

    assert_eq!(
        h.commands(Participant::Order).await,
        vec!["APPROVE_ORDER", "CANCEL_ORDER"]
    );
    assert_eq!(
        h.commands(Participant::Payment).await,
        vec!["CREATE_PAYMENT", "CANCEL_PAYMENT"]
    );
    assert_eq!(
        h.commands(Participant::Delivery).await,
        vec!["CREATE_DELIVERY", "CANCEL_DELIVERY"]
    );

    let saga = h.store.find_by_correlation_id(order_id).await.unwrap().unwrap();
    assert_eq!(saga.status(), SagaStatus::Terminated);
    assert_eq!(saga.history.len(), 7);
}

#[tokio::test]
async fn test_delivery_failure_refunds_payment() {
    let h = TestHarness::new().await;
    let cid = CorrelationId::new().to_string();

    for (action, data) in [
        (EventAction::OrderCreated, json!({"id": cid})),
        (EventAction::PaymentCreated, json!({"order_id": cid})),
        (EventAction::DeliveryFailed, json!({"order_id": cid})),
        (EventAction::PaymentCancelled, json!({"order_id": cid})),
    ] {
        h.emit(action, data).await;
        h.tick().await.unwrap();
    }

    assert_eq!(
        h.commands(Participant::Payment).await,
        vec!["CREATE_PAYMENT", "CANCEL_PAYMENT"]
    );
    assert_eq!(h.commands(Participant::Order).await, vec!["CANCEL_ORDER"]);
}

#[tokio::test]
async fn test_unknown_event_does_not_block_later_events() {
    let h = TestHarness::new().await;
    let order_id = CorrelationId::new();

    h.replies
        .publish(&json!({"id": 99, "action": "ORDER_SHIPPED", "object": "order", "data": {}}))
        .await
        .unwrap();
    h.emit(EventAction::OrderCreated, json!({"id": order_id.to_string()}))
        .await;

    let err = h.tick().await.unwrap_err();
    assert!(matches!(err, ChannelError::Handler { .. }));
    assert_eq!(h.broker.pending_count(REPLY_STREAM, REPLY_GROUP).await, 2);
    assert_eq!(h.store.saga_count().await, 0);

    // Retried until the delivery cap, then set aside.
    for _ in 1..DEFAULT_MAX_DELIVERIES {
        assert!(h.tick().await.is_err());
    }
    h.tick().await.unwrap();

    let saga = h.store.find_by_correlation_id(order_id).await.unwrap();
    assert!(saga.is_some());
    assert_eq!(h.commands(Participant::Payment).await, vec!["CREATE_PAYMENT"]);
    assert_eq!(h.broker.pending_count(REPLY_STREAM, REPLY_GROUP).await, 0);

    let dead = h.broker.records(h.consumer.dead_letter_stream()).await;
    assert_eq!(dead.len(), 1);
    assert_eq!(codec::decode(&dead[0].fields)["action"], json!("ORDER_SHIPPED"));

    // New events keep flowing.
    h.emit(
        EventAction::PaymentCreated,
        json!({"order_id": order_id.to_string()}),
    )
    .await;
    h.tick().await.unwrap();
    h.tick().await.unwrap();
    assert_eq!(h.commands(Participant::Delivery).await, vec!["CREATE_DELIVERY"]);
}

#[tokio::test]
async fn test_redelivered_event_is_not_reissued() {
    let h = TestHarness::new().await;
    let order_id = CorrelationId::new();
    let cid = order_id.to_string();

    h.emit(EventAction::OrderCreated, json!({"id": cid})).await;
    h.tick().await.unwrap();

    // The outbox poller republishes the same outbox row after a lost delete.
    h.replies
        .publish(&json!({"id": 1, "action": "ORDER_CREATED", "object": "order", "data": {"id": cid}}))
        .await
        .unwrap();
    h.tick().await.unwrap();

    assert_eq!(h.commands(Participant::Payment).await.len(), 1);
    let saga = h.store.find_by_correlation_id(order_id).await.unwrap().unwrap();
    assert_eq!(saga.history.len(), 1);
    assert_eq!(h.broker.pending_count(REPLY_STREAM, REPLY_GROUP).await, 0);
}

#[tokio::test]
async fn test_redelivered_event_without_dedupe_duplicates_commands() {
    let h = TestHarness::with_config(CoordinatorConfig { deduplicate: false }).await;
    let order_id = CorrelationId::new();
    let cid = order_id.to_string();

    h.emit(EventAction::OrderCreated, json!({"id": cid})).await;
    h.tick().await.unwrap();
    h.replies
        .publish(&json!({"id": 1, "action": "ORDER_CREATED", "object": "order", "data": {"id": cid}}))
        .await
        .unwrap();
    h.tick().await.unwrap();

    assert_eq!(
        h.commands(Participant::Payment).await,
        vec!["CREATE_PAYMENT", "CREATE_PAYMENT"]
    );
    let saga = h.store.find_by_correlation_id(order_id).await.unwrap().unwrap();
    assert_eq!(saga.history.len(), 2);
}

#[tokio::test]
async fn test_batch_processes_multiple_sagas_in_order() {
    let h = TestHarness::new().await;
    let first = CorrelationId::new();
    let second = CorrelationId::new();

    h.emit(EventAction::OrderCreated, json!({"id": first.to_string()}))
        .await;
    h.emit(EventAction::OrderCreated, json!({"id": second.to_string()}))
        .await;
    h.tick().await.unwrap();

    let payloads = h.command_payloads(Participant::Payment).await;
    assert_eq!(payloads.len(), 2);
    assert_eq!(payloads[0]["correlationId"], json!(first.to_string()));
    assert_eq!(payloads[1]["correlationId"], json!(second.to_string()));
    assert_eq!(h.store.saga_count().await, 2);
}

/// Saga store whose next `complete` fails once.
#[derive(Clone, Default)]
struct FlakyStore {
    inner: InMemorySagaStore,
    fail_complete: Arc<AtomicBool>,
}

#[async_trait]
impl SagaStore for FlakyStore {
    async fn create(&self, correlation_id: CorrelationId, name: &str) -> saga::Result<SagaState> {
        self.inner.create(correlation_id, name).await
    }

    async fn find_by_correlation_id(
        &self,
        correlation_id: CorrelationId,
    ) -> saga::Result<Option<SagaState>> {
        self.inner.find_by_correlation_id(correlation_id).await
    }

    async fn append_history(
        &self,
        correlation_id: CorrelationId,
        entry: &HistoryEntry,
    ) -> saga::Result<()> {
        self.inner.append_history(correlation_id, entry).await
    }

    async fn complete(
        &self,
        correlation_id: CorrelationId,
        entry: &HistoryEntry,
    ) -> saga::Result<()> {
        if self.fail_complete.swap(false, Ordering::SeqCst) {
            return Err(SagaError::Database(sqlx::Error::PoolTimedOut));
        }
        self.inner.complete(correlation_id, entry).await
    }

    async fn terminate(&self, correlation_id: CorrelationId) -> saga::Result<()> {
        self.inner.terminate(correlation_id).await
    }
}

#[tokio::test]
async fn test_failed_termination_is_retried_until_saga_ends() {
    let broker = InMemoryBroker::new();
    let store = FlakyStore::default();
    let coordinator =
        SagaExecutionCoordinator::new(store.clone(), CommandProducers::new(broker.clone()));
    let consumer = Consumer::new(broker.clone(), REPLY_STREAM, REPLY_GROUP, "sec-1");
    let replies = Producer::new(broker.clone(), REPLY_STREAM);
    consumer.consume(&coordinator, 10).await.unwrap();

    let order_id = CorrelationId::new();
    let cid = order_id.to_string();
    replies
        .publish(&json!({"id": 1, "action": "ORDER_CREATED", "object": "order", "data": {"id": cid}}))
        .await
        .unwrap();
    consumer.consume(&coordinator, 10).await.unwrap();

    store.fail_complete.store(true, Ordering::SeqCst);
    replies
        .publish(&json!({"id": 2, "action": "ORDER_CANCELLED", "object": "order", "data": {"id": cid}}))
        .await
        .unwrap();
    assert!(consumer.consume(&coordinator, 10).await.is_err());

    let saga = store.find_by_correlation_id(order_id).await.unwrap().unwrap();
    assert_eq!(saga.status(), SagaStatus::Active);
    assert_eq!(saga.history.len(), 1);

    consumer.consume(&coordinator, 10).await.unwrap();

    let saga = store.find_by_correlation_id(order_id).await.unwrap().unwrap();
    assert_eq!(saga.status(), SagaStatus::Terminated);
    assert_eq!(saga.history.len(), 2);
    assert_eq!(broker.pending_count(REPLY_STREAM, REPLY_GROUP).await, 0);
}
