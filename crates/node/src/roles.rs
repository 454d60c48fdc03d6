//! Wiring of the coordinator and participant loops.

use std::sync::Arc;
use std::time::Duration;

use channel::{Consumer, Producer, StreamBroker};
use common::{REPLY_GROUP, REPLY_STREAM};
use outbox::OutboxPoller;
use participants::{ParticipantRepository, ParticipantService, Policy};
use saga::{CommandProducers, SagaExecutionCoordinator, SagaStore};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::scheduler::PeriodicTask;

/// Loop parameters shared by every role.
#[derive(Debug, Clone)]
pub struct LoopSettings {
    pub poll_interval: Duration,
    pub batch_size: usize,
    pub drain_time_budget: Duration,
    pub publish_timeout: Option<Duration>,
    pub consumer_name: String,
    pub stream_max_len: usize,
    pub max_deliveries: u32,
}

impl From<&Config> for LoopSettings {
    fn from(config: &Config) -> Self {
        Self {
            poll_interval: config.poll_interval,
            batch_size: config.batch_size,
            drain_time_budget: config.drain_time_budget,
            publish_timeout: config.publish_timeout,
            consumer_name: config.consumer_name.clone(),
            stream_max_len: config.stream_max_len,
            max_deliveries: config.max_deliveries,
        }
    }
}

/// Starts the coordinator's consumer loop on the reply stream.
pub fn spawn_coordinator<S, B>(
    store: S,
    broker: B,
    settings: &LoopSettings,
    shutdown: &broadcast::Sender<()>,
) -> JoinHandle<()>
where
    S: SagaStore + 'static,
    B: StreamBroker + Clone + 'static,
{
    let producers = CommandProducers::new(broker.clone()).with_max_len(settings.stream_max_len);
    let coordinator = Arc::new(SagaExecutionCoordinator::new(store, producers));
    let consumer = Consumer::new(broker, REPLY_STREAM, REPLY_GROUP, settings.consumer_name.clone())
        .with_max_deliveries(settings.max_deliveries);
    let consumer = Arc::new(consumer);
    let batch_size = settings.batch_size;

    PeriodicTask::new("saga-consumer", settings.poll_interval).spawn(
        shutdown.subscribe(),
        move || {
            let (coordinator, consumer) = (coordinator.clone(), consumer.clone());
            async move { consumer.consume(coordinator.as_ref(), batch_size).await }
        },
    )
}

/// Starts a participant's command consumer loop and outbox poller loop.
pub fn spawn_participant<R, P, B>(
    service: ParticipantService<R, P>,
    broker: B,
    settings: &LoopSettings,
    shutdown: &broadcast::Sender<()>,
) -> Vec<JoinHandle<()>>
where
    R: ParticipantRepository + 'static,
    P: Policy + 'static,
    B: StreamBroker + Clone + 'static,
{
    let participant = service.participant();

    let producer = Producer::new(broker.clone(), REPLY_STREAM).with_max_len(settings.stream_max_len);
    let mut poller = OutboxPoller::new(service.repository().outbox(), producer)
        .with_batch_size(settings.batch_size)
        .with_time_budget(settings.drain_time_budget);
    if let Some(timeout) = settings.publish_timeout {
        poller = poller.with_publish_timeout(timeout);
    }
    let poller = Arc::new(poller);

    let consumer = Consumer::new(broker, participant.command_stream(), participant.consumer_group(), settings.consumer_name.clone())
        .with_max_deliveries(settings.max_deliveries);
    let consumer = Arc::new(consumer);
    let service = Arc::new(service);
    let batch_size = settings.batch_size;

    let consume = PeriodicTask::new("command-consumer", settings.poll_interval).spawn(
        shutdown.subscribe(),
        move || {
            let (service, consumer) = (service.clone(), consumer.clone());
            async move { consumer.consume(service.as_ref(), batch_size).await }
        },
    );

    let poll = PeriodicTask::new("outbox-poller", settings.poll_interval).spawn(
        shutdown.subscribe(),
        move || {
            let poller = poller.clone();
            async move { poller.tick().await }
        },
    );

    tracing::info!(%participant, "participant loops started");
    vec![consume, poll]
}
