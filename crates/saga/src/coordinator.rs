//! Saga execution coordinator.
//!
//! The coordinator is the only consumer group on the reply stream. For each
//! participant event it looks up the transition, loads (or creates) the saga,
//! issues the next command to the target participant's command stream and
//! records what it did in the saga history. An event is acknowledged only
//! after all of that succeeded.

use async_trait::async_trait;
use channel::{Delivery, MessageHandler, Producer, RecordId, StreamBroker};
use common::{Command, CommandAction, Participant, ReplyEvent};

use crate::transitions::{self, SAGA_NAME, Transition};
use crate::{HistoryEntry, Result, SagaError, SagaStore};

/// Producers for the three participant command streams.
#[derive(Clone)]
pub struct CommandProducers<B> {
    order: Producer<B>,
    payment: Producer<B>,
    delivery: Producer<B>,
}

impl<B: StreamBroker + Clone> CommandProducers<B> {
    /// Creates producers for every participant's command stream on `broker`.
    pub fn new(broker: B) -> Self {
        Self {
            order: Producer::new(broker.clone(), Participant::Order.command_stream()),
            payment: Producer::new(broker.clone(), Participant::Payment.command_stream()),
            delivery: Producer::new(broker, Participant::Delivery.command_stream()),
        }
    }

    /// Sets the approximate length cap of every command stream.
    pub fn with_max_len(self, max_len: usize) -> Self {
        Self {
            order: self.order.with_max_len(max_len),
            payment: self.payment.with_max_len(max_len),
            delivery: self.delivery.with_max_len(max_len),
        }
    }
}

impl<B: StreamBroker> CommandProducers<B> {
    /// The producer for `participant`'s command stream.
    pub fn for_participant(&self, participant: Participant) -> &Producer<B> {
        match participant {
            Participant::Order => &self.order,
            Participant::Payment => &self.payment,
            Participant::Delivery => &self.delivery,
        }
    }

    /// Publishes a command on its target's stream.
    pub async fn send(&self, command: &Command) -> channel::Result<RecordId> {
        self.for_participant(command.target())
            .publish(&command.to_message())
            .await
    }
}

/// Coordinator behaviour switches.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Skip (and acknowledge) events already recorded in the saga history.
    pub deduplicate: bool,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self { deduplicate: true }
    }
}

/// What processing an event amounted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    /// A command was issued.
    CommandIssued {
        command: CommandAction,
        record_id: RecordId,
    },
    /// The saga was terminated.
    Terminated,
    /// The event was already recorded and was skipped.
    Duplicate,
}

/// Drives create-order sagas from participant events.
pub struct SagaExecutionCoordinator<S, B>
where
    S: SagaStore,
    B: StreamBroker,
{
    store: S,
    producers: CommandProducers<B>,
    config: CoordinatorConfig,
}

impl<S, B> SagaExecutionCoordinator<S, B>
where
    S: SagaStore,
    B: StreamBroker,
{
    /// Creates a coordinator with the default configuration.
    pub fn new(store: S, producers: CommandProducers<B>) -> Self {
        Self::with_config(store, producers, CoordinatorConfig::default())
    }

    /// Creates a coordinator with an explicit configuration.
    pub fn with_config(store: S, producers: CommandProducers<B>, config: CoordinatorConfig) -> Self {
        Self {
            store,
            producers,
            config,
        }
    }

    /// The saga store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Processes one event message from the reply stream.
    #[tracing::instrument(skip(self, delivery), fields(record_id = %delivery.id))]
    pub async fn process_event(&self, delivery: &Delivery) -> Result<EventOutcome> {
        let event = ReplyEvent::from_message(&delivery.message)?;
        let transition =
            transitions::lookup(event.action).ok_or(SagaError::NoTransition(event.action))?;
        let correlation_id = event
            .correlation_id()
            .ok_or(SagaError::MissingCorrelationId(event.action))?;

        tracing::debug!(action = %event.action, %correlation_id, "processing event");
        metrics::counter!("saga_events_processed_total", "action" => event.action.as_str())
            .increment(1);

        let saga = match transition {
            Transition::Start(_) => {
                let saga = self.store.create(correlation_id, SAGA_NAME).await?;
                if saga.history.is_empty() {
                    metrics::counter!("saga_started_total").increment(1);
                    tracing::info!(%correlation_id, "saga started");
                }
                saga
            }
            Transition::Issue(_) | Transition::Terminate => self
                .store
                .find_by_correlation_id(correlation_id)
                .await?
                .ok_or(SagaError::SagaNotFound(correlation_id))?,
        };

        if self.config.deduplicate
            && let Some(key) = event.key()
            && saga.has_seen(&key)
        {
            if transition == Transition::Terminate && !saga.status().is_terminal() {
                self.store.terminate(correlation_id).await?;
                tracing::warn!(%correlation_id, event = %key, "terminal event already recorded, saga terminated");
            }
            metrics::counter!("saga_duplicate_events_total").increment(1);
            tracing::info!(%correlation_id, event = %key, "duplicate event skipped");
            return Ok(EventOutcome::Duplicate);
        }

        if saga.status().is_terminal() {
            return Err(SagaError::SagaTerminated(correlation_id));
        }

        let (command, record_id) = match transition.command() {
            Some(action) => {
                let command = Command::for_saga(action, correlation_id, &event.data);
                let record_id = self.producers.send(&command).await?;
                tracing::info!(%correlation_id, command = %action, %record_id, "command issued");
                (Some(command), Some(record_id))
            }
            None => (None, None),
        };

        let entry = HistoryEntry {
            event: delivery.message.clone(),
            command: command.clone(),
            stream_id: record_id.as_ref().map(|id| id.to_string()),
        };

        match (command, record_id) {
            (Some(command), Some(record_id)) => {
                self.store.append_history(correlation_id, &entry).await?;
                Ok(EventOutcome::CommandIssued {
                    command: command.action,
                    record_id,
                })
            }
            _ => {
                self.store.complete(correlation_id, &entry).await?;
                metrics::counter!("saga_terminated_total", "action" => event.action.as_str())
                    .increment(1);
                tracing::info!(%correlation_id, action = %event.action, "saga terminated");
                Ok(EventOutcome::Terminated)
            }
        }
    }
}

#[async_trait]
impl<S, B> MessageHandler for SagaExecutionCoordinator<S, B>
where
    S: SagaStore,
    B: StreamBroker,
{
    type Error = SagaError;

    async fn handle(&self, delivery: &Delivery) -> Result<()> {
        self.process_event(delivery).await.map(|_| ())
    }
}
