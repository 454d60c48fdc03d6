//! Command execution for one participant.

use async_trait::async_trait;
use channel::{Delivery, MessageHandler};
use common::{Command, CommandAction, CorrelationId, Participant, Payload};
use outbox::OutboxEvent;
use serde_json::Value;

use crate::commands::{self, Step};
use crate::policy::{Decision, Policy};
use crate::{Entity, ParticipantError, ParticipantRepository, Result};

/// What executing a command amounted to.
#[derive(Debug, Clone, PartialEq)]
pub enum Execution {
    /// The change was written and its event recorded in the outbox.
    Recorded(OutboxEvent),
    /// The change was already in place, typically from an earlier delivery of
    /// the same command. Nothing was written.
    AlreadyApplied,
}

impl Execution {
    /// The recorded event, if any.
    pub fn into_event(self) -> Option<OutboxEvent> {
        match self {
            Execution::Recorded(event) => Some(event),
            Execution::AlreadyApplied => None,
        }
    }
}

/// Executes the commands addressed to one participant.
///
/// Consumes its participant's command stream; the resulting events land in
/// the repository's outbox and reach the coordinator through a poller.
pub struct ParticipantService<R, P> {
    repository: R,
    policy: P,
}

impl<R, P> ParticipantService<R, P>
where
    R: ParticipantRepository,
    P: Policy,
{
    /// Creates a service over `repository`, deciding commands with `policy`.
    pub fn new(repository: R, policy: P) -> Self {
        Self { repository, policy }
    }

    /// The participant this service acts for.
    pub fn participant(&self) -> Participant {
        self.repository.participant()
    }

    /// Gets a reference to the repository.
    pub fn repository(&self) -> &R {
        &self.repository
    }

    /// Creates an order, starting a new saga. Only valid on the order service.
    pub async fn create_order(&self, name: &str) -> Result<OutboxEvent> {
        let correlation_id = CorrelationId::new();
        let mut payload = Payload::new();
        payload.insert("name".to_string(), Value::String(name.to_string()));
        let command = Command::for_saga(CommandAction::CreateOrder, correlation_id, &payload);

        self.execute(&command)
            .await?
            .into_event()
            .ok_or(ParticipantError::AlreadyExists(correlation_id))
    }

    /// Executes `command`, writing the entity change and its event together.
    ///
    /// A command whose change is already in place writes nothing and reports
    /// [`Execution::AlreadyApplied`], so redelivered commands emit no second
    /// event.
    #[tracing::instrument(skip(self, command), fields(participant = %self.participant(), action = %command.action))]
    pub async fn execute(&self, command: &Command) -> Result<Execution> {
        let participant = self.participant();
        let decision = self.policy.decide(command);
        let step = commands::step(participant, command.action, decision).ok_or(
            ParticipantError::WrongParticipant {
                participant,
                command: command.action,
            },
        )?;

        let recorded = match step {
            Step::Create { status, event } => {
                let name = entity_name(command);
                let entity = match (participant, command.correlation_id()) {
                    (Participant::Order, cid) => {
                        let mut order = Entity::order(name, status);
                        if let Some(cid) = cid {
                            order.id = cid.as_uuid();
                        }
                        order
                    }
                    (_, Some(cid)) => Entity::for_order(cid, name, status),
                    (_, None) => return Err(ParticipantError::MissingCorrelationId(command.action)),
                };
                self.repository.create(&entity, event).await?
            }
            Step::Update { status, event } => {
                let cid = command
                    .correlation_id()
                    .ok_or(ParticipantError::MissingCorrelationId(command.action))?;
                self.repository
                    .update_status(cid, status, event)
                    .await?
                    .map(|(_, recorded)| recorded)
            }
        };

        let Some(event) = recorded else {
            metrics::counter!(
                "participant_commands_already_applied_total",
                "participant" => participant.as_str(),
                "action" => command.action.as_str()
            )
            .increment(1);
            tracing::info!("command already applied, nothing recorded");
            return Ok(Execution::AlreadyApplied);
        };

        let decision = match decision {
            Decision::Accept => "accept",
            Decision::Reject => "reject",
        };
        metrics::counter!(
            "participant_commands_total",
            "participant" => participant.as_str(),
            "action" => command.action.as_str(),
            "decision" => decision
        )
        .increment(1);
        tracing::info!(event_id = event.id, event = %event.action, "command executed");

        Ok(Execution::Recorded(event))
    }

    /// Looks up the entity of a saga.
    pub async fn find(&self, correlation_id: CorrelationId) -> Result<Option<Entity>> {
        self.repository.find_by_correlation_id(correlation_id).await
    }
}

fn entity_name(command: &Command) -> String {
    command
        .payload
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

#[async_trait]
impl<R, P> MessageHandler for ParticipantService<R, P>
where
    R: ParticipantRepository,
    P: Policy,
{
    type Error = ParticipantError;

    async fn handle(&self, delivery: &Delivery) -> Result<()> {
        let command = Command::from_message(&delivery.message)?;
        self.execute(&command).await.map(|_| ())
    }
}
