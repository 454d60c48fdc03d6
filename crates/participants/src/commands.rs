//! Per-participant command tables.
//!
//! Each row maps a command to the entity change and the event to emit, once
//! for an accepted command and once for a rejected one.

use common::{CommandAction, EventAction, Participant};

use crate::entity::EntityStatus;
use crate::policy::Decision;

/// Entity change produced by a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Insert a new entity with `status`, then emit `event`.
    Create {
        status: EntityStatus,
        event: EventAction,
    },
    /// Move the saga's entity to `status`, then emit `event`.
    Update {
        status: EntityStatus,
        event: EventAction,
    },
}

impl Step {
    /// The event emitted by this step.
    pub fn event(&self) -> EventAction {
        match self {
            Step::Create { event, .. } | Step::Update { event, .. } => *event,
        }
    }
}

/// One command: what happens when it is accepted, and when it is rejected.
type Row = (CommandAction, Step, Step);

const fn create(status: EntityStatus, event: EventAction) -> Step {
    Step::Create { status, event }
}

const fn update(status: EntityStatus, event: EventAction) -> Step {
    Step::Update { status, event }
}

static ORDER: [Row; 3] = [
    (
        CommandAction::CreateOrder,
        create(EntityStatus::Pending, EventAction::OrderCreated),
        create(EntityStatus::Pending, EventAction::OrderCreated),
    ),
    (
        CommandAction::ApproveOrder,
        update(EntityStatus::Approved, EventAction::OrderApproved),
        update(EntityStatus::Rejected, EventAction::OrderRejected),
    ),
    (
        CommandAction::CancelOrder,
        update(EntityStatus::Cancelled, EventAction::OrderCancelled),
        update(EntityStatus::Cancelled, EventAction::OrderCancelled),
    ),
];

static PAYMENT: [Row; 2] = [
    (
        CommandAction::CreatePayment,
        create(EntityStatus::Pending, EventAction::PaymentCreated),
        create(EntityStatus::Rejected, EventAction::PaymentRejected),
    ),
    (
        CommandAction::CancelPayment,
        update(EntityStatus::Refunded, EventAction::PaymentCancelled),
        update(EntityStatus::Refunded, EventAction::PaymentCancelled),
    ),
];

static DELIVERY: [Row; 2] = [
    (
        CommandAction::CreateDelivery,
        create(EntityStatus::Pending, EventAction::DeliveryCreated),
        create(EntityStatus::Failed, EventAction::DeliveryFailed),
    ),
    (
        CommandAction::CancelDelivery,
        update(EntityStatus::Cancelled, EventAction::DeliveryCancelled),
        update(EntityStatus::Cancelled, EventAction::DeliveryCancelled),
    ),
];

fn table(participant: Participant) -> &'static [Row] {
    match participant {
        Participant::Order => &ORDER,
        Participant::Payment => &PAYMENT,
        Participant::Delivery => &DELIVERY,
    }
}

/// Looks up the step `participant` takes for `action` under `decision`.
///
/// Returns `None` when the command is not in the participant's table.
pub fn step(participant: Participant, action: CommandAction, decision: Decision) -> Option<Step> {
    table(participant)
        .iter()
        .find(|(command, _, _)| *command == action)
        .map(|(_, accepted, rejected)| match decision {
            Decision::Accept => *accepted,
            Decision::Reject => *rejected,
        })
}
