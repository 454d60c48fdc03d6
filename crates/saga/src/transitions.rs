//! Create-order saga transition table.
//!
//! Forward path: ORDER_CREATED → CREATE_PAYMENT → CREATE_DELIVERY →
//! APPROVE_ORDER → ORDER_APPROVED ends the saga. Any rejection or failure
//! walks the completed steps back until ORDER_CANCELLED ends it.

use common::{CommandAction, EventAction};

/// The saga name stored on every saga row.
pub const SAGA_NAME: &str = "CREATE_ORDER_SAGA";

/// What the coordinator does in response to an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Create the saga, then issue the command.
    Start(CommandAction),
    /// Issue the command on an existing saga.
    Issue(CommandAction),
    /// Record the event and end the saga.
    Terminate,
}

impl Transition {
    /// The command issued by this transition, if any.
    pub fn command(&self) -> Option<CommandAction> {
        match self {
            Transition::Start(action) | Transition::Issue(action) => Some(*action),
            Transition::Terminate => None,
        }
    }
}

static TRANSITIONS: [(EventAction, Transition); 11] = [
    // forward
    (
        EventAction::OrderCreated,
        Transition::Start(CommandAction::CreatePayment),
    ),
    (
        EventAction::PaymentCreated,
        Transition::Issue(CommandAction::CreateDelivery),
    ),
    (
        EventAction::DeliveryCreated,
        Transition::Issue(CommandAction::ApproveOrder),
    ),
    (EventAction::OrderApproved, Transition::Terminate),
    // compensation
    (
        EventAction::OrderRejected,
        Transition::Issue(CommandAction::CancelDelivery),
    ),
    (
        EventAction::DeliveryCancelled,
        Transition::Issue(CommandAction::CancelPayment),
    ),
    (
        EventAction::DeliveryFailed,
        Transition::Issue(CommandAction::CancelPayment),
    ),
    (
        EventAction::PaymentCancelled,
        Transition::Issue(CommandAction::CancelOrder),
    ),
    (
        EventAction::PaymentFailed,
        Transition::Issue(CommandAction::CancelOrder),
    ),
    (
        EventAction::PaymentRejected,
        Transition::Issue(CommandAction::CancelOrder),
    ),
    (EventAction::OrderCancelled, Transition::Terminate),
];

/// Looks up the transition for an event.
pub fn lookup(action: EventAction) -> Option<Transition> {
    TRANSITIONS
        .iter()
        .find(|(event, _)| *event == action)
        .map(|(_, transition)| *transition)
}
