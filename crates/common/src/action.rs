//! Command and event vocabulary shared by the coordinator and participants.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ContractError;

/// A service taking part in the order saga.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Participant {
    Order,
    Payment,
    Delivery,
}

impl Participant {
    /// All participants, in saga order.
    pub const ALL: [Participant; 3] = [
        Participant::Order,
        Participant::Payment,
        Participant::Delivery,
    ];

    /// Name used as the `object` of every event this participant emits.
    pub fn as_str(&self) -> &'static str {
        match self {
            Participant::Order => "order",
            Participant::Payment => "payment",
            Participant::Delivery => "delivery",
        }
    }

    /// Stream carrying this participant's inbound commands.
    pub fn command_stream(&self) -> &'static str {
        match self {
            Participant::Order => "order_stream",
            Participant::Payment => "payment_stream",
            Participant::Delivery => "delivery_stream",
        }
    }

    /// Consumer group reading [`Participant::command_stream`].
    pub fn consumer_group(&self) -> &'static str {
        match self {
            Participant::Order => "order_cg",
            Participant::Payment => "payment_cg",
            Participant::Delivery => "delivery_cg",
        }
    }
}

impl std::fmt::Display for Participant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Participant {
    type Err = ContractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "order" => Ok(Participant::Order),
            "payment" => Ok(Participant::Payment),
            "delivery" => Ok(Participant::Delivery),
            other => Err(ContractError::UnknownParticipant(other.to_string())),
        }
    }
}

/// Shared stream every participant publishes its events to.
pub const REPLY_STREAM: &str = "saga_reply_stream";

/// Consumer group of the saga execution coordinator on [`REPLY_STREAM`].
pub const REPLY_GROUP: &str = "saga_reply_cg";

/// Commands a participant can be asked to execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandAction {
    CreateOrder,
    CancelOrder,
    ApproveOrder,
    CreatePayment,
    CancelPayment,
    CreateDelivery,
    CancelDelivery,
}

impl CommandAction {
    /// Returns the wire name of the command.
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandAction::CreateOrder => "CREATE_ORDER",
            CommandAction::CancelOrder => "CANCEL_ORDER",
            CommandAction::ApproveOrder => "APPROVE_ORDER",
            CommandAction::CreatePayment => "CREATE_PAYMENT",
            CommandAction::CancelPayment => "CANCEL_PAYMENT",
            CommandAction::CreateDelivery => "CREATE_DELIVERY",
            CommandAction::CancelDelivery => "CANCEL_DELIVERY",
        }
    }

    /// The participant whose command stream carries this command.
    pub fn target(&self) -> Participant {
        match self {
            CommandAction::CreateOrder | CommandAction::CancelOrder | CommandAction::ApproveOrder => {
                Participant::Order
            }
            CommandAction::CreatePayment | CommandAction::CancelPayment => Participant::Payment,
            CommandAction::CreateDelivery | CommandAction::CancelDelivery => Participant::Delivery,
        }
    }
}

impl std::fmt::Display for CommandAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CommandAction {
    type Err = ContractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREATE_ORDER" => Ok(CommandAction::CreateOrder),
            "CANCEL_ORDER" => Ok(CommandAction::CancelOrder),
            "APPROVE_ORDER" => Ok(CommandAction::ApproveOrder),
            "CREATE_PAYMENT" => Ok(CommandAction::CreatePayment),
            "CANCEL_PAYMENT" => Ok(CommandAction::CancelPayment),
            "CREATE_DELIVERY" => Ok(CommandAction::CreateDelivery),
            "CANCEL_DELIVERY" => Ok(CommandAction::CancelDelivery),
            other => Err(ContractError::UnknownCommand(other.to_string())),
        }
    }
}

/// Events participants emit after executing (or refusing) a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventAction {
    OrderCreated,
    OrderApproved,
    OrderRejected,
    OrderCancelled,
    PaymentCreated,
    PaymentCancelled,
    PaymentRejected,
    PaymentFailed,
    DeliveryCreated,
    DeliveryCancelled,
    DeliveryFailed,
}

impl EventAction {
    /// Every event in the vocabulary.
    pub const ALL: [EventAction; 11] = [
        EventAction::OrderCreated,
        EventAction::OrderApproved,
        EventAction::OrderRejected,
        EventAction::OrderCancelled,
        EventAction::PaymentCreated,
        EventAction::PaymentCancelled,
        EventAction::PaymentRejected,
        EventAction::PaymentFailed,
        EventAction::DeliveryCreated,
        EventAction::DeliveryCancelled,
        EventAction::DeliveryFailed,
    ];

    /// Returns the wire name of the event.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventAction::OrderCreated => "ORDER_CREATED",
            EventAction::OrderApproved => "ORDER_APPROVED",
            EventAction::OrderRejected => "ORDER_REJECTED",
            EventAction::OrderCancelled => "ORDER_CANCELLED",
            EventAction::PaymentCreated => "PAYMENT_CREATED",
            EventAction::PaymentCancelled => "PAYMENT_CANCELLED",
            EventAction::PaymentRejected => "PAYMENT_REJECTED",
            EventAction::PaymentFailed => "PAYMENT_FAILED",
            EventAction::DeliveryCreated => "DELIVERY_CREATED",
            EventAction::DeliveryCancelled => "DELIVERY_CANCELLED",
            EventAction::DeliveryFailed => "DELIVERY_FAILED",
        }
    }

    /// The participant that emits this event.
    pub fn family(&self) -> Participant {
        match self {
            EventAction::OrderCreated
            | EventAction::OrderApproved
            | EventAction::OrderRejected
            | EventAction::OrderCancelled => Participant::Order,
            EventAction::PaymentCreated
            | EventAction::PaymentCancelled
            | EventAction::PaymentRejected
            | EventAction::PaymentFailed => Participant::Payment,
            EventAction::DeliveryCreated
            | EventAction::DeliveryCancelled
            | EventAction::DeliveryFailed => Participant::Delivery,
        }
    }
}

impl std::fmt::Display for EventAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EventAction {
    type Err = ContractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventAction::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| ContractError::UnknownEvent(s.to_string()))
    }
}
