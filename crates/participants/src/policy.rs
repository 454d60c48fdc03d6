//! Accept/reject decisions standing in for participant business rules.

use common::Command;

/// Outcome of applying a policy to a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Accept,
    Reject,
}

/// Decides whether a participant accepts a command.
pub trait Policy: Send + Sync {
    fn decide(&self, command: &Command) -> Decision;
}

/// Accepts every command.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl Policy for AcceptAll {
    fn decide(&self, _command: &Command) -> Decision {
        Decision::Accept
    }
}

/// Rejects every command.
#[derive(Debug, Clone, Copy, Default)]
pub struct RejectAll;

impl Policy for RejectAll {
    fn decide(&self, _command: &Command) -> Decision {
        Decision::Reject
    }
}

/// Rejects the commands matching a predicate.
pub struct RejectWhen<F>(pub F);

impl<F> Policy for RejectWhen<F>
where
    F: Fn(&Command) -> bool + Send + Sync,
{
    fn decide(&self, command: &Command) -> Decision {
        if (self.0)(command) {
            Decision::Reject
        } else {
            Decision::Accept
        }
    }
}

impl<P: Policy + ?Sized> Policy for Box<P> {
    fn decide(&self, command: &Command) -> Decision {
        (**self).decide(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{CommandAction, Payload};
    use serde_json::json;

    fn command(name: &str) -> Command {
        let mut payload = Payload::new();
        payload.insert("name".to_string(), json!(name));
        Command::new(CommandAction::CreatePayment, payload)
    }

    #[test]
    fn test_reject_when_predicate_matches() {
        let policy = RejectWhen(|c: &Command| c.payload["name"] == json!("expensive"));
        assert_eq!(policy.decide(&command("expensive")), Decision::Reject);
        assert_eq!(policy.decide(&command("cheap")), Decision::Accept);
    }

    #[test]
    fn test_boxed_policy() {
        let policy: Box<dyn Policy> = Box::new(RejectAll);
        assert_eq!(policy.decide(&command("x")), Decision::Reject);
        assert_eq!(AcceptAll.decide(&command("x")), Decision::Accept);
    }
}
