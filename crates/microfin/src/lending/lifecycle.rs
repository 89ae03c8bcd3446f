//! Transition tables for the membership, application, and loan state machines.
//!
//! Every status change in the engine goes through [`Lifecycle::transition`], so the allowed
//! edges live in exactly one place per entity.

use std::fmt;

/// A guard violation naming the entity and both ends of the rejected edge.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{entity} is {from}; cannot move to {to}")]
pub struct InvalidTransition {
    pub entity: &'static str,
    pub from: &'static str,
    pub to: &'static str,
}

pub trait Lifecycle: Copy + Eq + fmt::Debug + 'static {
    /// Entity name used in error messages.
    const ENTITY: &'static str;

    /// Allowed `(from, to)` edges.
    const TRANSITIONS: &'static [(Self, Self)];

    fn label(self) -> &'static str;

    fn allows(self, next: Self) -> bool {
        Self::TRANSITIONS
            .iter()
            .any(|(from, to)| *from == self && *to == next)
    }

    fn is_terminal(self) -> bool {
        !Self::TRANSITIONS.iter().any(|(from, _)| *from == self)
    }

    fn transition(self, next: Self) -> Result<Self, InvalidTransition> {
        if self.allows(next) {
            Ok(next)
        } else {
            Err(InvalidTransition {
                entity: Self::ENTITY,
                from: self.label(),
                to: next.label(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lending::applications::ApplicationStatus;
    use crate::lending::loans::LoanStatus;
    use crate::lending::membership::MembershipStatus;

    #[test]
    fn membership_only_leaves_pending() {
        assert!(MembershipStatus::Pending.allows(MembershipStatus::Approved));
        assert!(MembershipStatus::Pending.allows(MembershipStatus::Rejected));
        assert!(MembershipStatus::Approved.is_terminal());
        let err = MembershipStatus::Rejected
            .transition(MembershipStatus::Approved)
            .expect_err("rejected is terminal");
        assert_eq!(err.from, "rejected");
        assert_eq!(err.to, "approved");
        assert_eq!(err.entity, "membership");
    }

    #[test]
    fn application_review_is_one_shot() {
        assert!(ApplicationStatus::UnderReview.allows(ApplicationStatus::Approved));
        assert!(ApplicationStatus::UnderReview.allows(ApplicationStatus::Rejected));
        assert!(!ApplicationStatus::Approved.allows(ApplicationStatus::Approved));
        assert!(ApplicationStatus::Rejected.is_terminal());
    }

    #[test]
    fn loans_never_move_backwards() {
        use LoanStatus::*;
        let forward = [
            (Pending, Approved),
            (Approved, Active),
            (Active, Closed),
            (Pending, Rejected),
            (Approved, Rejected),
        ];
        for (from, to) in forward {
            assert!(from.allows(to), "{from:?} -> {to:?} should be allowed");
        }

        let backward = [
            (Active, Approved),
            (Closed, Active),
            (Active, Rejected),
            (Rejected, Pending),
            (Approved, Pending),
            (Pending, Active),
        ];
        for (from, to) in backward {
            assert!(!from.allows(to), "{from:?} -> {to:?} should be refused");
        }
        assert!(Closed.is_terminal());
        assert!(Rejected.is_terminal());
    }

    #[test]
    fn error_message_names_both_states() {
        let err = LoanStatus::Closed
            .transition(LoanStatus::Active)
            .expect_err("closed is terminal");
        assert_eq!(err.to_string(), "loan is closed; cannot move to active");
    }
}
