//! Transition validation for the fulfillment, return and exchange tracks.
//!
//! Each track declares its adjacency as a `match` over the closed enum, so the
//! compiler guarantees every state has an entry. Re-submitting the current
//! status is an idempotent no-op; any other edge outside the adjacency set is
//! rejected with the `(current, requested)` pair.

use std::fmt::Display;

use crate::domain::status::{Domain, ExchangeStatus, OrderStatus, ReturnStatus};
use crate::error::{CommerceError, Result};

/// Outcome of a successful validation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    /// Requested status equals the current one; nothing to apply.
    NoOp,
    /// A real step along a declared edge.
    Step,
}

impl Transition {
    pub fn is_noop(&self) -> bool {
        matches!(self, Transition::NoOp)
    }
}

/// A status enumeration with a declared adjacency table.
pub trait Lifecycle: Copy + Eq + Display + 'static {
    const DOMAIN: Domain;

    /// States directly reachable from `self`. Empty for terminal states.
    fn next_allowed(self) -> &'static [Self];

    fn is_terminal(self) -> bool {
        self.next_allowed().is_empty()
    }
}

impl Lifecycle for OrderStatus {
    const DOMAIN: Domain = Domain::Fulfillment;

    fn next_allowed(self) -> &'static [Self] {
        use OrderStatus::*;
        match self {
            Pending => &[Confirmed, Cancelled],
            Confirmed => &[Processing, Shipped, Cancelled],
            Processing => &[Shipped, Cancelled],
            Shipped => &[Delivered, Cancelled],
            Delivered => &[Completed],
            Completed => &[],
            Cancelled => &[],
        }
    }
}

impl Lifecycle for ReturnStatus {
    const DOMAIN: Domain = Domain::Return;

    fn next_allowed(self) -> &'static [Self] {
        use ReturnStatus::*;
        match self {
            None => &[Requested],
            Requested => &[Approved, Rejected],
            Approved => &[PickupScheduled, PickupCompleted],
            PickupScheduled => &[PickupCompleted],
            PickupCompleted => &[RefundInitiated],
            RefundInitiated => &[RefundCompleted],
            RefundCompleted => &[],
            Rejected => &[],
        }
    }
}

impl Lifecycle for ExchangeStatus {
    const DOMAIN: Domain = Domain::Exchange;

    fn next_allowed(self) -> &'static [Self] {
        use ExchangeStatus::*;
        match self {
            None => &[Requested],
            Requested => &[Approved, Rejected],
            Approved => &[PickupScheduled, PickupCompleted],
            PickupScheduled => &[PickupCompleted],
            PickupCompleted => &[ExchangeProcessing],
            ExchangeProcessing => &[ExchangeCompleted],
            ExchangeCompleted => &[],
            Rejected => &[],
        }
    }
}

/// Pure validation: no side effects, total over the declared enumerations.
pub fn validate<S: Lifecycle>(current: S, requested: S) -> Result<Transition> {
    if current == requested {
        return Ok(Transition::NoOp);
    }
    if current.next_allowed().contains(&requested) {
        Ok(Transition::Step)
    } else {
        Err(CommerceError::TransitionRejected {
            domain: S::DOMAIN,
            current: current.to_string(),
            requested: requested.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORDER_STATES: &[OrderStatus] = &[
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Completed,
        OrderStatus::Cancelled,
    ];

    const RETURN_STATES: &[ReturnStatus] = &[
        ReturnStatus::None,
        ReturnStatus::Requested,
        ReturnStatus::Approved,
        ReturnStatus::PickupScheduled,
        ReturnStatus::PickupCompleted,
        ReturnStatus::RefundInitiated,
        ReturnStatus::RefundCompleted,
        ReturnStatus::Rejected,
    ];

    const EXCHANGE_STATES: &[ExchangeStatus] = &[
        ExchangeStatus::None,
        ExchangeStatus::Requested,
        ExchangeStatus::Approved,
        ExchangeStatus::PickupScheduled,
        ExchangeStatus::PickupCompleted,
        ExchangeStatus::ExchangeProcessing,
        ExchangeStatus::ExchangeCompleted,
        ExchangeStatus::Rejected,
    ];

    #[test]
    fn self_transition_is_always_a_noop() {
        for &s in ORDER_STATES {
            assert_eq!(validate(s, s).unwrap(), Transition::NoOp);
        }
        for &s in RETURN_STATES {
            assert_eq!(validate(s, s).unwrap(), Transition::NoOp);
        }
        for &s in EXCHANGE_STATES {
            assert_eq!(validate(s, s).unwrap(), Transition::NoOp);
        }
    }

    #[test]
    fn edges_outside_the_table_are_rejected() {
        for &current in RETURN_STATES {
            for &requested in RETURN_STATES {
                let allowed = current == requested || current.next_allowed().contains(&requested);
                assert_eq!(validate(current, requested).is_ok(), allowed, "{current} -> {requested}");
            }
        }
        for &current in ORDER_STATES {
            for &requested in ORDER_STATES {
                let allowed = current == requested || current.next_allowed().contains(&requested);
                assert_eq!(validate(current, requested).is_ok(), allowed, "{current} -> {requested}");
            }
        }
    }

    #[test]
    fn regression_to_a_past_status_is_rejected() {
        let err = validate(ReturnStatus::PickupCompleted, ReturnStatus::Approved).unwrap_err();
        match err {
            CommerceError::TransitionRejected { current, requested, .. } => {
                assert_eq!(current, "PICKUP_COMPLETED");
                assert_eq!(requested, "APPROVED");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn terminal_states_have_no_successors() {
        assert!(ReturnStatus::Rejected.is_terminal());
        assert!(ReturnStatus::RefundCompleted.is_terminal());
        assert!(ExchangeStatus::ExchangeCompleted.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(OrderStatus::Completed.is_terminal());
        assert!(!ReturnStatus::None.is_terminal());
    }

    #[test]
    fn approved_allows_skipping_pickup_scheduling() {
        assert_eq!(
            validate(ReturnStatus::Approved, ReturnStatus::PickupCompleted).unwrap(),
            Transition::Step
        );
        assert_eq!(
            validate(ExchangeStatus::Approved, ExchangeStatus::PickupCompleted).unwrap(),
            Transition::Step
        );
    }
}
