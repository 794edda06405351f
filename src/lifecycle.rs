// src/lifecycle.rs
//
// Order status transitions. Pending -> Processing -> Shipped -> Delivered,
// Cancelled reachable before shipping, Returned after delivery. Both are final.

use crate::errors::AppError;
use crate::models::OrderStatus;

impl OrderStatus {
    pub fn is_final(&self) -> bool {
        matches!(self, OrderStatus::Cancelled | OrderStatus::Returned)
    }

    /// Re-applying the current status is always allowed.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;

        if *self == next {
            return true;
        }
        matches!(
            (self, next),
            (Pending, Processing)
                | (Pending, Cancelled)
                | (Processing, Shipped)
                | (Processing, Delivered)
                | (Processing, Cancelled)
                | (Shipped, Delivered)
                | (Delivered, Returned)
        )
    }

    fn requires_payment(&self) -> bool {
        matches!(
            self,
            OrderStatus::Processing | OrderStatus::Shipped | OrderStatus::Delivered
        )
    }
}

/// The part of an order a transition depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderState {
    pub status: OrderStatus,
    pub is_paid: bool,
}

/// Status the order ends in after a payment is recorded.
pub fn after_payment(state: OrderState) -> Result<OrderStatus, AppError> {
    if state.status.is_final() {
        return Err(AppError::validation(format!(
            "Cannot pay for an order that is {}",
            state.status
        )));
    }
    Ok(match state.status {
        OrderStatus::Pending => OrderStatus::Processing,
        other => other,
    })
}

pub fn check_transition(state: OrderState, next: OrderStatus) -> Result<(), AppError> {
    if !state.status.can_transition_to(next) {
        return Err(AppError::validation(format!(
            "Cannot move order from {} to {}",
            state.status, next
        )));
    }
    if next.requires_payment() && !state.is_paid {
        return Err(AppError::validation(format!(
            "Order must be paid before it is {next}"
        )));
    }
    Ok(())
}

pub fn check_delivery(state: OrderState) -> Result<(), AppError> {
    check_transition(state, OrderStatus::Delivered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use OrderStatus::*;

    fn state(status: OrderStatus, is_paid: bool) -> OrderState {
        OrderState { status, is_paid }
    }

    #[test]
    fn forward_path_is_allowed() {
        assert!(Pending.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Shipped));
        assert!(Shipped.can_transition_to(Delivered));
        assert!(Delivered.can_transition_to(Returned));
    }

    #[test]
    fn final_states_absorb() {
        for next in [Pending, Processing, Shipped, Delivered] {
            assert!(!Cancelled.can_transition_to(next));
            assert!(!Returned.can_transition_to(next));
        }
        assert!(Cancelled.can_transition_to(Cancelled));
    }

    #[test]
    fn no_going_back() {
        assert!(!Shipped.can_transition_to(Processing));
        assert!(!Delivered.can_transition_to(Shipped));
        assert!(!Shipped.can_transition_to(Cancelled));
        assert!(!Pending.can_transition_to(Returned));
    }

    #[test]
    fn payment_moves_pending_to_processing() {
        assert_eq!(after_payment(state(Pending, false)).unwrap(), Processing);
        assert_eq!(after_payment(state(Shipped, true)).unwrap(), Shipped);
        assert!(after_payment(state(Cancelled, false)).is_err());
        assert!(after_payment(state(Returned, true)).is_err());
    }

    #[test]
    fn delivery_requires_payment() {
        assert!(check_delivery(state(Processing, false)).is_err());
        assert!(check_delivery(state(Processing, true)).is_ok());
        assert!(check_delivery(state(Shipped, true)).is_ok());
        assert!(check_delivery(state(Delivered, true)).is_ok());
        assert!(check_delivery(state(Pending, true)).is_err());
        assert!(check_delivery(state(Cancelled, true)).is_err());
    }

    #[test]
    fn cancel_does_not_need_payment() {
        assert!(check_transition(state(Pending, false), Cancelled).is_ok());
        assert!(check_transition(state(Processing, true), Cancelled).is_ok());
        assert!(check_transition(state(Pending, false), Processing).is_err());
    }
}
