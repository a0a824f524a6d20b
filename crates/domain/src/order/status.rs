//! Who may move an order to which status.

use common::{Order, OrderStatus, Role, Session};

use super::OrderError;
use crate::error::DomainError;

/// Checks whether `session` may set `order` to `next`.
///
/// Admins follow the transition table. Customers may only cancel their own
/// pending orders.
pub fn authorize_status_change(
    session: &Session,
    order: &Order,
    next: OrderStatus,
) -> Result<(), DomainError> {
    match *session {
        Session::Anonymous => Err(DomainError::Forbidden(
            "sign in to change an order".to_string(),
        )),
        Session::Authenticated {
            role: Role::Admin, ..
        } => {
            if order.status.can_transition_to(next) {
                Ok(())
            } else {
                Err(OrderError::InvalidStatusTransition {
                    from: order.status,
                    to: next,
                }
                .into())
            }
        }
        Session::Authenticated {
            user_id,
            role: Role::Customer,
        } => {
            if order.user_id != user_id {
                return Err(OrderError::NotOrderOwner(order.order_id).into());
            }
            if next != OrderStatus::Cancelled {
                return Err(DomainError::Forbidden(
                    "customers may only cancel orders".to_string(),
                ));
            }
            if !order.status.is_customer_cancellable() {
                return Err(OrderError::NotCancellable {
                    status: order.status,
                }
                .into());
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use common::{Money, OrderId, PaymentMethod, ShippingDetails, UserId};

    fn order(owner: UserId, status: OrderStatus) -> Order {
        let now = Utc::now();
        Order {
            order_id: OrderId::new(),
            user_id: owner,
            total_amount: Money::from_cents(100),
            shipping: ShippingDetails::default(),
            payment_method: PaymentMethod::CreditCard,
            proof: None,
            status,
            items: vec![],
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn admin_follows_transition_table() {
        let admin = Session::admin(UserId::new());
        let shipped = order(UserId::new(), OrderStatus::Shipped);

        assert!(authorize_status_change(&admin, &shipped, OrderStatus::Delivered).is_ok());
        assert!(authorize_status_change(&admin, &shipped, OrderStatus::Shipped).is_ok());

        let err = authorize_status_change(&admin, &shipped, OrderStatus::Cancelled).unwrap_err();
        assert!(matches!(
            err,
            DomainError::Order(OrderError::InvalidStatusTransition {
                from: OrderStatus::Shipped,
                to: OrderStatus::Cancelled
            })
        ));
    }

    #[test]
    fn admin_cannot_reopen_completed_order() {
        let admin = Session::admin(UserId::new());
        let done = order(UserId::new(), OrderStatus::Completed);
        assert!(authorize_status_change(&admin, &done, OrderStatus::Pending).is_err());
    }

    #[test]
    fn customer_cancels_own_pending_order() {
        let owner = UserId::new();
        let pending = order(owner, OrderStatus::Pending);
        assert!(
            authorize_status_change(&Session::customer(owner), &pending, OrderStatus::Cancelled)
                .is_ok()
        );
    }

    #[test]
    fn customer_cannot_cancel_someone_elses_order() {
        let pending = order(UserId::new(), OrderStatus::Pending);
        let err = authorize_status_change(
            &Session::customer(UserId::new()),
            &pending,
            OrderStatus::Cancelled,
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Order(OrderError::NotOrderOwner(_))));
    }

    #[test]
    fn customer_cannot_cancel_after_processing_starts() {
        let owner = UserId::new();
        let processing = order(owner, OrderStatus::Processing);
        let err =
            authorize_status_change(&Session::customer(owner), &processing, OrderStatus::Cancelled)
                .unwrap_err();
        assert!(matches!(
            err,
            DomainError::Order(OrderError::NotCancellable {
                status: OrderStatus::Processing
            })
        ));
    }

    #[test]
    fn customer_cannot_advance_status() {
        let owner = UserId::new();
        let pending = order(owner, OrderStatus::Pending);
        let err =
            authorize_status_change(&Session::customer(owner), &pending, OrderStatus::Processing)
                .unwrap_err();
        assert!(matches!(err, DomainError::Forbidden(_)));
    }

    #[test]
    fn anonymous_is_forbidden() {
        let pending = order(UserId::new(), OrderStatus::Pending);
        let err = authorize_status_change(&Session::Anonymous, &pending, OrderStatus::Cancelled)
            .unwrap_err();
        assert!(matches!(err, DomainError::Forbidden(_)));
    }
}
