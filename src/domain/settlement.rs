//! Settlement planning: given a validated transition, decide whether it
//! carries an external refund or a wallet credit, and build the order patch
//! that must commit together with it.
//!
//! Planning is pure. The caller performs the external call and applies the
//! patch; a plan is only produced when the whole transition can succeed, so a
//! missing payment reference rejects up front instead of leaving the order in
//! an undeterminable payment state.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::domain::order::{Order, OrderPatch};
use crate::domain::status::{
    ExchangeStatus, OrderStatus, PaymentMethod, PaymentStatus, RefundMethod, RefundStatus,
    ReturnStatus,
};
use crate::domain::transitions::validate;
use crate::error::{CommerceError, Result};

/// External side effect a transition carries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SettlementAction {
    /// Refund to the original payment source through the gateway.
    GatewayRefund { payment_ref: String, amount: Decimal },
    /// Credit the customer's store wallet.
    WalletCredit { amount: Decimal },
}

/// Validated transition plus everything needed to commit it.
#[derive(Clone, Debug)]
pub struct TransitionPlan {
    pub no_op: bool,
    pub patch: OrderPatch,
    pub settlement: Option<SettlementAction>,
}

impl TransitionPlan {
    fn no_op() -> Self {
        Self {
            no_op: true,
            patch: OrderPatch::default(),
            settlement: None,
        }
    }
}

/// Shipping details captured with the SHIPPED transition.
#[derive(Clone, Debug, Default)]
pub struct ShippingInfo {
    pub courier_name: Option<String>,
    pub tracking_id: Option<String>,
}

/// Full-total refund decision shared by the return, exchange and cancellation
/// legs. `refund_status != NONE` means a refund is already in flight and must
/// not be issued again.
fn refund_decision(order: &Order) -> Result<Option<(SettlementAction, OrderPatch)>> {
    if order.refund_status != RefundStatus::None {
        return Ok(None);
    }
    match (order.payment_method, order.payment_status) {
        (PaymentMethod::Prepaid, PaymentStatus::Paid) => {
            let payment_ref = order
                .gateway_payment_id
                .clone()
                .ok_or(CommerceError::MissingPaymentRef)?;
            let patch = OrderPatch {
                payment_status: Some(PaymentStatus::Refunded),
                refund_status: Some(RefundStatus::Initiated),
                refund_method: Some(RefundMethod::OriginalSource),
                refund_amount: Some(order.total),
                ..Default::default()
            };
            Ok(Some((
                SettlementAction::GatewayRefund {
                    payment_ref,
                    amount: order.total,
                },
                patch,
            )))
        }
        (PaymentMethod::Cod, _) => {
            let patch = OrderPatch {
                payment_status: Some(PaymentStatus::Refunded),
                refund_status: Some(RefundStatus::Completed),
                refund_method: Some(RefundMethod::Wallet),
                refund_amount: Some(order.total),
                ..Default::default()
            };
            Ok(Some((
                SettlementAction::WalletCredit {
                    amount: order.total,
                },
                patch,
            )))
        }
        // Prepaid but never captured: nothing to give back.
        (PaymentMethod::Prepaid, _) => Ok(None),
    }
}

fn merge(base: &mut OrderPatch, refund: OrderPatch) {
    base.payment_status = refund.payment_status;
    base.refund_status = refund.refund_status;
    base.refund_method = refund.refund_method;
    base.refund_amount = refund.refund_amount;
}

/// Plan a return-track transition. Reaching PICKUP_COMPLETED triggers the
/// refund decision table; a gateway refund advances the track straight to
/// REFUND_INITIATED, a wallet credit to REFUND_COMPLETED.
pub fn plan_return(order: &Order, requested: ReturnStatus) -> Result<TransitionPlan> {
    if validate(order.return_status, requested)?.is_noop() {
        return Ok(TransitionPlan::no_op());
    }

    let mut patch = OrderPatch {
        return_status: Some(requested),
        ..Default::default()
    };
    let mut settlement = None;

    match requested {
        ReturnStatus::PickupCompleted => {
            if let Some((action, refund_patch)) = refund_decision(order)? {
                patch.return_status = Some(match action {
                    SettlementAction::GatewayRefund { .. } => ReturnStatus::RefundInitiated,
                    SettlementAction::WalletCredit { .. } => ReturnStatus::RefundCompleted,
                });
                merge(&mut patch, refund_patch);
                settlement = Some(action);
            }
        }
        // Manual refund bookkeeping when the admin drives the tail end.
        ReturnStatus::RefundInitiated => {
            patch.refund_status = Some(RefundStatus::Initiated);
        }
        ReturnStatus::RefundCompleted => {
            patch.refund_status = Some(RefundStatus::Completed);
            patch.payment_status = Some(PaymentStatus::Refunded);
        }
        _ => {}
    }

    Ok(TransitionPlan {
        no_op: false,
        patch,
        settlement,
    })
}

/// Plan an exchange-track transition. The refund decision fires at
/// PICKUP_COMPLETED exactly as for returns, but the exchange track itself
/// advances normally; refund progress lives in the bookkeeping fields.
pub fn plan_exchange(order: &Order, requested: ExchangeStatus) -> Result<TransitionPlan> {
    if validate(order.exchange_status, requested)?.is_noop() {
        return Ok(TransitionPlan::no_op());
    }

    let mut patch = OrderPatch {
        exchange_status: Some(requested),
        ..Default::default()
    };
    let mut settlement = None;

    if requested == ExchangeStatus::PickupCompleted {
        if let Some((action, refund_patch)) = refund_decision(order)? {
            merge(&mut patch, refund_patch);
            settlement = Some(action);
        }
    }

    Ok(TransitionPlan {
        no_op: false,
        patch,
        settlement,
    })
}

/// Plan a fulfillment-track transition, stamping per-transition timestamps.
/// Cancelling from a pre-shipping state settles via the same decision table.
pub fn plan_fulfillment(
    order: &Order,
    requested: OrderStatus,
    shipping: ShippingInfo,
    now: DateTime<Utc>,
) -> Result<TransitionPlan> {
    if validate(order.status, requested)?.is_noop() {
        return Ok(TransitionPlan::no_op());
    }

    let mut patch = OrderPatch {
        status: Some(requested),
        ..Default::default()
    };
    let mut settlement = None;

    match requested {
        OrderStatus::Shipped => {
            patch.shipped_at = Some(now);
            patch.courier_name = shipping.courier_name;
            patch.tracking_id = shipping.tracking_id;
        }
        OrderStatus::Delivered => {
            patch.delivered_at = Some(now);
        }
        OrderStatus::Completed => {
            patch.completed_at = Some(now);
        }
        OrderStatus::Cancelled => {
            patch.cancelled_at = Some(now);
            if order.status.is_pre_shipping() {
                if let Some((action, refund_patch)) = refund_decision(order)? {
                    merge(&mut patch, refund_patch);
                    settlement = Some(action);
                }
            }
        }
        _ => {}
    }

    Ok(TransitionPlan {
        no_op: false,
        patch,
        settlement,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::testing::delivered_order;

    #[test]
    fn online_paid_return_refunds_to_source() {
        let mut order = delivered_order();
        order.return_status = ReturnStatus::PickupScheduled;
        let plan = plan_return(&order, ReturnStatus::PickupCompleted).unwrap();
        assert_eq!(
            plan.settlement,
            Some(SettlementAction::GatewayRefund {
                payment_ref: "pay_1".into(),
                amount: Decimal::new(1000, 0),
            })
        );
        assert_eq!(plan.patch.return_status, Some(ReturnStatus::RefundInitiated));
        assert_eq!(plan.patch.refund_status, Some(RefundStatus::Initiated));
        assert_eq!(plan.patch.refund_method, Some(RefundMethod::OriginalSource));
        assert_eq!(plan.patch.refund_amount, Some(Decimal::new(1000, 0)));
        assert_eq!(plan.patch.payment_status, Some(PaymentStatus::Refunded));
    }

    #[test]
    fn online_paid_without_payment_ref_rejects_whole_transition() {
        let mut order = delivered_order();
        order.return_status = ReturnStatus::Approved;
        order.gateway_payment_id = None;
        let err = plan_return(&order, ReturnStatus::PickupCompleted).unwrap_err();
        assert!(matches!(err, CommerceError::MissingPaymentRef));
    }

    #[test]
    fn cod_return_credits_wallet_and_completes() {
        let mut order = delivered_order();
        order.payment_method = PaymentMethod::Cod;
        order.payment_status = PaymentStatus::Pending;
        order.return_status = ReturnStatus::Approved;
        let plan = plan_return(&order, ReturnStatus::PickupCompleted).unwrap();
        assert_eq!(
            plan.settlement,
            Some(SettlementAction::WalletCredit {
                amount: Decimal::new(1000, 0),
            })
        );
        assert_eq!(plan.patch.return_status, Some(ReturnStatus::RefundCompleted));
        assert_eq!(plan.patch.refund_status, Some(RefundStatus::Completed));
        assert_eq!(plan.patch.refund_method, Some(RefundMethod::Wallet));
        assert_eq!(plan.patch.payment_status, Some(PaymentStatus::Refunded));
    }

    #[test]
    fn prepaid_unpaid_return_advances_without_refund() {
        let mut order = delivered_order();
        order.payment_status = PaymentStatus::Failed;
        order.return_status = ReturnStatus::PickupScheduled;
        let plan = plan_return(&order, ReturnStatus::PickupCompleted).unwrap();
        assert!(plan.settlement.is_none());
        assert_eq!(plan.patch.return_status, Some(ReturnStatus::PickupCompleted));
        assert_eq!(plan.patch.refund_status, None);
    }

    #[test]
    fn refund_in_flight_blocks_re_settlement() {
        let mut order = delivered_order();
        order.return_status = ReturnStatus::Approved;
        order.refund_status = RefundStatus::Initiated;
        let plan = plan_return(&order, ReturnStatus::PickupCompleted).unwrap();
        assert!(plan.settlement.is_none());
        assert_eq!(plan.patch.return_status, Some(ReturnStatus::PickupCompleted));
    }

    #[test]
    fn rejecting_a_return_settles_nothing() {
        let mut order = delivered_order();
        order.return_status = ReturnStatus::Requested;
        let plan = plan_return(&order, ReturnStatus::Rejected).unwrap();
        assert!(plan.settlement.is_none());
        assert_eq!(plan.patch.return_status, Some(ReturnStatus::Rejected));
        assert_eq!(plan.patch.refund_status, None);
    }

    #[test]
    fn exchange_pickup_refunds_but_keeps_track_position() {
        let mut order = delivered_order();
        order.exchange_status = ExchangeStatus::PickupScheduled;
        let plan = plan_exchange(&order, ExchangeStatus::PickupCompleted).unwrap();
        assert!(matches!(
            plan.settlement,
            Some(SettlementAction::GatewayRefund { .. })
        ));
        assert_eq!(plan.patch.exchange_status, Some(ExchangeStatus::PickupCompleted));
    }

    #[test]
    fn cancel_confirmed_paid_order_refunds_to_source() {
        let mut order = delivered_order();
        order.status = OrderStatus::Confirmed;
        let plan =
            plan_fulfillment(&order, OrderStatus::Cancelled, ShippingInfo::default(), Utc::now())
                .unwrap();
        assert!(matches!(
            plan.settlement,
            Some(SettlementAction::GatewayRefund { .. })
        ));
        assert_eq!(plan.patch.status, Some(OrderStatus::Cancelled));
        assert_eq!(plan.patch.payment_status, Some(PaymentStatus::Refunded));
        assert!(plan.patch.cancelled_at.is_some());
    }

    #[test]
    fn cancel_after_shipping_settles_nothing() {
        let mut order = delivered_order();
        order.status = OrderStatus::Shipped;
        let plan =
            plan_fulfillment(&order, OrderStatus::Cancelled, ShippingInfo::default(), Utc::now())
                .unwrap();
        assert!(plan.settlement.is_none());
        assert_eq!(plan.patch.status, Some(OrderStatus::Cancelled));
    }

    #[test]
    fn shipping_info_rides_with_the_shipped_transition() {
        let mut order = delivered_order();
        order.status = OrderStatus::Processing;
        let shipping = ShippingInfo {
            courier_name: Some("Bluedart".into()),
            tracking_id: Some("BD123".into()),
        };
        let plan = plan_fulfillment(&order, OrderStatus::Shipped, shipping, Utc::now()).unwrap();
        assert_eq!(plan.patch.courier_name.as_deref(), Some("Bluedart"));
        assert_eq!(plan.patch.tracking_id.as_deref(), Some("BD123"));
        assert!(plan.patch.shipped_at.is_some());
    }

    #[test]
    fn resubmitting_current_status_is_a_noop_plan() {
        let mut order = delivered_order();
        order.return_status = ReturnStatus::Approved;
        let plan = plan_return(&order, ReturnStatus::Approved).unwrap();
        assert!(plan.no_op);
        assert!(plan.patch.is_empty());
        assert!(plan.settlement.is_none());
    }
}
