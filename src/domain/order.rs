//! Order aggregate view and the patch applied by lifecycle transitions.
//!
//! The persisted order row is the single source of truth for all lifecycle
//! fields; return/exchange request rows are append-only detail records whose
//! status mirrors the order's corresponding track.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::status::{
    ExchangeStatus, OrderStatus, PaymentMethod, PaymentStatus, RefundMethod, RefundStatus,
    ReturnStatus,
};

#[derive(Clone, Debug, Serialize)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub user_id: Uuid,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: PaymentMethod,
    pub gateway_order_id: Option<String>,
    pub gateway_payment_id: Option<String>,
    pub return_status: ReturnStatus,
    pub exchange_status: ExchangeStatus,
    pub refund_status: RefundStatus,
    pub refund_method: Option<RefundMethod>,
    pub refund_amount: Option<Decimal>,
    pub total: Decimal,
    pub promo_code: Option<String>,
    pub courier_name: Option<String>,
    pub tracking_id: Option<String>,
    pub return_eligible_till: Option<DateTime<Utc>>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Whether `user` may read this order. Admins see everything.
    pub fn owned_by(&self, user_id: Uuid) -> bool {
        self.user_id == user_id
    }

    /// Return window check: unset means no deadline.
    pub fn return_window_open(&self, now: DateTime<Utc>) -> bool {
        self.return_eligible_till.map_or(true, |till| till >= now)
    }
}

/// Field-level update produced by a validated transition. `None` leaves the
/// column untouched; settlement and timestamps ride along with the status
/// change so the whole patch commits atomically.
#[derive(Clone, Debug, Default)]
pub struct OrderPatch {
    pub status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub return_status: Option<ReturnStatus>,
    pub exchange_status: Option<ExchangeStatus>,
    pub refund_status: Option<RefundStatus>,
    pub refund_method: Option<RefundMethod>,
    pub refund_amount: Option<Decimal>,
    pub courier_name: Option<String>,
    pub tracking_id: Option<String>,
    pub return_eligible_till: Option<DateTime<Utc>>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl OrderPatch {
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.payment_status.is_none()
            && self.return_status.is_none()
            && self.exchange_status.is_none()
            && self.refund_status.is_none()
            && self.refund_method.is_none()
            && self.refund_amount.is_none()
            && self.courier_name.is_none()
            && self.tracking_id.is_none()
            && self.return_eligible_till.is_none()
            && self.shipped_at.is_none()
            && self.delivered_at.is_none()
            && self.cancelled_at.is_none()
            && self.completed_at.is_none()
    }

    /// In-memory application, used by the test store and by callers that need
    /// the post-commit view without a re-read.
    pub fn apply_to(&self, order: &mut Order, now: DateTime<Utc>) {
        if let Some(v) = self.status {
            order.status = v;
        }
        if let Some(v) = self.payment_status {
            order.payment_status = v;
        }
        if let Some(v) = self.return_status {
            order.return_status = v;
        }
        if let Some(v) = self.exchange_status {
            order.exchange_status = v;
        }
        if let Some(v) = self.refund_status {
            order.refund_status = v;
        }
        if let Some(v) = self.refund_method {
            order.refund_method = Some(v);
        }
        if let Some(v) = self.refund_amount {
            order.refund_amount = Some(v);
        }
        if let Some(v) = &self.courier_name {
            order.courier_name = Some(v.clone());
        }
        if let Some(v) = &self.tracking_id {
            order.tracking_id = Some(v.clone());
        }
        if let Some(v) = self.return_eligible_till {
            order.return_eligible_till = Some(v);
        }
        if let Some(v) = self.shipped_at {
            order.shipped_at = Some(v);
        }
        if let Some(v) = self.delivered_at {
            order.delivered_at = Some(v);
        }
        if let Some(v) = self.cancelled_at {
            order.cancelled_at = Some(v);
        }
        if let Some(v) = self.completed_at {
            order.completed_at = Some(v);
        }
        order.updated_at = now;
    }
}

/// Optimistic guard for a transition: the patch commits only if the guarded
/// column still holds the value observed when the transition was validated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusGuard {
    Fulfillment(OrderStatus),
    Return(ReturnStatus),
    Exchange(ExchangeStatus),
}

/// Customer-initiated return request; append-only audit record.
#[derive(Clone, Debug, Serialize)]
pub struct ReturnRequest {
    pub id: Uuid,
    pub order_id: Uuid,
    pub user_id: Uuid,
    pub reason: String,
    pub status: ReturnStatus,
    pub created_at: DateTime<Utc>,
}

/// Customer-initiated exchange request with the replacement variant.
#[derive(Clone, Debug, Serialize)]
pub struct ExchangeRequest {
    pub id: Uuid,
    pub order_id: Uuid,
    pub user_id: Uuid,
    pub reason: String,
    pub new_size: String,
    pub new_color: String,
    pub status: ExchangeStatus,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// A delivered, prepaid, paid order; the common starting point for
    /// post-purchase lifecycle tests.
    pub fn delivered_order() -> Order {
        let now = Utc::now();
        Order {
            id: Uuid::new_v4(),
            order_number: "ORD-00001001".into(),
            user_id: Uuid::new_v4(),
            status: OrderStatus::Delivered,
            payment_status: PaymentStatus::Paid,
            payment_method: PaymentMethod::Prepaid,
            gateway_order_id: Some("order_G1".into()),
            gateway_payment_id: Some("pay_1".into()),
            return_status: ReturnStatus::None,
            exchange_status: ExchangeStatus::None,
            refund_status: RefundStatus::None,
            refund_method: None,
            refund_amount: None,
            total: Decimal::new(1000, 0),
            promo_code: None,
            courier_name: None,
            tracking_id: None,
            return_eligible_till: None,
            shipped_at: Some(now),
            delivered_at: Some(now),
            cancelled_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}
