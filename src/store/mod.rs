//! Persistence boundary for the order lifecycle.
//!
//! The order row is the single shared mutable resource; every transition goes
//! through a guarded conditional update so it is validated against the state
//! that actually commits, not a stale read. Request rows are written only as
//! a side effect of an order transition, inside the same transaction.

use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::order::{ExchangeRequest, Order, OrderPatch, ReturnRequest, StatusGuard};
use crate::domain::status::{PaymentMethod, PaymentStatus, RefundStatus};
use crate::error::Result;

pub mod postgres;

#[cfg(test)]
pub(crate) mod memory;

/// Payment-state advance driven by checkout verification or a gateway event.
/// Applied unconditionally to the payment fields; the fulfillment status only
/// moves PENDING -> CONFIRMED, atomically inside the update, so a replay or a
/// race with the synchronous path never regresses it.
#[derive(Clone, Debug)]
pub struct PaymentUpdate {
    pub gateway_order_id: Option<String>,
    pub gateway_payment_id: Option<String>,
    pub payment_status: PaymentStatus,
    pub payment_method: PaymentMethod,
    pub confirm_if_pending: bool,
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn order_by_id(&self, id: Uuid) -> Result<Option<Order>>;
    async fn order_by_gateway_order_id(&self, gateway_order_id: &str) -> Result<Option<Order>>;
    async fn order_by_gateway_payment_id(&self, gateway_payment_id: &str)
        -> Result<Option<Order>>;

    /// Commit `patch` iff the guarded status column still holds the observed
    /// value. Mirrors the new domain status onto non-rejected request rows in
    /// the same transaction. `Conflict` when the guard no longer matches.
    async fn apply_transition(
        &self,
        order_id: Uuid,
        guard: StatusGuard,
        patch: &OrderPatch,
    ) -> Result<Order>;

    async fn apply_payment_update(&self, order_id: Uuid, update: &PaymentUpdate) -> Result<Order>;

    /// Refund progress reported by the gateway (`refund.created/processed`).
    async fn apply_refund_update(
        &self,
        order_id: Uuid,
        status: RefundStatus,
        amount: Option<Decimal>,
    ) -> Result<Order>;

    /// At most one usage row per order; replays are no-ops.
    async fn record_promo_usage(&self, code: &str, user_id: Uuid, order_id: Uuid) -> Result<()>;

    /// Insert the request row and flip the order's return track to REQUESTED,
    /// both or neither.
    async fn create_return(&self, order: &Order, reason: &str) -> Result<ReturnRequest>;
    async fn create_exchange(
        &self,
        order: &Order,
        reason: &str,
        new_size: &str,
        new_color: &str,
    ) -> Result<ExchangeRequest>;

    async fn active_return(&self, order_id: Uuid, user_id: Uuid) -> Result<Option<ReturnRequest>>;
    async fn active_exchange(
        &self,
        order_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<ExchangeRequest>>;

    async fn return_by_id(&self, id: Uuid) -> Result<Option<ReturnRequest>>;
    async fn exchange_by_id(&self, id: Uuid) -> Result<Option<ExchangeRequest>>;

    async fn returns_for_user(&self, user_id: Uuid) -> Result<Vec<ReturnRequest>>;
    async fn exchanges_for_user(&self, user_id: Uuid) -> Result<Vec<ExchangeRequest>>;
}
