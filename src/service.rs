//! Order lifecycle orchestration: authorization, transition planning,
//! settlement execution and the guarded commit, in that order.
//!
//! Validation happens before any write, and the external refund call happens
//! before the guarded commit and outside any database transaction, so a
//! rejected transition leaves zero side effects and a slow gateway never
//! stalls other order operations.

use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::domain::order::{ExchangeRequest, Order, OrderPatch, ReturnRequest, StatusGuard};
use crate::domain::settlement::{
    plan_exchange, plan_fulfillment, plan_return, SettlementAction, ShippingInfo, TransitionPlan,
};
use crate::domain::status::{
    ExchangeStatus, OrderStatus, PaymentMethod, PaymentStatus, RefundStatus, ReturnStatus,
};
use crate::domain::timeline::{self, TimelineStep};
use crate::error::{CommerceError, Result};
use crate::gateway::{PaymentGateway, Wallet};
use crate::store::{OrderStore, PaymentUpdate};
use crate::webhook::{verify_checkout_signature, GatewayEvent};

/// Authenticated caller, resolved by the upstream identity layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    Customer,
    Admin,
}

#[derive(Clone, Copy, Debug)]
pub struct Actor {
    pub user_id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    fn require_admin(&self) -> Result<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(CommerceError::Unauthorized)
        }
    }
}

/// Checkout-callback verification payload.
#[derive(Clone, Debug)]
pub struct PaymentVerification {
    pub order_id: Uuid,
    pub gateway_order_id: String,
    pub gateway_payment_id: String,
    pub signature: String,
}

pub struct OrderService<S, G, W> {
    store: S,
    gateway: G,
    wallet: W,
    payment_key_secret: String,
    default_return_window_days: i64,
}

impl<S, G, W> OrderService<S, G, W>
where
    S: OrderStore,
    G: PaymentGateway,
    W: Wallet,
{
    pub fn new(
        store: S,
        gateway: G,
        wallet: W,
        payment_key_secret: String,
        default_return_window_days: i64,
    ) -> Self {
        Self {
            store,
            gateway,
            wallet,
            payment_key_secret,
            default_return_window_days,
        }
    }

    async fn load_order(&self, order_id: Uuid) -> Result<Order> {
        self.store
            .order_by_id(order_id)
            .await?
            .ok_or(CommerceError::NotFound("Order"))
    }

    pub async fn get_order(&self, actor: Actor, order_id: Uuid) -> Result<(Order, Vec<TimelineStep>)> {
        let order = self.load_order(order_id).await?;
        if !actor.is_admin() && !order.owned_by(actor.user_id) {
            return Err(CommerceError::Unauthorized);
        }
        let steps = timeline::project(&order);
        Ok((order, steps))
    }

    /// Execute the plan's external side effect, then commit the patch under
    /// the guard. A guard miss after a refund already went out is not a plain
    /// conflict: the money moved, so it is surfaced for manual reconciliation.
    async fn settle_and_commit(
        &self,
        order: &Order,
        guard: StatusGuard,
        plan: TransitionPlan,
    ) -> Result<Order> {
        if plan.no_op {
            return Ok(order.clone());
        }

        let settled = match &plan.settlement {
            Some(SettlementAction::GatewayRefund { payment_ref, amount }) => {
                let receipt = self.gateway.refund(payment_ref, *amount).await?;
                tracing::info!(
                    order_id = %order.id,
                    refund_ref = %receipt.refund_ref,
                    %amount,
                    "refund issued to original source"
                );
                true
            }
            Some(SettlementAction::WalletCredit { amount }) => {
                self.wallet.credit(order.user_id, order.id, *amount).await?;
                true
            }
            None => false,
        };

        match self.store.apply_transition(order.id, guard, &plan.patch).await {
            Ok(updated) => Ok(updated),
            Err(CommerceError::Conflict) if settled => Err(CommerceError::Internal(format!(
                "settlement executed for order {} but the status commit was beaten by a \
                 concurrent update; needs manual reconciliation",
                order.id
            ))),
            Err(err) => Err(err),
        }
    }

    pub async fn transition_fulfillment(
        &self,
        actor: Actor,
        order_id: Uuid,
        requested: &str,
        shipping: ShippingInfo,
    ) -> Result<Order> {
        actor.require_admin()?;
        let requested: OrderStatus = requested.parse()?;
        let order = self.load_order(order_id).await?;
        tracing::info!(%order_id, status = %requested, "admin fulfillment update");

        let plan = plan_fulfillment(&order, requested, shipping, Utc::now())?;
        self.settle_and_commit(&order, StatusGuard::Fulfillment(order.status), plan)
            .await
    }

    pub async fn transition_return(
        &self,
        actor: Actor,
        order_id: Uuid,
        requested: &str,
    ) -> Result<Order> {
        actor.require_admin()?;
        let requested: ReturnStatus = requested.parse()?;
        let order = self.load_order(order_id).await?;
        tracing::info!(%order_id, status = %requested, "admin return update");

        let plan = plan_return(&order, requested)?;
        self.settle_and_commit(&order, StatusGuard::Return(order.return_status), plan)
            .await
    }

    pub async fn transition_exchange(
        &self,
        actor: Actor,
        order_id: Uuid,
        requested: &str,
    ) -> Result<Order> {
        actor.require_admin()?;
        let requested: ExchangeStatus = requested.parse()?;
        let order = self.load_order(order_id).await?;
        tracing::info!(%order_id, status = %requested, "admin exchange update");

        let plan = plan_exchange(&order, requested)?;
        self.settle_and_commit(&order, StatusGuard::Exchange(order.exchange_status), plan)
            .await
    }

    /// Reopen or extend the return window: now + `days` (default when unset
    /// or non-positive).
    pub async fn extend_return_window(
        &self,
        actor: Actor,
        order_id: Uuid,
        days: Option<i64>,
    ) -> Result<Order> {
        actor.require_admin()?;
        let order = self.load_order(order_id).await?;
        let days = match days {
            Some(d) if d > 0 => d,
            _ => self.default_return_window_days,
        };
        let till = Utc::now() + Duration::days(days);
        let patch = OrderPatch {
            return_eligible_till: Some(till),
            ..Default::default()
        };
        tracing::info!(%order_id, %till, "return window extended");
        self.store
            .apply_transition(order_id, StatusGuard::Fulfillment(order.status), &patch)
            .await
    }

    /// Intake preconditions, first failure wins: ownership, DELIVERED, open
    /// window, no concurrently active request on either track.
    pub async fn create_return(
        &self,
        actor: Actor,
        order_id: Uuid,
        reason: &str,
    ) -> Result<ReturnRequest> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(CommerceError::Validation("Reason required".into()));
        }

        let order = self.load_order(order_id).await?;
        if !order.owned_by(actor.user_id) {
            return Err(CommerceError::Unauthorized);
        }
        if order.status != OrderStatus::Delivered {
            return Err(CommerceError::Validation(
                "Order not eligible for return".into(),
            ));
        }
        if !order.return_window_open(Utc::now()) {
            return Err(CommerceError::Validation("Return window expired".into()));
        }
        if order.exchange_status.is_active() {
            return Err(CommerceError::Validation(
                "An exchange is already in progress for this order".into(),
            ));
        }
        if order.return_status.is_active()
            || self.store.active_return(order_id, actor.user_id).await?.is_some()
        {
            return Err(CommerceError::Validation("Return already requested".into()));
        }

        let request = self.store.create_return(&order, reason).await?;
        tracing::info!(%order_id, user_id = %actor.user_id, request_id = %request.id, "return created");
        Ok(request)
    }

    pub async fn create_exchange(
        &self,
        actor: Actor,
        order_id: Uuid,
        reason: &str,
        new_size: &str,
        new_color: &str,
    ) -> Result<ExchangeRequest> {
        let reason = reason.trim();
        if reason.is_empty() || new_size.is_empty() || new_color.is_empty() {
            return Err(CommerceError::Validation("Missing required fields".into()));
        }

        let order = self.load_order(order_id).await?;
        if !order.owned_by(actor.user_id) {
            return Err(CommerceError::Unauthorized);
        }
        if order.status != OrderStatus::Delivered {
            return Err(CommerceError::Validation(
                "Order not eligible for exchange".into(),
            ));
        }
        if order.return_status.is_active() {
            return Err(CommerceError::Validation(
                "A return is already in progress for this order".into(),
            ));
        }
        if order.exchange_status.is_active()
            || self.store.active_exchange(order_id, actor.user_id).await?.is_some()
        {
            return Err(CommerceError::Validation(
                "Exchange already requested".into(),
            ));
        }

        let request = self
            .store
            .create_exchange(&order, reason, new_size, new_color)
            .await?;
        tracing::info!(%order_id, user_id = %actor.user_id, request_id = %request.id, "exchange created");
        Ok(request)
    }

    /// Approve or reject a return by its request id; resolves to the same
    /// order-level transition so the two records cannot drift.
    pub async fn resolve_return_request(
        &self,
        actor: Actor,
        request_id: Uuid,
        requested: &str,
    ) -> Result<ReturnRequest> {
        actor.require_admin()?;
        if !matches!(requested, "APPROVED" | "REJECTED") {
            return Err(CommerceError::Validation("Invalid status".into()));
        }
        let request = self
            .store
            .return_by_id(request_id)
            .await?
            .ok_or(CommerceError::NotFound("Return request"))?;
        self.transition_return(actor, request.order_id, requested)
            .await?;
        self.store
            .return_by_id(request_id)
            .await?
            .ok_or(CommerceError::NotFound("Return request"))
    }

    pub async fn resolve_exchange_request(
        &self,
        actor: Actor,
        request_id: Uuid,
        requested: &str,
    ) -> Result<ExchangeRequest> {
        actor.require_admin()?;
        if !matches!(requested, "APPROVED" | "REJECTED") {
            return Err(CommerceError::Validation("Invalid status".into()));
        }
        let request = self
            .store
            .exchange_by_id(request_id)
            .await?
            .ok_or(CommerceError::NotFound("Exchange request"))?;
        self.transition_exchange(actor, request.order_id, requested)
            .await?;
        self.store
            .exchange_by_id(request_id)
            .await?
            .ok_or(CommerceError::NotFound("Exchange request"))
    }

    pub async fn list_returns(&self, actor: Actor) -> Result<Vec<ReturnRequest>> {
        self.store.returns_for_user(actor.user_id).await
    }

    pub async fn list_exchanges(&self, actor: Actor) -> Result<Vec<ExchangeRequest>> {
        self.store.exchanges_for_user(actor.user_id).await
    }

    /// Synchronous checkout callback. Idempotent once the order is PAID.
    pub async fn verify_payment(
        &self,
        actor: Actor,
        verification: PaymentVerification,
    ) -> Result<(Order, bool)> {
        let order = self.load_order(verification.order_id).await?;
        if !order.owned_by(actor.user_id) {
            return Err(CommerceError::NotFound("Order"));
        }
        if let Some(known) = &order.gateway_order_id {
            if known != &verification.gateway_order_id {
                return Err(CommerceError::Validation("Order mismatch".into()));
            }
        }
        if order.payment_status == PaymentStatus::Paid {
            return Ok((order, true));
        }
        if !verify_checkout_signature(
            &self.payment_key_secret,
            &verification.gateway_order_id,
            &verification.gateway_payment_id,
            &verification.signature,
        ) {
            return Err(CommerceError::SignatureInvalid);
        }

        let update = PaymentUpdate {
            gateway_order_id: Some(verification.gateway_order_id),
            gateway_payment_id: Some(verification.gateway_payment_id),
            payment_status: PaymentStatus::Paid,
            payment_method: PaymentMethod::Prepaid,
            confirm_if_pending: true,
        };
        let updated = self.store.apply_payment_update(order.id, &update).await?;
        if let Some(code) = &updated.promo_code {
            self.store
                .record_promo_usage(code, updated.user_id, updated.id)
                .await?;
        }
        tracing::info!(order_id = %updated.id, "payment verified");
        Ok((updated, false))
    }

    /// Reconcile a signature-valid gateway event. Lookup misses and
    /// unrecognized events are acknowledged no-ops; the gateway may reference
    /// orders outside this system's visibility.
    pub async fn reconcile(&self, event: GatewayEvent) -> Result<()> {
        match event {
            GatewayEvent::PaymentCaptured {
                payment_id,
                gateway_order_id,
            } => {
                self.reconcile_payment(payment_id, gateway_order_id, PaymentStatus::Paid)
                    .await
            }
            GatewayEvent::PaymentFailed {
                payment_id,
                gateway_order_id,
            } => {
                self.reconcile_payment(payment_id, gateway_order_id, PaymentStatus::Failed)
                    .await
            }
            GatewayEvent::OrderPaid { gateway_order_id } => {
                self.reconcile_payment(None, gateway_order_id, PaymentStatus::Paid)
                    .await
            }
            GatewayEvent::RefundUpdate {
                completed,
                payment_id,
                gateway_order_id,
                amount,
            } => {
                let order = match payment_id {
                    Some(pid) => self.store.order_by_gateway_payment_id(&pid).await?,
                    None => None,
                };
                let order = match (order, gateway_order_id) {
                    (Some(order), _) => Some(order),
                    (None, Some(gid)) => self.store.order_by_gateway_order_id(&gid).await?,
                    (None, None) => None,
                };
                let Some(order) = order else {
                    return Ok(());
                };
                let status = if completed {
                    RefundStatus::Completed
                } else {
                    RefundStatus::Initiated
                };
                self.store.apply_refund_update(order.id, status, amount).await?;
                tracing::info!(order_id = %order.id, refund_status = %status, "refund reconciled");
                Ok(())
            }
            GatewayEvent::Ignored => Ok(()),
        }
    }

    async fn reconcile_payment(
        &self,
        payment_id: Option<String>,
        gateway_order_id: Option<String>,
        payment_status: PaymentStatus,
    ) -> Result<()> {
        let Some(gateway_order_id) = gateway_order_id else {
            return Ok(());
        };
        let Some(order) = self.store.order_by_gateway_order_id(&gateway_order_id).await? else {
            return Ok(());
        };

        let captured = payment_status == PaymentStatus::Paid;
        let update = PaymentUpdate {
            gateway_order_id: None,
            gateway_payment_id: payment_id,
            payment_status,
            payment_method: PaymentMethod::Prepaid,
            confirm_if_pending: captured,
        };
        let updated = self.store.apply_payment_update(order.id, &update).await?;
        tracing::info!(order_id = %updated.id, payment_status = %payment_status, "payment reconciled");

        if captured {
            if let Some(code) = &updated.promo_code {
                self.store
                    .record_promo_usage(code, updated.user_id, updated.id)
                    .await?;
            }
        }
        Ok(())
    }
}
