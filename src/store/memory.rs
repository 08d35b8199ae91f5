//! In-memory `OrderStore` used by the service tests. Reproduces the guarded
//! conditional-update semantics of the Postgres store under a mutex.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::order::{ExchangeRequest, Order, OrderPatch, ReturnRequest, StatusGuard};
use crate::domain::status::{ExchangeStatus, RefundMethod, RefundStatus, ReturnStatus};
use crate::error::{CommerceError, Result};
use crate::store::{OrderStore, PaymentUpdate};

#[derive(Default)]
pub struct MemoryStore {
    orders: Mutex<HashMap<Uuid, Order>>,
    returns: Mutex<Vec<ReturnRequest>>,
    exchanges: Mutex<Vec<ExchangeRequest>>,
    promo_usages: Mutex<Vec<(String, Uuid, Uuid)>>,
}

impl MemoryStore {
    pub fn with_order(order: Order) -> Self {
        let store = Self::default();
        store.orders.lock().unwrap().insert(order.id, order);
        store
    }

    pub fn promo_usage_count(&self, order_id: Uuid) -> usize {
        self.promo_usages
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, _, o)| *o == order_id)
            .count()
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn order_by_id(&self, id: Uuid) -> Result<Option<Order>> {
        Ok(self.orders.lock().unwrap().get(&id).cloned())
    }

    async fn order_by_gateway_order_id(&self, gateway_order_id: &str) -> Result<Option<Order>> {
        Ok(self
            .orders
            .lock()
            .unwrap()
            .values()
            .find(|o| o.gateway_order_id.as_deref() == Some(gateway_order_id))
            .cloned())
    }

    async fn order_by_gateway_payment_id(
        &self,
        gateway_payment_id: &str,
    ) -> Result<Option<Order>> {
        Ok(self
            .orders
            .lock()
            .unwrap()
            .values()
            .find(|o| o.gateway_payment_id.as_deref() == Some(gateway_payment_id))
            .cloned())
    }

    async fn apply_transition(
        &self,
        order_id: Uuid,
        guard: StatusGuard,
        patch: &OrderPatch,
    ) -> Result<Order> {
        let mut orders = self.orders.lock().unwrap();
        let order = orders
            .get_mut(&order_id)
            .ok_or(CommerceError::NotFound("Order"))?;

        let guard_holds = match guard {
            StatusGuard::Fulfillment(s) => order.status == s,
            StatusGuard::Return(s) => order.return_status == s,
            StatusGuard::Exchange(s) => order.exchange_status == s,
        };
        if !guard_holds {
            return Err(CommerceError::Conflict);
        }

        patch.apply_to(order, Utc::now());

        if let Some(status) = patch.return_status {
            for req in self.returns.lock().unwrap().iter_mut() {
                if req.order_id == order_id && req.status != ReturnStatus::Rejected {
                    req.status = status;
                }
            }
        }
        if let Some(status) = patch.exchange_status {
            for req in self.exchanges.lock().unwrap().iter_mut() {
                if req.order_id == order_id && req.status != ExchangeStatus::Rejected {
                    req.status = status;
                }
            }
        }

        Ok(order.clone())
    }

    async fn apply_payment_update(&self, order_id: Uuid, update: &PaymentUpdate) -> Result<Order> {
        let mut orders = self.orders.lock().unwrap();
        let order = orders
            .get_mut(&order_id)
            .ok_or(CommerceError::NotFound("Order"))?;

        if let Some(v) = &update.gateway_order_id {
            order.gateway_order_id = Some(v.clone());
        }
        if let Some(v) = &update.gateway_payment_id {
            order.gateway_payment_id = Some(v.clone());
        }
        order.payment_status = update.payment_status;
        order.payment_method = update.payment_method;
        if update.confirm_if_pending && order.status == crate::domain::status::OrderStatus::Pending
        {
            order.status = crate::domain::status::OrderStatus::Confirmed;
        }
        order.updated_at = Utc::now();
        Ok(order.clone())
    }

    async fn apply_refund_update(
        &self,
        order_id: Uuid,
        status: RefundStatus,
        amount: Option<Decimal>,
    ) -> Result<Order> {
        let mut orders = self.orders.lock().unwrap();
        let order = orders
            .get_mut(&order_id)
            .ok_or(CommerceError::NotFound("Order"))?;
        order.refund_method = Some(RefundMethod::OriginalSource);
        order.refund_status = status;
        if amount.is_some() {
            order.refund_amount = amount;
        }
        order.updated_at = Utc::now();
        Ok(order.clone())
    }

    async fn record_promo_usage(&self, code: &str, user_id: Uuid, order_id: Uuid) -> Result<()> {
        let mut usages = self.promo_usages.lock().unwrap();
        if !usages.iter().any(|(_, _, o)| *o == order_id) {
            usages.push((code.to_string(), user_id, order_id));
        }
        Ok(())
    }

    async fn create_return(&self, order: &Order, reason: &str) -> Result<ReturnRequest> {
        let mut orders = self.orders.lock().unwrap();
        let stored = orders
            .get_mut(&order.id)
            .ok_or(CommerceError::NotFound("Order"))?;
        if stored.return_status != order.return_status {
            return Err(CommerceError::Conflict);
        }
        stored.return_status = ReturnStatus::Requested;
        stored.updated_at = Utc::now();

        let request = ReturnRequest {
            id: Uuid::new_v4(),
            order_id: order.id,
            user_id: order.user_id,
            reason: reason.to_string(),
            status: ReturnStatus::Requested,
            created_at: Utc::now(),
        };
        self.returns.lock().unwrap().push(request.clone());
        Ok(request)
    }

    async fn create_exchange(
        &self,
        order: &Order,
        reason: &str,
        new_size: &str,
        new_color: &str,
    ) -> Result<ExchangeRequest> {
        let mut orders = self.orders.lock().unwrap();
        let stored = orders
            .get_mut(&order.id)
            .ok_or(CommerceError::NotFound("Order"))?;
        if stored.exchange_status != order.exchange_status {
            return Err(CommerceError::Conflict);
        }
        stored.exchange_status = ExchangeStatus::Requested;
        stored.updated_at = Utc::now();

        let request = ExchangeRequest {
            id: Uuid::new_v4(),
            order_id: order.id,
            user_id: order.user_id,
            reason: reason.to_string(),
            new_size: new_size.to_string(),
            new_color: new_color.to_string(),
            status: ExchangeStatus::Requested,
            created_at: Utc::now(),
        };
        self.exchanges.lock().unwrap().push(request.clone());
        Ok(request)
    }

    async fn active_return(&self, order_id: Uuid, user_id: Uuid) -> Result<Option<ReturnRequest>> {
        Ok(self
            .returns
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.order_id == order_id && r.user_id == user_id && r.status.is_active())
            .cloned())
    }

    async fn active_exchange(
        &self,
        order_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<ExchangeRequest>> {
        Ok(self
            .exchanges
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.order_id == order_id && r.user_id == user_id && r.status.is_active())
            .cloned())
    }

    async fn return_by_id(&self, id: Uuid) -> Result<Option<ReturnRequest>> {
        Ok(self
            .returns
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.id == id)
            .cloned())
    }

    async fn exchange_by_id(&self, id: Uuid) -> Result<Option<ExchangeRequest>> {
        Ok(self
            .exchanges
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.id == id)
            .cloned())
    }

    async fn returns_for_user(&self, user_id: Uuid) -> Result<Vec<ReturnRequest>> {
        let mut items: Vec<_> = self
            .returns
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(items)
    }

    async fn exchanges_for_user(&self, user_id: Uuid) -> Result<Vec<ExchangeRequest>> {
        let mut items: Vec<_> = self
            .exchanges
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(items)
    }
}
