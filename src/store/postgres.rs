//! Postgres-backed order store.
//!
//! Status columns are TEXT on disk and parsed into the closed enums at this
//! boundary; a status this code never wrote is a storage fault, not client
//! input.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::order::{ExchangeRequest, Order, OrderPatch, ReturnRequest, StatusGuard};
use crate::domain::status::RefundStatus;
use crate::error::{CommerceError, Result};
use crate::store::{OrderStore, PaymentUpdate};

#[derive(Clone)]
pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    order_number: String,
    user_id: Uuid,
    status: String,
    payment_status: String,
    payment_method: String,
    gateway_order_id: Option<String>,
    gateway_payment_id: Option<String>,
    return_status: String,
    exchange_status: String,
    refund_status: String,
    refund_method: Option<String>,
    refund_amount: Option<Decimal>,
    total: Decimal,
    promo_code: Option<String>,
    courier_name: Option<String>,
    tracking_id: Option<String>,
    return_eligible_till: Option<DateTime<Utc>>,
    shipped_at: Option<DateTime<Utc>>,
    delivered_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn parse_stored<T>(value: &str) -> Result<T>
where
    T: FromStr<Err = CommerceError>,
{
    value
        .parse()
        .map_err(|_| CommerceError::Internal(format!("corrupt stored status: {value}")))
}

impl TryFrom<OrderRow> for Order {
    type Error = CommerceError;

    fn try_from(row: OrderRow) -> Result<Self> {
        Ok(Order {
            id: row.id,
            order_number: row.order_number,
            user_id: row.user_id,
            status: parse_stored(&row.status)?,
            payment_status: parse_stored(&row.payment_status)?,
            payment_method: parse_stored(&row.payment_method)?,
            gateway_order_id: row.gateway_order_id,
            gateway_payment_id: row.gateway_payment_id,
            return_status: parse_stored(&row.return_status)?,
            exchange_status: parse_stored(&row.exchange_status)?,
            refund_status: parse_stored(&row.refund_status)?,
            refund_method: row.refund_method.as_deref().map(parse_stored).transpose()?,
            refund_amount: row.refund_amount,
            total: row.total,
            promo_code: row.promo_code,
            courier_name: row.courier_name,
            tracking_id: row.tracking_id,
            return_eligible_till: row.return_eligible_till,
            shipped_at: row.shipped_at,
            delivered_at: row.delivered_at,
            cancelled_at: row.cancelled_at,
            completed_at: row.completed_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ReturnRow {
    id: Uuid,
    order_id: Uuid,
    user_id: Uuid,
    reason: String,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<ReturnRow> for ReturnRequest {
    type Error = CommerceError;

    fn try_from(row: ReturnRow) -> Result<Self> {
        Ok(ReturnRequest {
            id: row.id,
            order_id: row.order_id,
            user_id: row.user_id,
            reason: row.reason,
            status: parse_stored(&row.status)?,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ExchangeRow {
    id: Uuid,
    order_id: Uuid,
    user_id: Uuid,
    reason: String,
    new_size: String,
    new_color: String,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<ExchangeRow> for ExchangeRequest {
    type Error = CommerceError;

    fn try_from(row: ExchangeRow) -> Result<Self> {
        Ok(ExchangeRequest {
            id: row.id,
            order_id: row.order_id,
            user_id: row.user_id,
            reason: row.reason,
            new_size: row.new_size,
            new_color: row.new_color,
            status: parse_stored(&row.status)?,
            created_at: row.created_at,
        })
    }
}

const RETURN_ACTIVE: &str =
    "('REQUESTED','APPROVED','PICKUP_SCHEDULED','PICKUP_COMPLETED','REFUND_INITIATED')";
const EXCHANGE_ACTIVE: &str =
    "('REQUESTED','APPROVED','PICKUP_SCHEDULED','PICKUP_COMPLETED','EXCHANGE_PROCESSING')";

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn order_by_id(&self, id: Uuid) -> Result<Option<Order>> {
        sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Order::try_from)
            .transpose()
    }

    async fn order_by_gateway_order_id(&self, gateway_order_id: &str) -> Result<Option<Order>> {
        sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE gateway_order_id = $1")
            .bind(gateway_order_id)
            .fetch_optional(&self.pool)
            .await?
            .map(Order::try_from)
            .transpose()
    }

    async fn order_by_gateway_payment_id(
        &self,
        gateway_payment_id: &str,
    ) -> Result<Option<Order>> {
        sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE gateway_payment_id = $1")
            .bind(gateway_payment_id)
            .fetch_optional(&self.pool)
            .await?
            .map(Order::try_from)
            .transpose()
    }

    async fn apply_transition(
        &self,
        order_id: Uuid,
        guard: StatusGuard,
        patch: &OrderPatch,
    ) -> Result<Order> {
        let (guard_column, guard_value) = match guard {
            StatusGuard::Fulfillment(s) => ("status", s.as_str()),
            StatusGuard::Return(s) => ("return_status", s.as_str()),
            StatusGuard::Exchange(s) => ("exchange_status", s.as_str()),
        };

        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "UPDATE orders SET \
               status = COALESCE($3, status), \
               payment_status = COALESCE($4, payment_status), \
               return_status = COALESCE($5, return_status), \
               exchange_status = COALESCE($6, exchange_status), \
               refund_status = COALESCE($7, refund_status), \
               refund_method = COALESCE($8, refund_method), \
               refund_amount = COALESCE($9, refund_amount), \
               courier_name = COALESCE($10, courier_name), \
               tracking_id = COALESCE($11, tracking_id), \
               return_eligible_till = COALESCE($12, return_eligible_till), \
               shipped_at = COALESCE($13, shipped_at), \
               delivered_at = COALESCE($14, delivered_at), \
               cancelled_at = COALESCE($15, cancelled_at), \
               completed_at = COALESCE($16, completed_at), \
               updated_at = NOW() \
             WHERE id = $1 AND {guard_column} = $2 \
             RETURNING *"
        );

        let row = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(order_id)
            .bind(guard_value)
            .bind(patch.status.map(|s| s.as_str()))
            .bind(patch.payment_status.map(|s| s.as_str()))
            .bind(patch.return_status.map(|s| s.as_str()))
            .bind(patch.exchange_status.map(|s| s.as_str()))
            .bind(patch.refund_status.map(|s| s.as_str()))
            .bind(patch.refund_method.map(|s| s.as_str()))
            .bind(patch.refund_amount)
            .bind(patch.courier_name.as_deref())
            .bind(patch.tracking_id.as_deref())
            .bind(patch.return_eligible_till)
            .bind(patch.shipped_at)
            .bind(patch.delivered_at)
            .bind(patch.cancelled_at)
            .bind(patch.completed_at)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(row) = row else {
            // Guard missed: concurrent transition, or the order is gone.
            let exists: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM orders WHERE id = $1")
                .bind(order_id)
                .fetch_optional(&mut *tx)
                .await?;
            tx.rollback().await?;
            return Err(if exists.is_some() {
                CommerceError::Conflict
            } else {
                CommerceError::NotFound("Order")
            });
        };

        if let Some(return_status) = patch.return_status {
            sqlx::query(
                "UPDATE return_requests SET status = $2 \
                 WHERE order_id = $1 AND status <> 'REJECTED'",
            )
            .bind(order_id)
            .bind(return_status.as_str())
            .execute(&mut *tx)
            .await?;
        }
        if let Some(exchange_status) = patch.exchange_status {
            sqlx::query(
                "UPDATE exchange_requests SET status = $2 \
                 WHERE order_id = $1 AND status <> 'REJECTED'",
            )
            .bind(order_id)
            .bind(exchange_status.as_str())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        row.try_into()
    }

    async fn apply_payment_update(&self, order_id: Uuid, update: &PaymentUpdate) -> Result<Order> {
        let row = sqlx::query_as::<_, OrderRow>(
            "UPDATE orders SET \
               gateway_order_id = COALESCE($2, gateway_order_id), \
               gateway_payment_id = COALESCE($3, gateway_payment_id), \
               payment_status = $4, \
               payment_method = $5, \
               status = CASE WHEN $6 AND status = 'PENDING' THEN 'CONFIRMED' ELSE status END, \
               updated_at = NOW() \
             WHERE id = $1 \
             RETURNING *",
        )
        .bind(order_id)
        .bind(update.gateway_order_id.as_deref())
        .bind(update.gateway_payment_id.as_deref())
        .bind(update.payment_status.as_str())
        .bind(update.payment_method.as_str())
        .bind(update.confirm_if_pending)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(CommerceError::NotFound("Order"))?;
        row.try_into()
    }

    async fn apply_refund_update(
        &self,
        order_id: Uuid,
        status: RefundStatus,
        amount: Option<Decimal>,
    ) -> Result<Order> {
        let row = sqlx::query_as::<_, OrderRow>(
            "UPDATE orders SET \
               refund_method = 'ORIGINAL_SOURCE', \
               refund_status = $2, \
               refund_amount = COALESCE($3, refund_amount), \
               updated_at = NOW() \
             WHERE id = $1 \
             RETURNING *",
        )
        .bind(order_id)
        .bind(status.as_str())
        .bind(amount)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(CommerceError::NotFound("Order"))?;
        row.try_into()
    }

    async fn record_promo_usage(&self, code: &str, user_id: Uuid, order_id: Uuid) -> Result<()> {
        sqlx::query(
            "INSERT INTO promo_code_usages (id, code, user_id, order_id, created_at) \
             VALUES ($1, $2, $3, $4, NOW()) \
             ON CONFLICT (order_id) DO NOTHING",
        )
        .bind(Uuid::now_v7())
        .bind(code)
        .bind(user_id)
        .bind(order_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn create_return(&self, order: &Order, reason: &str) -> Result<ReturnRequest> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, ReturnRow>(
            "INSERT INTO return_requests (id, order_id, user_id, reason, status, created_at) \
             VALUES ($1, $2, $3, $4, 'REQUESTED', NOW()) \
             RETURNING *",
        )
        .bind(Uuid::now_v7())
        .bind(order.id)
        .bind(order.user_id)
        .bind(reason)
        .fetch_one(&mut *tx)
        .await?;

        let updated = sqlx::query(
            "UPDATE orders SET return_status = 'REQUESTED', updated_at = NOW() \
             WHERE id = $1 AND return_status = $2",
        )
        .bind(order.id)
        .bind(order.return_status.as_str())
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(CommerceError::Conflict);
        }

        tx.commit().await?;
        row.try_into()
    }

    async fn create_exchange(
        &self,
        order: &Order,
        reason: &str,
        new_size: &str,
        new_color: &str,
    ) -> Result<ExchangeRequest> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, ExchangeRow>(
            "INSERT INTO exchange_requests \
               (id, order_id, user_id, reason, new_size, new_color, status, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, 'REQUESTED', NOW()) \
             RETURNING *",
        )
        .bind(Uuid::now_v7())
        .bind(order.id)
        .bind(order.user_id)
        .bind(reason)
        .bind(new_size)
        .bind(new_color)
        .fetch_one(&mut *tx)
        .await?;

        let updated = sqlx::query(
            "UPDATE orders SET exchange_status = 'REQUESTED', updated_at = NOW() \
             WHERE id = $1 AND exchange_status = $2",
        )
        .bind(order.id)
        .bind(order.exchange_status.as_str())
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(CommerceError::Conflict);
        }

        tx.commit().await?;
        row.try_into()
    }

    async fn active_return(&self, order_id: Uuid, user_id: Uuid) -> Result<Option<ReturnRequest>> {
        let sql = format!(
            "SELECT * FROM return_requests \
             WHERE order_id = $1 AND user_id = $2 AND status IN {RETURN_ACTIVE} \
             LIMIT 1"
        );
        sqlx::query_as::<_, ReturnRow>(&sql)
            .bind(order_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .map(ReturnRequest::try_from)
            .transpose()
    }

    async fn active_exchange(
        &self,
        order_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<ExchangeRequest>> {
        let sql = format!(
            "SELECT * FROM exchange_requests \
             WHERE order_id = $1 AND user_id = $2 AND status IN {EXCHANGE_ACTIVE} \
             LIMIT 1"
        );
        sqlx::query_as::<_, ExchangeRow>(&sql)
            .bind(order_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .map(ExchangeRequest::try_from)
            .transpose()
    }

    async fn return_by_id(&self, id: Uuid) -> Result<Option<ReturnRequest>> {
        sqlx::query_as::<_, ReturnRow>("SELECT * FROM return_requests WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(ReturnRequest::try_from)
            .transpose()
    }

    async fn exchange_by_id(&self, id: Uuid) -> Result<Option<ExchangeRequest>> {
        sqlx::query_as::<_, ExchangeRow>("SELECT * FROM exchange_requests WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(ExchangeRequest::try_from)
            .transpose()
    }

    async fn returns_for_user(&self, user_id: Uuid) -> Result<Vec<ReturnRequest>> {
        sqlx::query_as::<_, ReturnRow>(
            "SELECT * FROM return_requests WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(ReturnRequest::try_from)
        .collect()
    }

    async fn exchanges_for_user(&self, user_id: Uuid) -> Result<Vec<ExchangeRequest>> {
        sqlx::query_as::<_, ExchangeRow>(
            "SELECT * FROM exchange_requests WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(ExchangeRequest::try_from)
        .collect()
    }
}
