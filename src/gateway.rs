//! External settlement collaborators: the payment gateway's refund API and
//! the store wallet ledger. Both sit behind traits so the service logic is
//! testable without network or database access.

use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::{CommerceError, Result};

/// Receipt for an accepted refund. The gateway finishes asynchronously and
/// reports completion through webhooks.
#[derive(Clone, Debug)]
pub struct RefundReceipt {
    pub refund_ref: String,
}

/// Refund issuance against the original payment source. Not idempotent:
/// callers must check `refund_status` before issuing.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn refund(&self, payment_ref: &str, amount: Decimal) -> Result<RefundReceipt>;
}

/// Store-credit ledger used for COD settlements.
#[async_trait]
pub trait Wallet: Send + Sync {
    async fn credit(&self, user_id: Uuid, order_id: Uuid, amount: Decimal) -> Result<()>;
}

/// Razorpay REST client. Amounts are rupees in our model and paise on the
/// wire.
#[derive(Clone)]
pub struct RazorpayClient {
    http: reqwest::Client,
    base_url: String,
    key_id: String,
    key_secret: String,
}

impl RazorpayClient {
    pub fn new(base_url: String, key_id: String, key_secret: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
            key_id,
            key_secret,
        }
    }
}

#[derive(serde::Deserialize)]
struct RazorpayRefundResponse {
    id: String,
}

#[async_trait]
impl PaymentGateway for RazorpayClient {
    async fn refund(&self, payment_ref: &str, amount: Decimal) -> Result<RefundReceipt> {
        let paise = (amount * Decimal::from(100))
            .round()
            .to_i64()
            .ok_or_else(|| CommerceError::Internal(format!("unrepresentable amount: {amount}")))?;

        let url = format!("{}/payments/{}/refund", self.base_url, payment_ref);
        let response = self
            .http
            .post(&url)
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&serde_json::json!({ "amount": paise }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(%payment_ref, %status, "gateway refund rejected");
            return Err(CommerceError::RefundFailed(format!(
                "gateway returned {status}: {body}"
            )));
        }

        let refund: RazorpayRefundResponse = response.json().await?;
        tracing::info!(%payment_ref, refund_ref = %refund.id, "gateway refund accepted");
        Ok(RefundReceipt {
            refund_ref: refund.id,
        })
    }
}

/// Wallet backed by an append-only `wallet_transactions` table.
#[derive(Clone)]
pub struct PgWallet {
    pool: sqlx::PgPool,
}

impl PgWallet {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Wallet for PgWallet {
    async fn credit(&self, user_id: Uuid, order_id: Uuid, amount: Decimal) -> Result<()> {
        sqlx::query(
            "INSERT INTO wallet_transactions (id, user_id, order_id, amount, kind, created_at) \
             VALUES ($1, $2, $3, $4, 'REFUND_CREDIT', NOW())",
        )
        .bind(Uuid::now_v7())
        .bind(user_id)
        .bind(order_id)
        .bind(amount)
        .execute(&self.pool)
        .await?;
        tracing::info!(%user_id, %order_id, %amount, "wallet credited");
        Ok(())
    }
}
