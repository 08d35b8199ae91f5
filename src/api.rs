//! HTTP surface. Transport-only: handlers parse/validate the request shape
//! and delegate to the service; authorization and lifecycle rules live there.
//!
//! Identity arrives from the upstream auth layer as `x-user-id` /
//! `x-user-role` headers.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{FromRequestParts, Path, State};
use axum::http::request::Parts;
use axum::http::HeaderMap;
use axum::routing::{get, patch, post, put};
use axum::{async_trait, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;
use validator::Validate;

use crate::domain::settlement::ShippingInfo;
use crate::error::{CommerceError, Result};
use crate::gateway::{PgWallet, RazorpayClient};
use crate::service::{Actor, OrderService, PaymentVerification, Role};
use crate::store::postgres::PgOrderStore;
use crate::webhook;

pub type Service = OrderService<PgOrderStore, RazorpayClient, PgWallet>;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<Service>,
    pub webhook_secret: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = CommerceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        let user_id = parts
            .headers
            .get("x-user-id")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| Uuid::parse_str(v).ok())
            .ok_or(CommerceError::Unauthorized)?;
        let role = match parts.headers.get("x-user-role").and_then(|v| v.to_str().ok()) {
            Some("ADMIN") => Role::Admin,
            _ => Role::Customer,
        };
        Ok(Actor { user_id, role })
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/health",
            get(|| async { Json(json!({"status": "healthy", "service": "velour-commerce"})) }),
        )
        .route("/api/v1/orders/:id", get(get_order))
        .route("/api/v1/orders/:id/return", post(create_return))
        .route("/api/v1/orders/:id/exchange", post(create_exchange))
        .route("/api/v1/returns", get(list_returns))
        .route("/api/v1/exchanges", get(list_exchanges))
        .route("/api/v1/payments/verify", post(verify_payment))
        .route("/api/v1/admin/orders/:id/status", put(update_order_status))
        .route("/api/v1/admin/orders/:id/return-status", patch(update_return_status))
        .route("/api/v1/admin/orders/:id/exchange-status", patch(update_exchange_status))
        .route("/api/v1/admin/orders/:id/return-window", patch(extend_return_window))
        .route("/api/v1/admin/returns/:id", patch(resolve_return))
        .route("/api/v1/admin/exchanges/:id", patch(resolve_exchange))
        .route(
            "/api/v1/webhooks/razorpay",
            post(razorpay_webhook).get(|| async {
                Json(json!({"ok": true, "message": "Razorpay webhook is active"}))
            }),
        )
        .with_state(state)
}

async fn get_order(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>> {
    let (order, timeline) = state.service.get_order(actor, id).await?;
    Ok(Json(json!({ "order": order, "timeline": timeline })))
}

#[derive(Debug, Deserialize)]
struct OrderStatusBody {
    status: String,
    courier_name: Option<String>,
    tracking_id: Option<String>,
}

async fn update_order_status(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(body): Json<OrderStatusBody>,
) -> Result<Json<Value>> {
    let shipping = ShippingInfo {
        courier_name: body.courier_name,
        tracking_id: body.tracking_id,
    };
    let order = state
        .service
        .transition_fulfillment(actor, id, &body.status, shipping)
        .await?;
    Ok(Json(json!({
        "success": true,
        "order": order,
        "message": format!("Order updated to {}", body.status),
    })))
}

#[derive(Debug, Deserialize)]
struct DomainStatusBody {
    status: String,
}

async fn update_return_status(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(body): Json<DomainStatusBody>,
) -> Result<Json<Value>> {
    let order = state.service.transition_return(actor, id, &body.status).await?;
    Ok(Json(json!({ "success": true, "order": order })))
}

async fn update_exchange_status(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(body): Json<DomainStatusBody>,
) -> Result<Json<Value>> {
    let order = state.service.transition_exchange(actor, id, &body.status).await?;
    Ok(Json(json!({ "success": true, "order": order })))
}

#[derive(Debug, Deserialize)]
struct ReturnWindowBody {
    days: Option<i64>,
}

async fn extend_return_window(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(body): Json<ReturnWindowBody>,
) -> Result<Json<Value>> {
    let order = state.service.extend_return_window(actor, id, body.days).await?;
    Ok(Json(json!({ "success": true, "order": order })))
}

#[derive(Debug, Deserialize, Validate)]
struct CreateReturnBody {
    #[validate(length(min = 1, message = "Reason required"))]
    reason: String,
    // Accepted for forward compatibility with item-level returns.
    #[allow(dead_code)]
    item_id: Option<String>,
}

async fn create_return(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(body): Json<CreateReturnBody>,
) -> Result<Json<Value>> {
    body.validate()
        .map_err(|e| CommerceError::Validation(e.to_string()))?;
    let request = state.service.create_return(actor, id, &body.reason).await?;
    Ok(Json(json!({ "success": true, "request": request })))
}

#[derive(Debug, Deserialize, Validate)]
struct CreateExchangeBody {
    #[validate(length(min = 1, message = "Missing required fields"))]
    item_id: String,
    #[validate(length(min = 1, message = "Missing required fields"))]
    reason: String,
    #[validate(length(min = 1, message = "Missing required fields"))]
    new_size: String,
    #[validate(length(min = 1, message = "Missing required fields"))]
    new_color: String,
}

async fn create_exchange(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(body): Json<CreateExchangeBody>,
) -> Result<Json<Value>> {
    body.validate()
        .map_err(|e| CommerceError::Validation(e.to_string()))?;
    tracing::debug!(order_id = %id, item_id = %body.item_id, "exchange intake");
    let request = state
        .service
        .create_exchange(actor, id, &body.reason, &body.new_size, &body.new_color)
        .await?;
    Ok(Json(json!({ "success": true, "request": request })))
}

#[derive(Debug, Deserialize)]
struct ResolveBody {
    status: String,
}

async fn resolve_return(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(body): Json<ResolveBody>,
) -> Result<Json<Value>> {
    let request = state
        .service
        .resolve_return_request(actor, id, &body.status)
        .await?;
    Ok(Json(json!({ "success": true, "request": request })))
}

async fn resolve_exchange(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(body): Json<ResolveBody>,
) -> Result<Json<Value>> {
    let request = state
        .service
        .resolve_exchange_request(actor, id, &body.status)
        .await?;
    Ok(Json(json!({ "success": true, "request": request })))
}

async fn list_returns(State(state): State<AppState>, actor: Actor) -> Result<Json<Value>> {
    let requests = state.service.list_returns(actor).await?;
    Ok(Json(json!(requests)))
}

async fn list_exchanges(State(state): State<AppState>, actor: Actor) -> Result<Json<Value>> {
    let requests = state.service.list_exchanges(actor).await?;
    Ok(Json(json!(requests)))
}

#[derive(Debug, Deserialize)]
struct VerifyPaymentBody {
    order_id: Uuid,
    #[serde(alias = "razorpayOrderId")]
    razorpay_order_id: String,
    #[serde(alias = "razorpayPaymentId")]
    razorpay_payment_id: String,
    #[serde(alias = "razorpaySignature")]
    razorpay_signature: String,
}

async fn verify_payment(
    State(state): State<AppState>,
    actor: Actor,
    Json(body): Json<VerifyPaymentBody>,
) -> Result<Json<Value>> {
    let (_, already_verified) = state
        .service
        .verify_payment(
            actor,
            PaymentVerification {
                order_id: body.order_id,
                gateway_order_id: body.razorpay_order_id,
                gateway_payment_id: body.razorpay_payment_id,
                signature: body.razorpay_signature,
            },
        )
        .await?;
    if already_verified {
        return Ok(Json(json!({ "success": true, "already_verified": true })));
    }
    Ok(Json(json!({ "success": true })))
}

/// The signature covers the exact raw bytes; the body is not parsed before
/// verification succeeds.
async fn razorpay_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>> {
    let signature = headers
        .get("x-razorpay-signature")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if !webhook::verify_signature(&state.webhook_secret, &body, signature) {
        return Err(CommerceError::SignatureInvalid);
    }

    let event = webhook::parse_event(&body);
    tracing::info!(?event, "gateway webhook received");
    state.service.reconcile(event).await?;
    Ok(Json(json!({ "success": true })))
}
