//! Error taxonomy for the order lifecycle core and its HTTP mapping.
//!
//! Validation errors are raised before any write and carry enough context for
//! a precise client message; refund failures are distinguished so staff can
//! retry manually.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::domain::status::Domain;

#[derive(Error, Debug)]
pub enum CommerceError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Invalid {domain} status: {value}")]
    InvalidStatus { domain: &'static str, value: String },

    #[error("Transition {current} -> {requested} not allowed")]
    TransitionRejected {
        domain: Domain,
        current: String,
        requested: String,
    },

    #[error("Refund failed: missing payment ID")]
    MissingPaymentRef,

    #[error("Refund failed. Please try again.")]
    RefundFailed(String),

    #[error("Invalid signature")]
    SignatureInvalid,

    #[error("Order was modified concurrently, please retry")]
    Conflict,

    #[error("{0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("Gateway error: {0}")]
    Gateway(#[from] reqwest::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CommerceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized | Self::SignatureInvalid => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidStatus { .. }
            | Self::TransitionRejected { .. }
            | Self::MissingPaymentRef
            | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::RefundFailed(_) => StatusCode::BAD_GATEWAY,
            Self::Conflict => StatusCode::CONFLICT,
            Self::Storage(_) | Self::Gateway(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for CommerceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        // Internal details stay out of the response body.
        let message = match &self {
            Self::Storage(_) | Self::Gateway(_) | Self::Internal(_) => "Internal error".to_string(),
            other => other.to_string(),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

pub type Result<T> = std::result::Result<T, CommerceError>;
