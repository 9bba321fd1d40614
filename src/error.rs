use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde_json::json;
use thiserror::Error;

use crate::disbursement::DisbursementError;
use crate::domain::WalletError;
use crate::ledger::{LedgerError, PayoutError, SaleEventError};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Internal server error: {0}")]
    Internal(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Insufficient balance: {0}")]
    InsufficientBalance(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Rate limited until {next_eligible}")]
    RateLimited { next_eligible: DateTime<Utc> },
    /// Ledger/balance disagreement that should never occur under correct
    /// operation; surfaced loudly for operator review.
    #[error("Consistency error: {0}")]
    Consistency(String),
    #[error("Disbursement failed: {0}")]
    Disbursement(String),
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<WalletError> for AppError {
    fn from(err: WalletError) -> Self {
        match err {
            WalletError::NonPositiveAmount(_) => AppError::BadRequest(err.to_string()),
            WalletError::InsufficientBalance { .. } => {
                AppError::InsufficientBalance(err.to_string())
            }
            WalletError::Inconsistent { .. } => AppError::Consistency(err.to_string()),
        }
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Validation(msg) => AppError::BadRequest(msg),
            LedgerError::Wallet(inner) => inner.into(),
            LedgerError::Db(inner) => inner.into(),
            LedgerError::NotFound(msg) => AppError::NotFound(msg),
        }
    }
}

impl From<PayoutError> for AppError {
    fn from(err: PayoutError) -> Self {
        match err {
            PayoutError::Validation(msg) => AppError::BadRequest(msg),
            PayoutError::RateLimited { next_eligible } => AppError::RateLimited { next_eligible },
            PayoutError::RequestInFlight(vendor) => AppError::Conflict(format!(
                "vendor {} already has a payout request in flight",
                vendor
            )),
            PayoutError::NotFound(msg) => AppError::NotFound(msg),
            PayoutError::IllegalTransition { from, to } => AppError::Conflict(format!(
                "illegal payout transition {} -> {}",
                from.as_str(),
                to.as_str()
            )),
            PayoutError::Ledger(inner) => inner.into(),
            PayoutError::Db(inner) => inner.into(),
            PayoutError::Disbursement(inner) => AppError::Disbursement(inner.to_string()),
        }
    }
}

impl From<SaleEventError> for AppError {
    fn from(err: SaleEventError) -> Self {
        match err {
            SaleEventError::Validation(msg) => AppError::BadRequest(msg),
            SaleEventError::Db(inner) => inner.into(),
        }
    }
}

impl From<DisbursementError> for AppError {
    fn from(err: DisbursementError) -> Self {
        AppError::Disbursement(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::Config(msg) | AppError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, json!({"error": msg}))
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, json!({"error": msg})),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({"error": msg})),
            AppError::InsufficientBalance(msg) | AppError::Conflict(msg) => {
                (StatusCode::CONFLICT, json!({"error": msg}))
            }
            AppError::RateLimited { next_eligible } => (
                StatusCode::TOO_MANY_REQUESTS,
                json!({
                    "error": "payout rate limit exceeded",
                    "nextEligibleAtMs": next_eligible.timestamp_millis(),
                }),
            ),
            AppError::Consistency(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({"error": msg, "kind": "consistency"}),
            ),
            AppError::Disbursement(msg) => (StatusCode::BAD_GATEWAY, json!({"error": msg})),
        };

        (status, Json(body)).into_response()
    }
}
