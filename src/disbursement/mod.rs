//! Disbursement rail abstraction for executing approved payouts.
//!
//! The rail is an opaque external money mover: the ledger hands it a net
//! amount and a payment method snapshot and records the returned
//! transaction reference. A failed execution leaves the payout request
//! in flight; the wallet reservation is never released on rail errors
//! because the money may have actually moved.

use crate::domain::{Money, PayoutMethod};
use async_trait::async_trait;
use std::fmt;

pub mod gateway;
pub mod mock;

pub use gateway::HttpDisbursementGateway;
pub use mock::MockDisbursementRail;

/// Result of a successful disbursement execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisbursementReceipt {
    /// External transaction reference from the payment rail.
    pub external_ref: String,
}

/// External payment rail invoked at the end of the payout workflow.
#[async_trait]
pub trait DisbursementRail: Send + Sync + fmt::Debug {
    /// Execute a disbursement of `net_amount` to `method`.
    ///
    /// `payout_id` doubles as the idempotency key: rails must treat a
    /// repeated id as the same disbursement.
    async fn execute(
        &self,
        payout_id: &str,
        net_amount: Money,
        method: &PayoutMethod,
    ) -> Result<DisbursementReceipt, DisbursementError>;
}

/// Error type for disbursement operations.
#[derive(Debug, Clone)]
pub enum DisbursementError {
    /// Network error (e.g., connection timeout, DNS failure)
    NetworkError(String),
    /// HTTP error from the rail (e.g., 5xx server error)
    HttpError { status: u16, message: String },
    /// The rail rejected the payment as unprocessable
    Rejected(String),
    /// Parsing error (malformed rail response)
    ParseError(String),
    /// Rate limit exceeded (caller should retry later)
    RateLimited,
}

impl fmt::Display for DisbursementError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisbursementError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            DisbursementError::HttpError { status, message } => {
                write!(f, "HTTP error {}: {}", status, message)
            }
            DisbursementError::Rejected(msg) => write!(f, "Disbursement rejected: {}", msg),
            DisbursementError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            DisbursementError::RateLimited => write!(f, "Rate limited"),
        }
    }
}

impl std::error::Error for DisbursementError {}
