//! Wallet transaction: one append-only ledger row per wallet mutation.

use crate::domain::{BalanceSnapshot, Money, VendorId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Direction/shape of a ledger row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxType {
    Credit,
    Debit,
    /// Funds entering a held bucket (pending on sale credit, reserved on
    /// payout reservation). Sale holds carry a `release_at`.
    Hold,
    /// Funds leaving a held bucket back toward available.
    Release,
    Refund,
    Adjustment,
}

impl TxType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxType::Credit => "credit",
            TxType::Debit => "debit",
            TxType::Hold => "hold",
            TxType::Release => "release",
            TxType::Refund => "refund",
            TxType::Adjustment => "adjustment",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "credit" => Some(TxType::Credit),
            "debit" => Some(TxType::Debit),
            "hold" => Some(TxType::Hold),
            "release" => Some(TxType::Release),
            "refund" => Some(TxType::Refund),
            "adjustment" => Some(TxType::Adjustment),
            _ => None,
        }
    }
}

/// Business category of a ledger row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxCategory {
    Sale,
    Commission,
    Payout,
    Refund,
    Dispute,
    Adjustment,
    Fee,
    Bonus,
}

impl TxCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxCategory::Sale => "sale",
            TxCategory::Commission => "commission",
            TxCategory::Payout => "payout",
            TxCategory::Refund => "refund",
            TxCategory::Dispute => "dispute",
            TxCategory::Adjustment => "adjustment",
            TxCategory::Fee => "fee",
            TxCategory::Bonus => "bonus",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "sale" => Some(TxCategory::Sale),
            "commission" => Some(TxCategory::Commission),
            "payout" => Some(TxCategory::Payout),
            "refund" => Some(TxCategory::Refund),
            "dispute" => Some(TxCategory::Dispute),
            "adjustment" => Some(TxCategory::Adjustment),
            "fee" => Some(TxCategory::Fee),
            "bonus" => Some(TxCategory::Bonus),
            _ => None,
        }
    }
}

/// The entity that caused a ledger row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxReference {
    /// "order" | "payout" | "refund" | "transaction" (compensating rows).
    pub kind: String,
    pub id: String,
}

impl TxReference {
    pub fn order(id: &str) -> Self {
        TxReference {
            kind: "order".to_string(),
            id: id.to_string(),
        }
    }

    pub fn payout(id: &str) -> Self {
        TxReference {
            kind: "payout".to_string(),
            id: id.to_string(),
        }
    }

    pub fn refund(id: &str) -> Self {
        TxReference {
            kind: "refund".to_string(),
            id: id.to_string(),
        }
    }

    pub fn transaction(id: &str) -> Self {
        TxReference {
            kind: "transaction".to_string(),
            id: id.to_string(),
        }
    }
}

/// One append-only ledger row. Never edited; a reversal appends a new
/// compensating row referencing the original.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletTransaction {
    pub id: String,
    pub vendor: VendorId,
    pub tx_type: TxType,
    pub category: TxCategory,
    pub amount: Money,
    /// Balances immediately after this mutation; the latest row's snapshot
    /// must always equal the wallet's stored balances.
    pub balance_after: BalanceSnapshot,
    pub reference: Option<TxReference>,
    pub note: Option<String>,
    /// When a sale hold matures into the available bucket.
    pub release_at: Option<DateTime<Utc>>,
    /// Set once the release job has processed this hold.
    pub released_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl WalletTransaction {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        vendor: VendorId,
        tx_type: TxType,
        category: TxCategory,
        amount: Money,
        balance_after: BalanceSnapshot,
        reference: Option<TxReference>,
        note: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        WalletTransaction {
            id: Uuid::new_v4().to_string(),
            vendor,
            tx_type,
            category,
            amount,
            balance_after,
            reference,
            note,
            release_at: None,
            released_at: None,
            created_at,
        }
    }

    /// Attach a maturity date, marking this row as a releasable hold.
    pub fn with_release_at(mut self, release_at: DateTime<Utc>) -> Self {
        self.release_at = Some(release_at);
        self
    }
}
