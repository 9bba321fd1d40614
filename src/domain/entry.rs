//! Commission ledger entry: the immutable economics of one order line item.

use crate::domain::{CategoryId, Money, OrderId, ProductId, VendorId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Lifecycle of a commission ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    /// Recorded at order creation; wallet not yet credited.
    Pending,
    /// Vendor wallet credited on fulfillment.
    Credited,
    /// Reversed by a processed return.
    Refunded,
    /// Under dispute; blocks payouts for the vendor.
    Disputed,
    /// Order cancelled before fulfillment.
    Cancelled,
}

impl EntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryStatus::Pending => "pending",
            EntryStatus::Credited => "credited",
            EntryStatus::Refunded => "refunded",
            EntryStatus::Disputed => "disputed",
            EntryStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(EntryStatus::Pending),
            "credited" => Some(EntryStatus::Credited),
            "refunded" => Some(EntryStatus::Refunded),
            "disputed" => Some(EntryStatus::Disputed),
            "cancelled" => Some(EntryStatus::Cancelled),
            _ => None,
        }
    }
}

/// Snapshot of the rate that was applied, so later rule edits never
/// change recorded economics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedRate {
    /// "fixed" | "percentage" | "tiered".
    pub kind: String,
    /// Flat amount or percentage value actually used.
    pub rate: Money,
    /// Tier label when the rule was tiered.
    pub tier_label: Option<String>,
    /// Originating rule id; `None` for the hard-coded platform default.
    pub rule_id: Option<String>,
}

/// One durable record per order line item.
///
/// Invariant: `commission_amount + vendor_earning == sale_amount` exactly;
/// the earning is always the residual of the rounded commission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommissionEntry {
    /// Stable key derived from the line item; duplicate submissions of the
    /// same line item are ignored on insert.
    pub entry_key: String,
    pub order_id: OrderId,
    pub order_item_id: String,
    pub vendor: VendorId,
    pub product: ProductId,
    pub category: Option<CategoryId>,
    pub quantity: i64,
    pub unit_price: Money,
    pub sale_amount: Money,
    pub applied: AppliedRate,
    pub commission_amount: Money,
    pub vendor_earning: Money,
    pub status: EntryStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CommissionEntry {
    /// Derive the stable entry key for a line item.
    pub fn compute_entry_key(
        order_id: &OrderId,
        order_item_id: &str,
        vendor: &VendorId,
        product: &ProductId,
        sale_amount: Money,
    ) -> String {
        let mut hasher = Sha256::new();
        hasher.update(order_id.as_str().as_bytes());
        hasher.update(b"|");
        hasher.update(order_item_id.as_bytes());
        hasher.update(b"|");
        hasher.update(vendor.as_str().as_bytes());
        hasher.update(b"|");
        hasher.update(product.as_str().as_bytes());
        hasher.update(b"|");
        hasher.update(sale_amount.to_canonical_string().as_bytes());
        hex::encode(hasher.finalize())
    }
}
