//! Commission rule: a scoped pricing policy resolved per sale.

use crate::domain::{CategoryId, Money, ProductId, VendorId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The granularity at which a commission rule applies.
///
/// Resolution precedence is Product > Category > Vendor > Platform; the
/// closed enum replaces the original string-keyed scope dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", content = "ref", rename_all = "snake_case")]
pub enum RuleScope {
    Platform,
    Vendor(VendorId),
    Category(CategoryId),
    Product(ProductId),
}

impl RuleScope {
    /// Scope name as stored in the database.
    pub fn kind_str(&self) -> &'static str {
        match self {
            RuleScope::Platform => "platform",
            RuleScope::Vendor(_) => "vendor",
            RuleScope::Category(_) => "category",
            RuleScope::Product(_) => "product",
        }
    }

    /// The scope reference id, if any (platform rules carry none).
    pub fn ref_str(&self) -> Option<&str> {
        match self {
            RuleScope::Platform => None,
            RuleScope::Vendor(v) => Some(v.as_str()),
            RuleScope::Category(c) => Some(c.as_str()),
            RuleScope::Product(p) => Some(p.as_str()),
        }
    }
}

/// One band of a tiered rate, matched against cumulative period sales.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommissionTier {
    pub min_amount: Money,
    /// Exclusive upper bound; `None` means unbounded.
    pub max_amount: Option<Money>,
    /// Percentage rate applied to the sale amount.
    pub rate: Money,
    pub label: String,
}

impl CommissionTier {
    /// Whether `cumulative` falls inside `[min_amount, max_amount)`.
    pub fn contains(&self, cumulative: Money) -> bool {
        if cumulative < self.min_amount {
            return false;
        }
        match self.max_amount {
            Some(max) => cumulative < max,
            None => true,
        }
    }
}

/// How a rule's commission is computed from a sale amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CommissionRate {
    /// Flat amount per line item.
    Fixed { value: Money },
    /// Percentage of the sale amount.
    Percentage { value: Money },
    /// Percentage chosen by the tier containing cumulative period sales.
    /// Tiers are sorted ascending by `min_amount`.
    Tiered { tiers: Vec<CommissionTier> },
}

impl CommissionRate {
    pub fn kind_str(&self) -> &'static str {
        match self {
            CommissionRate::Fixed { .. } => "fixed",
            CommissionRate::Percentage { .. } => "percentage",
            CommissionRate::Tiered { .. } => "tiered",
        }
    }
}

/// A scoped commission pricing policy.
///
/// Created and edited by operators; the ledger only reads rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommissionRule {
    pub id: String,
    #[serde(flatten)]
    pub scope: RuleScope,
    #[serde(flatten)]
    pub rate: CommissionRate,
    /// For category rules: whether the rule also covers descendant categories.
    pub include_subcategories: bool,
    pub is_active: bool,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    /// Tie-break within a scope; higher wins.
    pub priority: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CommissionRule {
    /// Whether the rule is active and its validity window contains `at`.
    pub fn is_valid_at(&self, at: DateTime<Utc>) -> bool {
        if !self.is_active {
            return false;
        }
        if let Some(start) = self.starts_at {
            if at < start {
                return false;
            }
        }
        if let Some(end) = self.ends_at {
            if at > end {
                return false;
            }
        }
        true
    }
}
