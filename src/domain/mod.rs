//! Domain types for the vendor wallet ledger and commission engine.
//!
//! This module provides:
//! - Monetary amounts via the Money wrapper (2dp half-up rounding)
//! - Domain identifiers: VendorId, ProductId, CategoryId, OrderId
//! - Commission rules, ledger entries, wallet balances, transactions
//! - Payout request workflow types and financial summary rollups

pub mod entry;
pub mod money;
pub mod payout;
pub mod primitives;
pub mod rule;
pub mod summary;
pub mod transaction;
pub mod wallet;

pub use entry::{AppliedRate, CommissionEntry, EntryStatus};
pub use money::Money;
pub use payout::{
    FeeBreakdown, PayoutMethod, PayoutRequest, PayoutSettings, PayoutStatus, SafetyChecks,
    StatusChange,
};
pub use primitives::{CategoryId, OrderId, ProductId, VendorId};
pub use rule::{CommissionRate, CommissionRule, CommissionTier, RuleScope};
pub use summary::{FinancialSummary, SummaryPeriod, SummaryScope};
pub use transaction::{TxCategory, TxReference, TxType, WalletTransaction};
pub use wallet::{BalanceSnapshot, VendorWallet, WalletError};
