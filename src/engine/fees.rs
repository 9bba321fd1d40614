//! Payout fee computation, method-dependent.
//!
//! Fees are computed once at request creation and never recalculated.

use crate::domain::{FeeBreakdown, Money, PayoutMethod};

/// Fee table injected from configuration.
#[derive(Debug, Clone)]
pub struct FeeSchedule {
    /// Flat percentage taken on every payout regardless of method.
    pub platform_fee_pct: Money,
    /// Bank transfers: flat fee.
    pub bank_flat_fee: Money,
    /// Mobile wallets: percentage, capped.
    pub mobile_pct: Money,
    pub mobile_fee_cap: Money,
    /// Card processors: percentage plus flat.
    pub card_pct: Money,
    pub card_flat_fee: Money,
}

/// Compute the fee breakdown for a payout of `amount` via `method`.
pub fn compute_fees(schedule: &FeeSchedule, method: &PayoutMethod, amount: Money) -> FeeBreakdown {
    let platform_fee = amount.percent(schedule.platform_fee_pct);
    let processing_fee = match method {
        PayoutMethod::BankTransfer { .. } => schedule.bank_flat_fee,
        PayoutMethod::MobileWallet { .. } => {
            amount.percent(schedule.mobile_pct).min(schedule.mobile_fee_cap)
        }
        PayoutMethod::Card { .. } => amount.percent(schedule.card_pct) + schedule.card_flat_fee,
    };
    FeeBreakdown {
        platform_fee,
        processing_fee,
        net_amount: amount - platform_fee - processing_fee,
    }
}
