//! Commission computation for a resolved rate and sale amount.

use crate::domain::{CommissionRate, Money};
use tracing::warn;

/// The computed split of one sale.
///
/// Invariant: `commission + vendor_earning == sale_amount` exactly. The
/// earning is always the residual of the rounded commission, never
/// independently rounded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommissionBreakdown {
    pub commission: Money,
    pub vendor_earning: Money,
    /// Rate actually applied: the flat value or percentage used.
    pub rate_applied: Money,
    /// Matched tier label for tiered rates.
    pub tier_label: Option<String>,
}

/// Compute the commission split for a sale of `sale_amount`.
///
/// `cumulative_period_sales` is the vendor's prior sales in the current
/// period and only drives tier selection; the matched tier's rate still
/// applies to this sale alone. Sales whose cumulative total lands below
/// the lowest tier fall back to the first tier.
pub fn compute_commission(
    rate: &CommissionRate,
    sale_amount: Money,
    cumulative_period_sales: Money,
) -> CommissionBreakdown {
    let (raw_commission, rate_applied, tier_label) = match rate {
        CommissionRate::Fixed { value } => (*value, *value, None),
        CommissionRate::Percentage { value } => (sale_amount.percent(*value), *value, None),
        CommissionRate::Tiered { tiers } => {
            let cumulative = cumulative_period_sales + sale_amount;
            let tier = tiers
                .iter()
                .find(|t| t.contains(cumulative))
                .or_else(|| tiers.first());
            match tier {
                Some(t) => (
                    sale_amount.percent(t.rate),
                    t.rate,
                    Some(t.label.clone()),
                ),
                None => (Money::zero(), Money::zero(), None),
            }
        }
    };

    let commission = raw_commission.clamp(Money::zero(), sale_amount);
    if commission != raw_commission {
        warn!(
            raw = %raw_commission,
            sale = %sale_amount,
            "commission clamped to sale amount"
        );
    }

    CommissionBreakdown {
        commission,
        vendor_earning: sale_amount - commission,
        rate_applied,
        tier_label,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CommissionTier;

    fn m(s: &str) -> Money {
        Money::from_str_canonical(s).unwrap()
    }

    fn tiered() -> CommissionRate {
        CommissionRate::Tiered {
            tiers: vec![
                CommissionTier {
                    min_amount: m("0"),
                    max_amount: Some(m("10000")),
                    rate: m("12"),
                    label: "starter".to_string(),
                },
                CommissionTier {
                    min_amount: m("10000"),
                    max_amount: Some(m("50000")),
                    rate: m("9"),
                    label: "growth".to_string(),
                },
                CommissionTier {
                    min_amount: m("50000"),
                    max_amount: None,
                    rate: m("6"),
                    label: "scale".to_string(),
                },
            ],
        }
    }

    #[test]
    fn test_percentage_ten_percent_of_ten_thousand() {
        let split = compute_commission(
            &CommissionRate::Percentage { value: m("10") },
            m("10000"),
            Money::zero(),
        );
        assert_eq!(split.commission, m("1000"));
        assert_eq!(split.vendor_earning, m("9000"));
    }

    #[test]
    fn test_split_invariant_under_rounding() {
        // 7.5% of 33.33 = 2.49975 -> rounds to 2.50; earning is the residual.
        let split = compute_commission(
            &CommissionRate::Percentage { value: m("7.5") },
            m("33.33"),
            Money::zero(),
        );
        assert_eq!(split.commission, m("2.5"));
        assert_eq!(split.vendor_earning, m("30.83"));
        assert_eq!(split.commission + split.vendor_earning, m("33.33"));
    }

    #[test]
    fn test_fixed_flat_value() {
        let split = compute_commission(
            &CommissionRate::Fixed { value: m("25") },
            m("400"),
            Money::zero(),
        );
        assert_eq!(split.commission, m("25"));
        assert_eq!(split.vendor_earning, m("375"));
        assert_eq!(split.rate_applied, m("25"));
    }

    #[test]
    fn test_fixed_clamped_to_sale_amount() {
        let split = compute_commission(
            &CommissionRate::Fixed { value: m("50") },
            m("30"),
            Money::zero(),
        );
        assert_eq!(split.commission, m("30"));
        assert_eq!(split.vendor_earning, Money::zero());
    }

    #[test]
    fn test_tiered_picks_tier_by_cumulative_sales() {
        // 11,000 prior + 1,000 sale = 12,000 cumulative -> growth tier (9%).
        let split = compute_commission(&tiered(), m("1000"), m("11000"));
        assert_eq!(split.tier_label.as_deref(), Some("growth"));
        assert_eq!(split.rate_applied, m("9"));
        assert_eq!(split.commission, m("90"));
    }

    #[test]
    fn test_tiered_boundary_is_half_open() {
        // Exactly 10,000 cumulative belongs to the second tier.
        let split = compute_commission(&tiered(), m("5000"), m("5000"));
        assert_eq!(split.tier_label.as_deref(), Some("growth"));
    }

    #[test]
    fn test_tiered_unbounded_top_tier() {
        let split = compute_commission(&tiered(), m("10000"), m("90000"));
        assert_eq!(split.tier_label.as_deref(), Some("scale"));
        assert_eq!(split.commission, m("600"));
    }

    #[test]
    fn test_tiered_falls_back_to_first_tier() {
        // Tiers starting above zero: cumulative below the lowest minimum
        // still commissions at the first tier's rate.
        let rate = CommissionRate::Tiered {
            tiers: vec![CommissionTier {
                min_amount: m("1000"),
                max_amount: None,
                rate: m("8"),
                label: "only".to_string(),
            }],
        };
        let split = compute_commission(&rate, m("100"), Money::zero());
        assert_eq!(split.tier_label.as_deref(), Some("only"));
        assert_eq!(split.commission, m("8"));
    }

    #[test]
    fn test_empty_tier_list_yields_zero_commission() {
        let rate = CommissionRate::Tiered { tiers: vec![] };
        let split = compute_commission(&rate, m("100"), Money::zero());
        assert_eq!(split.commission, Money::zero());
        assert_eq!(split.vendor_earning, m("100"));
    }
}
