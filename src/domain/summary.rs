//! Periodic financial summary rollups (read-optimized denormalization).

use crate::domain::Money;
use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Aggregation granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryPeriod {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl SummaryPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            SummaryPeriod::Daily => "daily",
            SummaryPeriod::Weekly => "weekly",
            SummaryPeriod::Monthly => "monthly",
            SummaryPeriod::Yearly => "yearly",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "daily" => Some(SummaryPeriod::Daily),
            "weekly" => Some(SummaryPeriod::Weekly),
            "monthly" => Some(SummaryPeriod::Monthly),
            "yearly" => Some(SummaryPeriod::Yearly),
            _ => None,
        }
    }

    /// `[start, end)` of the period containing `at`. Weeks start Monday.
    pub fn bounds(&self, at: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let date = at.date_naive();
        let (start_date, end_date) = match self {
            SummaryPeriod::Daily => (date, date + Duration::days(1)),
            SummaryPeriod::Weekly => {
                let days_from_monday = date.weekday().num_days_from_monday() as i64;
                let monday = date - Duration::days(days_from_monday);
                (monday, monday + Duration::days(7))
            }
            SummaryPeriod::Monthly => {
                let first = date.with_day(1).expect("day 1 always valid");
                let next = if first.month() == 12 {
                    first
                        .with_year(first.year() + 1)
                        .and_then(|d| d.with_month(1))
                } else {
                    first.with_month(first.month() + 1)
                }
                .expect("month rollover always valid");
                (first, next)
            }
            SummaryPeriod::Yearly => {
                let first = date
                    .with_month(1)
                    .and_then(|d| d.with_day(1))
                    .expect("jan 1 always valid");
                let next = first
                    .with_year(first.year() + 1)
                    .expect("year rollover always valid");
                (first, next)
            }
        };
        (
            Utc.from_utc_datetime(&start_date.and_hms_opt(0, 0, 0).expect("midnight valid")),
            Utc.from_utc_datetime(&end_date.and_hms_opt(0, 0, 0).expect("midnight valid")),
        )
    }
}

/// Aggregation scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryScope {
    Platform,
    Vendor,
    Category,
}

impl SummaryScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            SummaryScope::Platform => "platform",
            SummaryScope::Vendor => "vendor",
            SummaryScope::Category => "category",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "platform" => Some(SummaryScope::Platform),
            "vendor" => Some(SummaryScope::Vendor),
            "category" => Some(SummaryScope::Category),
            _ => None,
        }
    }
}

/// One denormalized rollup row, upserted by
/// (scope, scope_ref, period, period_start).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialSummary {
    pub scope: SummaryScope,
    /// Vendor or category id; empty for platform scope.
    pub scope_ref: String,
    pub period: SummaryPeriod,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub gmv: Money,
    pub order_count: i64,
    pub commission_total: Money,
    pub vendor_earnings_total: Money,
    pub payouts_total: Money,
    pub refunds_total: Money,
    pub net_revenue: Money,
    pub computed_at: DateTime<Utc>,
}
