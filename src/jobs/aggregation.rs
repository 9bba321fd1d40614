//! Financial aggregation job: denormalized rollups per scope and period.

use super::JobReport;
use crate::db::repo::{EntryRollupRow, PayoutRollupRow};
use crate::db::Repository;
use crate::domain::{
    EntryStatus, FinancialSummary, Money, SummaryPeriod, SummaryScope,
};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use tracing::{info, warn};

#[derive(Debug, Default, Clone)]
struct Accumulator {
    gmv: Money,
    orders: HashSet<String>,
    commission_total: Money,
    vendor_earnings_total: Money,
    payouts_total: Money,
    refunds_total: Money,
}

impl Accumulator {
    fn add_entry(&mut self, row: &EntryRollupRow) {
        // Cancelled entries never count; refunded entries stay in GMV and
        // are tracked in refunds_total.
        if row.status == EntryStatus::Cancelled {
            return;
        }
        self.gmv += row.sale_amount;
        self.orders.insert(row.order_id.as_str().to_string());
        self.commission_total += row.commission_amount;
        self.vendor_earnings_total += row.vendor_earning;
        if row.status == EntryStatus::Refunded {
            self.refunds_total += row.sale_amount;
        }
    }

    fn into_summary(
        self,
        scope: SummaryScope,
        scope_ref: String,
        period: SummaryPeriod,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
        computed_at: DateTime<Utc>,
    ) -> FinancialSummary {
        FinancialSummary {
            scope,
            scope_ref,
            period,
            period_start,
            period_end,
            gmv: self.gmv,
            order_count: self.orders.len() as i64,
            commission_total: self.commission_total,
            vendor_earnings_total: self.vendor_earnings_total,
            payouts_total: self.payouts_total,
            refunds_total: self.refunds_total,
            net_revenue: self.commission_total - self.refunds_total,
            computed_at,
        }
    }
}

/// Recompute platform, per-vendor, and per-category rollups for the
/// period containing `at`. Upsert semantics make reruns overwrite.
pub async fn run_aggregation_job(
    repo: &Repository,
    period: SummaryPeriod,
    at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<JobReport, sqlx::Error> {
    let (start, end) = period.bounds(at);
    let entries = repo.entries_in_window(start, end).await?;
    let payouts = repo.completed_payouts_in_window(start, end).await?;

    let mut platform = Accumulator::default();
    let mut by_vendor: HashMap<String, Accumulator> = HashMap::new();
    let mut by_category: HashMap<String, Accumulator> = HashMap::new();

    for row in &entries {
        platform.add_entry(row);
        by_vendor
            .entry(row.vendor.as_str().to_string())
            .or_default()
            .add_entry(row);
        if let Some(category) = &row.category {
            by_category
                .entry(category.as_str().to_string())
                .or_default()
                .add_entry(row);
        }
    }
    for PayoutRollupRow { vendor, amount } in &payouts {
        platform.payouts_total += *amount;
        by_vendor
            .entry(vendor.as_str().to_string())
            .or_default()
            .payouts_total += *amount;
    }

    let mut report = JobReport::default();
    let mut summaries = Vec::new();
    summaries.push(platform.into_summary(
        SummaryScope::Platform,
        String::new(),
        period,
        start,
        end,
        now,
    ));
    for (vendor, acc) in by_vendor {
        summaries.push(acc.into_summary(SummaryScope::Vendor, vendor, period, start, end, now));
    }
    for (category, acc) in by_category {
        summaries.push(acc.into_summary(
            SummaryScope::Category,
            category,
            period,
            start,
            end,
            now,
        ));
    }

    for summary in &summaries {
        match repo.upsert_summary(summary).await {
            Ok(()) => report.record_success(),
            Err(e) => {
                warn!(
                    scope = summary.scope.as_str(),
                    scope_ref = %summary.scope_ref,
                    error = %e,
                    "failed to upsert summary"
                );
                report.record_failure();
            }
        }
    }

    info!(
        period = period.as_str(),
        start = %start,
        summaries = report.processed,
        failed = report.failed,
        "aggregation job finished"
    );
    Ok(report)
}
