//! Holding-period release job: matured sale holds move pending funds to
//! available.

use super::JobReport;
use crate::db::Repository;
use crate::ledger::WalletService;
use chrono::{DateTime, Utc};
use tracing::{info, warn};

/// Per-run batch bound; overdue holds left behind are picked up by the
/// next run.
const RELEASE_BATCH_LIMIT: i64 = 500;

/// Release every due, unreleased sale hold.
///
/// Idempotent: the hold row's `released_at` guard makes re-running over
/// the same rows a no-op, and overlapping invocations claim each hold at
/// most once.
pub async fn run_release_job(
    repo: &Repository,
    wallets: &WalletService,
    now: DateTime<Utc>,
) -> Result<JobReport, sqlx::Error> {
    let due = repo.due_holds(now, RELEASE_BATCH_LIMIT).await?;
    let mut report = JobReport::default();

    for hold in &due {
        match wallets.release_hold(&hold.id, now).await {
            Ok(true) => report.record_success(),
            Ok(false) => report.record_skip(),
            Err(e) => {
                warn!(
                    hold = %hold.id,
                    vendor = %hold.vendor,
                    error = %e,
                    "failed to release hold"
                );
                report.record_failure();
            }
        }
    }

    info!(
        processed = report.processed,
        succeeded = report.succeeded,
        failed = report.failed,
        skipped = report.skipped,
        "release job finished"
    );
    Ok(report)
}
