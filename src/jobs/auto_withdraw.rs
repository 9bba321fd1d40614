//! Auto-withdrawal job: creates payout requests for opted-in vendors.

use super::JobReport;
use crate::db::Repository;
use crate::ledger::{PayoutError, PayoutService};
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

/// For each vendor with auto-withdraw enabled, request a payout of the
/// full available balance unless any skip condition holds: balance below
/// threshold, a request already in flight, the rate-limit window not yet
/// elapsed, or no verified default payment method.
pub async fn run_auto_withdraw_job(
    repo: &Repository,
    payouts: &PayoutService,
    now: DateTime<Utc>,
) -> Result<JobReport, sqlx::Error> {
    let vendors = repo.auto_withdraw_vendors().await?;
    let mut report = JobReport::default();

    for settings in &vendors {
        if !settings.method_verified || settings.default_method.is_none() {
            debug!(vendor = %settings.vendor, "skipping auto-withdraw: no verified method");
            report.record_skip();
            continue;
        }

        let available = match repo.get_wallet(&settings.vendor).await? {
            Some(w) => w.available(),
            None => {
                report.record_skip();
                continue;
            }
        };
        if available < settings.auto_withdraw_threshold {
            debug!(
                vendor = %settings.vendor,
                available = %available,
                threshold = %settings.auto_withdraw_threshold,
                "skipping auto-withdraw: below threshold"
            );
            report.record_skip();
            continue;
        }

        match payouts
            .create_request(&settings.vendor, available, None, true, now)
            .await
        {
            Ok(request) => {
                info!(
                    vendor = %settings.vendor,
                    payout = %request.id,
                    amount = %available,
                    "auto-withdrawal created"
                );
                report.record_success();
            }
            // Expected skip conditions, not failures.
            Err(PayoutError::RateLimited { .. })
            | Err(PayoutError::RequestInFlight(_))
            | Err(PayoutError::Validation(_)) => report.record_skip(),
            Err(e) => {
                warn!(vendor = %settings.vendor, error = %e, "auto-withdrawal failed");
                report.record_failure();
            }
        }
    }

    info!(
        processed = report.processed,
        succeeded = report.succeeded,
        failed = report.failed,
        skipped = report.skipped,
        "auto-withdraw job finished"
    );
    Ok(report)
}
