//! Thin interval scheduler around the reconciliation jobs.
//!
//! Jobs run on independent timers and tolerate overlap: the per-row
//! claim guards (hold `released_at`, non-terminal request checks,
//! summary upserts) make concurrent invocations safe without a global
//! lock.

use crate::db::Repository;
use crate::domain::SummaryPeriod;
use crate::jobs::{run_aggregation_job, run_auto_withdraw_job, run_release_job};
use crate::ledger::{PayoutService, WalletService};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::error;

const RELEASE_INTERVAL: Duration = Duration::from_secs(60 * 60);
const AUTO_WITHDRAW_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);
const AGGREGATION_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Spawn the three periodic job loops. Handles are returned so the
/// binary can keep them alive; dropping them aborts nothing.
pub fn spawn_scheduler(
    repo: Arc<Repository>,
    wallets: Arc<WalletService>,
    payouts: Arc<PayoutService>,
) -> Vec<JoinHandle<()>> {
    let mut handles = Vec::new();

    {
        let repo = repo.clone();
        let wallets = wallets.clone();
        handles.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval(RELEASE_INTERVAL);
            loop {
                interval.tick().await;
                if let Err(e) = run_release_job(&repo, &wallets, Utc::now()).await {
                    error!(error = %e, "release job failed");
                }
            }
        }));
    }

    {
        let repo = repo.clone();
        handles.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval(AUTO_WITHDRAW_INTERVAL);
            loop {
                interval.tick().await;
                if let Err(e) = run_auto_withdraw_job(&repo, &payouts, Utc::now()).await {
                    error!(error = %e, "auto-withdraw job failed");
                }
            }
        }));
    }

    {
        handles.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval(AGGREGATION_INTERVAL);
            loop {
                interval.tick().await;
                let now = Utc::now();
                for period in [
                    SummaryPeriod::Daily,
                    SummaryPeriod::Weekly,
                    SummaryPeriod::Monthly,
                    SummaryPeriod::Yearly,
                ] {
                    if let Err(e) = run_aggregation_job(&repo, period, now, now).await {
                        error!(period = period.as_str(), error = %e, "aggregation job failed");
                    }
                }
            }
        }));
    }

    handles
}
