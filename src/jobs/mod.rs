//! Scheduled reconciliation jobs.
//!
//! Each job is a plain async function taking an explicit `now`, so the
//! logic is unit-testable without a clock; `scheduler.rs` wraps them in
//! interval loops at the process boundary. A single entity's failure is
//! logged and counted, never aborting the batch.

pub mod aggregation;
pub mod auto_withdraw;
pub mod release;
pub mod scheduler;

pub use aggregation::run_aggregation_job;
pub use auto_withdraw::run_auto_withdraw_job;
pub use release::run_release_job;
pub use scheduler::spawn_scheduler;

/// Aggregate outcome of one job invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobReport {
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl JobReport {
    pub fn record_success(&mut self) {
        self.processed += 1;
        self.succeeded += 1;
    }

    pub fn record_failure(&mut self) {
        self.processed += 1;
        self.failed += 1;
    }

    pub fn record_skip(&mut self) {
        self.processed += 1;
        self.skipped += 1;
    }
}
