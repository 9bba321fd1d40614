//! Mock disbursement rail for testing without network calls.

use super::{DisbursementError, DisbursementRail, DisbursementReceipt};
use crate::domain::{Money, PayoutMethod};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Mock rail that succeeds by default and records every execution.
#[derive(Debug, Default)]
pub struct MockDisbursementRail {
    fail_with: Mutex<Option<DisbursementError>>,
    executed: Mutex<Vec<(String, Money)>>,
    counter: AtomicU64,
}

impl MockDisbursementRail {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent execution fail with `error`.
    pub fn fail_with(&self, error: DisbursementError) {
        *self.fail_with.lock().expect("mock lock poisoned") = Some(error);
    }

    /// Restore the default success behavior.
    pub fn succeed(&self) {
        *self.fail_with.lock().expect("mock lock poisoned") = None;
    }

    /// Payout ids and net amounts this rail has executed.
    pub fn executions(&self) -> Vec<(String, Money)> {
        self.executed.lock().expect("mock lock poisoned").clone()
    }
}

#[async_trait]
impl DisbursementRail for MockDisbursementRail {
    async fn execute(
        &self,
        payout_id: &str,
        net_amount: Money,
        _method: &PayoutMethod,
    ) -> Result<DisbursementReceipt, DisbursementError> {
        if let Some(error) = self.fail_with.lock().expect("mock lock poisoned").clone() {
            return Err(error);
        }
        self.executed
            .lock()
            .expect("mock lock poisoned")
            .push((payout_id.to_string(), net_amount));
        let seq = self.counter.fetch_add(1, Ordering::SeqCst);
        Ok(DisbursementReceipt {
            external_ref: format!("mock-ref-{}-{}", payout_id, seq),
        })
    }
}
