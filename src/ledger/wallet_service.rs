//! Wallet service: exclusive write access to vendor wallets.
//!
//! Every mutation runs under the vendor's async lock and inside one sqlx
//! transaction: load balances, apply the domain transition, persist, and
//! append exactly one ledger row whose snapshot is the post-mutation
//! balances. Different vendors never block each other.

use crate::db::Repository;
use crate::domain::{
    BalanceSnapshot, Money, TxCategory, TxReference, TxType, VendorId, VendorWallet, WalletError,
    WalletTransaction,
};
use chrono::{DateTime, Duration, Utc};
use sqlx::sqlite::SqliteConnection;
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use thiserror::Error;
use tokio::sync::Mutex as TokioMutex;
use tracing::error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error(transparent)]
    Wallet(#[from] WalletError),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
    #[error("not found: {0}")]
    NotFound(String),
}

/// A balance mutation plus the ledger row it must produce.
#[derive(Debug, Clone)]
pub enum WalletOp {
    /// Earnings enter the pending bucket on fulfillment; the sale hold
    /// matures at `release_at`.
    CreditPending {
        earning: Money,
        commission: Money,
        reference: TxReference,
        release_at: DateTime<Utc>,
    },
    /// A matured sale hold moves pending funds to available.
    ReleaseHold { amount: Money, hold_id: String },
    /// Available funds move to reserved for an in-flight payout.
    Reserve { amount: Money, payout_id: String },
    /// Reserved funds leave the wallet on disbursement confirmation.
    CompletePayout { amount: Money, payout_id: String },
    /// Reserved funds return to available on rejection/cancellation.
    CancelPayout { amount: Money, payout_id: String },
    /// A refund debits available first, then pending.
    Refund {
        amount: Money,
        reference: TxReference,
    },
}

/// Outcome of a ledger reconciliation check.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    pub vendor: VendorId,
    pub transaction_count: usize,
    /// Latest ledger row's snapshot equals the stored balances.
    pub latest_snapshot_matches: bool,
    /// Replaying every row from zero reproduces the stored balances.
    pub replay_matches: bool,
    pub consistent: bool,
    pub detail: Option<String>,
}

pub struct WalletService {
    repo: Arc<Repository>,
    holding_period: Duration,
    locks: StdMutex<HashMap<VendorId, Arc<TokioMutex<()>>>>,
}

impl WalletService {
    pub fn new(repo: Arc<Repository>, holding_period: Duration) -> Self {
        WalletService {
            repo,
            holding_period,
            locks: StdMutex::new(HashMap::new()),
        }
    }

    pub fn holding_period(&self) -> Duration {
        self.holding_period
    }

    /// The vendor's mutation lock. Payout flows acquire it to compose
    /// wallet mutations with request writes in one transaction.
    pub fn vendor_lock(&self, vendor: &VendorId) -> Arc<TokioMutex<()>> {
        let mut locks = self.locks.lock().expect("wallet lock registry poisoned");
        locks
            .entry(vendor.clone())
            .or_insert_with(|| Arc::new(TokioMutex::new(())))
            .clone()
    }

    /// Apply one wallet operation on the caller's connection.
    ///
    /// Caller must hold the vendor lock and run inside a transaction;
    /// this loads the wallet, applies the transition, persists the new
    /// balances, and appends the ledger row.
    pub async fn apply_conn(
        &self,
        conn: &mut SqliteConnection,
        vendor: &VendorId,
        op: WalletOp,
        now: DateTime<Utc>,
    ) -> Result<WalletTransaction, LedgerError> {
        let mut wallet = match self.repo.get_wallet_conn(conn, vendor).await? {
            Some(w) => w,
            None => match &op {
                // Wallets are created lazily on the first earning event.
                WalletOp::CreditPending { .. } => VendorWallet::new(vendor.clone(), now),
                _ => {
                    return Err(LedgerError::NotFound(format!(
                        "no wallet for vendor {}",
                        vendor
                    )))
                }
            },
        };

        let tx = match op {
            WalletOp::CreditPending {
                earning,
                commission,
                reference,
                release_at,
            } => {
                let snapshot = wallet.credit_pending(earning, commission, now)?;
                WalletTransaction::new(
                    vendor.clone(),
                    TxType::Hold,
                    TxCategory::Sale,
                    earning,
                    snapshot,
                    Some(reference),
                    None,
                    now,
                )
                .with_release_at(release_at)
            }
            WalletOp::ReleaseHold { amount, hold_id } => {
                let snapshot = wallet.release_pending_to_available(amount, now)?;
                WalletTransaction::new(
                    vendor.clone(),
                    TxType::Release,
                    TxCategory::Sale,
                    amount,
                    snapshot,
                    Some(TxReference::transaction(&hold_id)),
                    None,
                    now,
                )
            }
            WalletOp::Reserve { amount, payout_id } => {
                let snapshot = wallet.reserve_for_payout(amount, now)?;
                WalletTransaction::new(
                    vendor.clone(),
                    TxType::Hold,
                    TxCategory::Payout,
                    amount,
                    snapshot,
                    Some(TxReference::payout(&payout_id)),
                    None,
                    now,
                )
            }
            WalletOp::CompletePayout { amount, payout_id } => {
                let snapshot = wallet.complete_payout(amount, now)?;
                WalletTransaction::new(
                    vendor.clone(),
                    TxType::Debit,
                    TxCategory::Payout,
                    amount,
                    snapshot,
                    Some(TxReference::payout(&payout_id)),
                    None,
                    now,
                )
            }
            WalletOp::CancelPayout { amount, payout_id } => {
                let snapshot = wallet.cancel_payout(amount, now)?;
                WalletTransaction::new(
                    vendor.clone(),
                    TxType::Release,
                    TxCategory::Payout,
                    amount,
                    snapshot,
                    Some(TxReference::payout(&payout_id)),
                    None,
                    now,
                )
            }
            WalletOp::Refund { amount, reference } => {
                let snapshot = wallet.process_refund(amount, now)?;
                WalletTransaction::new(
                    vendor.clone(),
                    TxType::Refund,
                    TxCategory::Refund,
                    amount,
                    snapshot,
                    Some(reference),
                    None,
                    now,
                )
            }
        };

        self.repo.upsert_wallet_conn(conn, &wallet).await?;
        self.repo.insert_transaction_conn(conn, &tx).await?;
        Ok(tx)
    }

    /// Credit a vendor's pending earnings for a fulfilled order, flipping
    /// that order's pending commission entries to credited in the same
    /// unit of work.
    pub async fn credit_pending_earnings(
        &self,
        vendor: &VendorId,
        order_id: &crate::domain::OrderId,
        earning: Money,
        commission: Money,
        now: DateTime<Utc>,
    ) -> Result<WalletTransaction, LedgerError> {
        let lock = self.vendor_lock(vendor);
        let _guard = lock.lock().await;

        let mut tx = self.repo.pool().begin().await?;
        let ledger_tx = self
            .apply_conn(
                &mut tx,
                vendor,
                WalletOp::CreditPending {
                    earning,
                    commission,
                    reference: TxReference::order(order_id.as_str()),
                    release_at: now + self.holding_period,
                },
                now,
            )
            .await?;
        self.repo
            .update_order_entry_status_conn(
                &mut tx,
                order_id,
                vendor,
                crate::domain::EntryStatus::Pending,
                crate::domain::EntryStatus::Credited,
                now,
            )
            .await?;
        tx.commit().await?;
        Ok(ledger_tx)
    }

    /// Release one matured sale hold. Returns false when the hold was
    /// already released (idempotent no-op).
    pub async fn release_hold(
        &self,
        hold_id: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, LedgerError> {
        let hold = self
            .repo
            .get_transaction(hold_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("no transaction {}", hold_id)))?;
        if hold.tx_type != TxType::Hold || hold.release_at.is_none() {
            return Err(LedgerError::Validation(format!(
                "transaction {} is not a releasable hold",
                hold_id
            )));
        }
        if hold.released_at.is_some() {
            return Ok(false);
        }

        let lock = self.vendor_lock(&hold.vendor);
        let _guard = lock.lock().await;

        let mut tx = self.repo.pool().begin().await?;
        // The released_at guard is re-checked under the transaction, so a
        // concurrent job run claims each hold at most once.
        if !self.repo.mark_hold_released_conn(&mut tx, hold_id, now).await? {
            return Ok(false);
        }
        self.apply_conn(
            &mut tx,
            &hold.vendor,
            WalletOp::ReleaseHold {
                amount: hold.amount,
                hold_id: hold_id.to_string(),
            },
            now,
        )
        .await?;
        tx.commit().await?;
        Ok(true)
    }

    /// Process a refund against a vendor's wallet.
    pub async fn process_refund(
        &self,
        vendor: &VendorId,
        refund_ref: TxReference,
        amount: Money,
        now: DateTime<Utc>,
    ) -> Result<WalletTransaction, LedgerError> {
        let lock = self.vendor_lock(vendor);
        let _guard = lock.lock().await;

        let mut tx = self.repo.pool().begin().await?;
        let result = self
            .apply_conn(
                &mut tx,
                vendor,
                WalletOp::Refund {
                    amount,
                    reference: refund_ref,
                },
                now,
            )
            .await;
        match result {
            Ok(ledger_tx) => {
                tx.commit().await?;
                Ok(ledger_tx)
            }
            Err(e) => {
                if let LedgerError::Wallet(WalletError::Inconsistent { have, need }) = &e {
                    error!(
                        vendor = %vendor,
                        have = %have,
                        need = %need,
                        "refund exceeds wallet coverage; flagging for operator review"
                    );
                }
                Err(e)
            }
        }
    }

    /// Verify the ledger against the stored wallet balances.
    pub async fn reconcile(&self, vendor: &VendorId) -> Result<ReconcileReport, LedgerError> {
        let transactions = self.repo.all_transactions_asc(vendor).await?;
        let wallet = self.repo.get_wallet(vendor).await?;

        let stored = match &wallet {
            Some(w) => w.snapshot(),
            None => BalanceSnapshot {
                available: Money::zero(),
                pending: Money::zero(),
                reserved: Money::zero(),
            },
        };

        let latest_snapshot_matches = transactions
            .last()
            .map(|tx| tx.balance_after == stored)
            .unwrap_or(true);

        let (replayed, detail) = replay(&transactions);
        let replay_matches = detail.is_none() && replayed == stored;
        let detail = detail.or_else(|| {
            if replayed == stored {
                None
            } else {
                Some(format!(
                    "replay ended at available={} pending={} reserved={}, stored available={} pending={} reserved={}",
                    replayed.available,
                    replayed.pending,
                    replayed.reserved,
                    stored.available,
                    stored.pending,
                    stored.reserved,
                ))
            }
        });

        let consistent = latest_snapshot_matches && replay_matches;
        if !consistent {
            error!(
                vendor = %vendor,
                detail = detail.as_deref().unwrap_or("unknown"),
                "wallet ledger reconciliation failed"
            );
        }

        Ok(ReconcileReport {
            vendor: vendor.clone(),
            transaction_count: transactions.len(),
            latest_snapshot_matches,
            replay_matches,
            consistent,
            detail,
        })
    }
}

/// Replay a vendor's full ledger from zero, checking each row's own
/// snapshot along the way. Returns the final state and the first
/// mismatch, if any.
fn replay(transactions: &[WalletTransaction]) -> (BalanceSnapshot, Option<String>) {
    let mut state = BalanceSnapshot {
        available: Money::zero(),
        pending: Money::zero(),
        reserved: Money::zero(),
    };
    let mut detail = None;

    for tx in transactions {
        match (tx.tx_type, tx.category) {
            (TxType::Hold, TxCategory::Sale) => {
                state.pending += tx.amount;
            }
            (TxType::Release, TxCategory::Sale) => {
                state.pending -= tx.amount;
                state.available += tx.amount;
            }
            (TxType::Hold, TxCategory::Payout) => {
                state.available -= tx.amount;
                state.reserved += tx.amount;
            }
            (TxType::Debit, TxCategory::Payout) => {
                state.reserved -= tx.amount;
            }
            (TxType::Release, TxCategory::Payout) => {
                state.reserved -= tx.amount;
                state.available += tx.amount;
            }
            (TxType::Refund, _) => {
                let from_available = tx.amount.min(state.available);
                state.available -= from_available;
                state.pending -= tx.amount - from_available;
            }
            (TxType::Credit, _) | (TxType::Adjustment, _) => {
                state.available += tx.amount;
            }
            other => {
                if detail.is_none() {
                    detail = Some(format!(
                        "transaction {} has unexpected shape {:?}",
                        tx.id, other
                    ));
                }
            }
        }

        if detail.is_none() && tx.balance_after != state {
            detail = Some(format!(
                "transaction {} snapshot disagrees with replayed state",
                tx.id
            ));
        }
    }

    (state, detail)
}
