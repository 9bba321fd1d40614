//! Payout service: drives withdrawal requests through the review workflow.
//!
//! A request never exists without its wallet reservation: creation
//! reserves funds and inserts the request in one transaction. Rejection
//! and cancellation release the reservation atomically with the status
//! flip. A disbursement rail failure leaves the request in processing
//! with the reservation intact, since the money may have moved.

use crate::db::Repository;
use crate::disbursement::{DisbursementError, DisbursementRail};
use crate::domain::{
    Money, PayoutMethod, PayoutRequest, PayoutStatus, SafetyChecks, VendorId,
};
use crate::engine::{compute_fees, FeeSchedule};
use crate::ledger::wallet_service::{LedgerError, WalletOp, WalletService};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum PayoutError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("payout rate limit: next request allowed at {next_eligible}")]
    RateLimited { next_eligible: DateTime<Utc> },
    #[error("a payout request is already in flight: {0}")]
    RequestInFlight(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("illegal payout transition {from:?} -> {to:?}")]
    IllegalTransition {
        from: PayoutStatus,
        to: PayoutStatus,
    },
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
    #[error(transparent)]
    Disbursement(#[from] DisbursementError),
}

pub struct PayoutService {
    repo: Arc<Repository>,
    wallets: Arc<WalletService>,
    rail: Arc<dyn DisbursementRail>,
    fees: FeeSchedule,
    min_payout: Money,
    rate_limit: Duration,
    auto_approve: bool,
}

impl PayoutService {
    pub fn new(
        repo: Arc<Repository>,
        wallets: Arc<WalletService>,
        rail: Arc<dyn DisbursementRail>,
        fees: FeeSchedule,
        min_payout: Money,
        rate_limit: Duration,
        auto_approve: bool,
    ) -> Self {
        PayoutService {
            repo,
            wallets,
            rail,
            fees,
            min_payout,
            rate_limit,
            auto_approve,
        }
    }

    /// Create a payout request, reserving the funds in the same unit of
    /// work.
    pub async fn create_request(
        &self,
        vendor: &VendorId,
        amount: Money,
        method_override: Option<PayoutMethod>,
        auto_initiated: bool,
        now: DateTime<Utc>,
    ) -> Result<PayoutRequest, PayoutError> {
        if !amount.is_positive() {
            return Err(PayoutError::Validation("amount must be positive".into()));
        }
        if amount < self.min_payout {
            return Err(PayoutError::Validation(format!(
                "amount {} is below the minimum payout of {}",
                amount, self.min_payout
            )));
        }

        let settings = self.repo.get_payout_settings(vendor).await?;
        let (method, method_verified) = match method_override {
            // Ad-hoc methods have not been through verification.
            Some(m) => (m, false),
            None => match settings.as_ref().and_then(|s| s.default_method.clone()) {
                Some(m) => (
                    m,
                    settings.as_ref().map(|s| s.method_verified).unwrap_or(false),
                ),
                None => {
                    return Err(PayoutError::Validation(
                        "no payment method on file".into(),
                    ))
                }
            },
        };

        if let Some(last) = self.repo.latest_payout_created_at(vendor).await? {
            let next_eligible = last + self.rate_limit;
            if now < next_eligible {
                return Err(PayoutError::RateLimited { next_eligible });
            }
        }
        if self.repo.has_non_terminal_payout(vendor).await? {
            return Err(PayoutError::RequestInFlight(vendor.to_string()));
        }

        let available = self
            .repo
            .get_wallet(vendor)
            .await?
            .map(|w| w.available())
            .unwrap_or_else(Money::zero);
        let checks = SafetyChecks {
            no_open_disputes: !self.repo.has_open_disputes(vendor).await?,
            balance_verified: amount <= available,
            method_verified,
        };

        let fee_breakdown = compute_fees(&self.fees, &method, amount);
        let mut request = PayoutRequest::new(
            vendor.clone(),
            amount,
            fee_breakdown,
            method,
            checks,
            auto_initiated,
            now,
        );
        if auto_initiated && self.auto_approve && checks.all_passed() {
            request.transition(PayoutStatus::Approved, "system", None, now);
        }

        let lock = self.wallets.vendor_lock(vendor);
        let _guard = lock.lock().await;

        let mut tx = self.repo.pool().begin().await?;
        self.wallets
            .apply_conn(
                &mut tx,
                vendor,
                WalletOp::Reserve {
                    amount,
                    payout_id: request.id.clone(),
                },
                now,
            )
            .await?;
        self.repo.insert_payout_conn(&mut tx, &request).await?;
        tx.commit().await?;

        info!(
            vendor = %vendor,
            payout = %request.id,
            amount = %amount,
            status = request.status.as_str(),
            "payout request created"
        );
        Ok(request)
    }

    async fn load(&self, id: &str) -> Result<PayoutRequest, PayoutError> {
        self.repo
            .get_payout(id)
            .await?
            .ok_or_else(|| PayoutError::NotFound(format!("no payout request {}", id)))
    }

    /// Status-only transition (no wallet movement): under_review,
    /// approved, processing.
    async fn transition_only(
        &self,
        id: &str,
        to: PayoutStatus,
        actor: &str,
        note: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<PayoutRequest, PayoutError> {
        let mut request = self.load(id).await?;
        let from = request.status;
        if !request.transition(to, actor, note, now) {
            return Err(PayoutError::IllegalTransition { from, to });
        }
        let mut conn = self.repo.pool().acquire().await?;
        self.repo.update_payout_conn(&mut conn, &request).await?;
        Ok(request)
    }

    pub async fn mark_under_review(
        &self,
        id: &str,
        actor: &str,
        now: DateTime<Utc>,
    ) -> Result<PayoutRequest, PayoutError> {
        self.transition_only(id, PayoutStatus::UnderReview, actor, None, now)
            .await
    }

    pub async fn approve(
        &self,
        id: &str,
        actor: &str,
        now: DateTime<Utc>,
    ) -> Result<PayoutRequest, PayoutError> {
        self.transition_only(id, PayoutStatus::Approved, actor, None, now)
            .await
    }

    /// Release the reservation atomically with a terminal status flip.
    async fn release_and_transition(
        &self,
        id: &str,
        to: PayoutStatus,
        actor: &str,
        note: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<PayoutRequest, PayoutError> {
        let mut request = self.load(id).await?;
        let from = request.status;
        if !request.transition(to, actor, note, now) {
            return Err(PayoutError::IllegalTransition { from, to });
        }

        let lock = self.wallets.vendor_lock(&request.vendor);
        let _guard = lock.lock().await;

        let mut tx = self.repo.pool().begin().await?;
        self.wallets
            .apply_conn(
                &mut tx,
                &request.vendor,
                WalletOp::CancelPayout {
                    amount: request.amount,
                    payout_id: request.id.clone(),
                },
                now,
            )
            .await?;
        self.repo.update_payout_conn(&mut tx, &request).await?;
        tx.commit().await?;
        Ok(request)
    }

    pub async fn reject(
        &self,
        id: &str,
        actor: &str,
        note: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<PayoutRequest, PayoutError> {
        self.release_and_transition(id, PayoutStatus::Rejected, actor, note, now)
            .await
    }

    /// Cancel a request. Vendors may cancel only while the request is
    /// requested/under review; admins may cancel any non-terminal request
    /// not yet processing.
    pub async fn cancel(
        &self,
        id: &str,
        actor: &str,
        vendor_initiated: bool,
        now: DateTime<Utc>,
    ) -> Result<PayoutRequest, PayoutError> {
        let request = self.load(id).await?;
        if vendor_initiated && !request.status.vendor_cancellable() {
            return Err(PayoutError::IllegalTransition {
                from: request.status,
                to: PayoutStatus::Cancelled,
            });
        }
        self.release_and_transition(id, PayoutStatus::Cancelled, actor, None, now)
            .await
    }

    /// Execute an approved request against the disbursement rail and
    /// complete it. On a rail error the request stays in processing and
    /// the reservation is kept.
    pub async fn process(
        &self,
        id: &str,
        actor: &str,
        now: DateTime<Utc>,
    ) -> Result<PayoutRequest, PayoutError> {
        let request = self
            .transition_only(id, PayoutStatus::Processing, actor, None, now)
            .await?;

        let receipt = match self
            .rail
            .execute(&request.id, request.fees.net_amount, &request.method)
            .await
        {
            Ok(receipt) => receipt,
            Err(e) => {
                warn!(
                    payout = %request.id,
                    error = %e,
                    "disbursement failed; request stays in processing"
                );
                return Err(e.into());
            }
        };

        self.complete(id, Some(receipt.external_ref), "system", now)
            .await
    }

    /// Confirm disbursement: debit the reservation and record the
    /// external reference.
    pub async fn complete(
        &self,
        id: &str,
        external_ref: Option<String>,
        actor: &str,
        now: DateTime<Utc>,
    ) -> Result<PayoutRequest, PayoutError> {
        let mut request = self.load(id).await?;
        let from = request.status;
        if !request.transition(PayoutStatus::Completed, actor, None, now) {
            return Err(PayoutError::IllegalTransition {
                from,
                to: PayoutStatus::Completed,
            });
        }
        if external_ref.is_some() {
            request.external_ref = external_ref;
        }

        let lock = self.wallets.vendor_lock(&request.vendor);
        let _guard = lock.lock().await;

        let mut tx = self.repo.pool().begin().await?;
        self.wallets
            .apply_conn(
                &mut tx,
                &request.vendor,
                WalletOp::CompletePayout {
                    amount: request.amount,
                    payout_id: request.id.clone(),
                },
                now,
            )
            .await?;
        self.repo.update_payout_conn(&mut tx, &request).await?;
        tx.commit().await?;

        info!(
            vendor = %request.vendor,
            payout = %request.id,
            net = %request.fees.net_amount,
            "payout completed"
        );
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use crate::disbursement::MockDisbursementRail;
    use crate::domain::OrderId;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn m(s: &str) -> Money {
        Money::from_str_canonical(s).unwrap()
    }

    fn at(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).unwrap()
    }

    fn schedule() -> FeeSchedule {
        FeeSchedule {
            platform_fee_pct: m("0"),
            bank_flat_fee: m("15"),
            mobile_pct: m("2"),
            mobile_fee_cap: m("500"),
            card_pct: m("2.9"),
            card_flat_fee: m("0.30"),
        }
    }

    struct Harness {
        repo: Arc<Repository>,
        wallets: Arc<WalletService>,
        payouts: PayoutService,
        rail: Arc<MockDisbursementRail>,
        _temp: TempDir,
    }

    async fn setup(auto_approve: bool) -> Harness {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir
            .path()
            .join("test.db")
            .to_string_lossy()
            .to_string();
        let pool = init_db(&db_path).await.expect("init_db failed");
        let repo = Arc::new(Repository::new(pool));
        let wallets = Arc::new(WalletService::new(repo.clone(), Duration::days(7)));
        let rail = Arc::new(MockDisbursementRail::new());
        let payouts = PayoutService::new(
            repo.clone(),
            wallets.clone(),
            rail.clone(),
            schedule(),
            m("50"),
            Duration::hours(24),
            auto_approve,
        );
        Harness {
            repo,
            wallets,
            payouts,
            rail,
            _temp: temp_dir,
        }
    }

    /// Seed a wallet with released (available) funds.
    async fn fund(h: &Harness, vendor: &VendorId, amount: &str) {
        let hold = h
            .wallets
            .credit_pending_earnings(vendor, &OrderId::new("o-seed"), m(amount), m("1"), at(1_000))
            .await
            .unwrap();
        h.wallets.release_hold(&hold.id, at(2_000)).await.unwrap();
    }

    fn mobile_settings(vendor: &VendorId) -> crate::domain::PayoutSettings {
        crate::domain::PayoutSettings {
            vendor: vendor.clone(),
            auto_withdraw_enabled: false,
            auto_withdraw_threshold: m("100"),
            default_method: Some(PayoutMethod::MobileWallet {
                provider: "mpesa".to_string(),
                phone: "+254700000000".to_string(),
            }),
            method_verified: true,
            updated_at: at(1_000),
        }
    }

    #[tokio::test]
    async fn test_create_reserves_funds() {
        let h = setup(false).await;
        let vendor = VendorId::new("v-1");
        fund(&h, &vendor, "9000").await;
        h.repo.upsert_payout_settings(&mobile_settings(&vendor)).await.unwrap();

        let request = h
            .payouts
            .create_request(&vendor, m("9000"), None, false, at(10_000))
            .await
            .unwrap();
        assert_eq!(request.status, PayoutStatus::Requested);
        assert_eq!(request.fees.processing_fee, m("180"));
        assert_eq!(request.fees.net_amount, m("8820"));

        let wallet = h.repo.get_wallet(&vendor).await.unwrap().unwrap();
        assert_eq!(wallet.available(), Money::zero());
        assert_eq!(wallet.reserved(), m("9000"));
    }

    #[tokio::test]
    async fn test_insufficient_balance_leaves_no_request() {
        let h = setup(false).await;
        let vendor = VendorId::new("v-1");
        fund(&h, &vendor, "100").await;
        h.repo.upsert_payout_settings(&mobile_settings(&vendor)).await.unwrap();

        let err = h
            .payouts
            .create_request(&vendor, m("500"), None, false, at(10_000))
            .await
            .unwrap_err();
        assert!(matches!(err, PayoutError::Ledger(_)));

        // No orphaned request without its reservation.
        assert!(h.repo.list_payouts_for_vendor(&vendor).await.unwrap().is_empty());
        let wallet = h.repo.get_wallet(&vendor).await.unwrap().unwrap();
        assert_eq!(wallet.available(), m("100"));
        assert_eq!(wallet.reserved(), Money::zero());
    }

    #[tokio::test]
    async fn test_rate_limit_carries_next_eligible() {
        let h = setup(false).await;
        let vendor = VendorId::new("v-1");
        fund(&h, &vendor, "9000").await;
        h.repo.upsert_payout_settings(&mobile_settings(&vendor)).await.unwrap();

        let first = h
            .payouts
            .create_request(&vendor, m("100"), None, false, at(10_000))
            .await
            .unwrap();
        h.payouts.cancel(&first.id, "vendor", true, at(20_000)).await.unwrap();

        // Second request 1h later is still inside the 24h window.
        let err = h
            .payouts
            .create_request(
                &vendor,
                m("100"),
                None,
                false,
                at(10_000) + Duration::hours(1),
            )
            .await
            .unwrap_err();
        match err {
            PayoutError::RateLimited { next_eligible } => {
                assert_eq!(next_eligible, at(10_000) + Duration::hours(24));
            }
            other => panic!("expected RateLimited, got {:?}", other),
        }

        // After the window it goes through.
        let ok = h
            .payouts
            .create_request(
                &vendor,
                m("100"),
                None,
                false,
                at(10_000) + Duration::hours(25),
            )
            .await;
        assert!(ok.is_ok());
    }

    #[tokio::test]
    async fn test_non_terminal_request_blocks_second() {
        let h = setup(false).await;
        let vendor = VendorId::new("v-1");
        fund(&h, &vendor, "9000").await;
        h.repo.upsert_payout_settings(&mobile_settings(&vendor)).await.unwrap();

        h.payouts
            .create_request(&vendor, m("100"), None, false, at(10_000))
            .await
            .unwrap();
        let err = h
            .payouts
            .create_request(
                &vendor,
                m("100"),
                None,
                false,
                at(10_000) + Duration::hours(48),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PayoutError::RequestInFlight(_)));
    }

    #[tokio::test]
    async fn test_full_workflow_mobile_two_percent() {
        let h = setup(false).await;
        let vendor = VendorId::new("v-1");
        fund(&h, &vendor, "9000").await;
        h.repo.upsert_payout_settings(&mobile_settings(&vendor)).await.unwrap();

        let request = h
            .payouts
            .create_request(&vendor, m("9000"), None, false, at(10_000))
            .await
            .unwrap();
        h.payouts.mark_under_review(&request.id, "admin", at(11_000)).await.unwrap();
        h.payouts.approve(&request.id, "admin", at(12_000)).await.unwrap();
        let done = h.payouts.process(&request.id, "admin", at(13_000)).await.unwrap();

        assert_eq!(done.status, PayoutStatus::Completed);
        assert!(done.external_ref.is_some());
        assert_eq!(h.rail.executions(), vec![(request.id.clone(), m("8820"))]);

        let wallet = h.repo.get_wallet(&vendor).await.unwrap().unwrap();
        assert_eq!(wallet.reserved(), Money::zero());
        assert_eq!(wallet.total_withdrawn(), m("9000"));

        let report = h.wallets.reconcile(&vendor).await.unwrap();
        assert!(report.consistent, "detail: {:?}", report.detail);
    }

    #[tokio::test]
    async fn test_reject_releases_reservation() {
        let h = setup(false).await;
        let vendor = VendorId::new("v-1");
        fund(&h, &vendor, "500").await;
        h.repo.upsert_payout_settings(&mobile_settings(&vendor)).await.unwrap();

        let request = h
            .payouts
            .create_request(&vendor, m("500"), None, false, at(10_000))
            .await
            .unwrap();
        h.payouts
            .reject(&request.id, "admin", Some("docs missing".into()), at(11_000))
            .await
            .unwrap();

        let wallet = h.repo.get_wallet(&vendor).await.unwrap().unwrap();
        assert_eq!(wallet.available(), m("500"));
        assert_eq!(wallet.reserved(), Money::zero());
    }

    #[tokio::test]
    async fn test_vendor_cannot_cancel_approved() {
        let h = setup(false).await;
        let vendor = VendorId::new("v-1");
        fund(&h, &vendor, "500").await;
        h.repo.upsert_payout_settings(&mobile_settings(&vendor)).await.unwrap();

        let request = h
            .payouts
            .create_request(&vendor, m("500"), None, false, at(10_000))
            .await
            .unwrap();
        h.payouts.approve(&request.id, "admin", at(11_000)).await.unwrap();

        let err = h
            .payouts
            .cancel(&request.id, "vendor", true, at(12_000))
            .await
            .unwrap_err();
        assert!(matches!(err, PayoutError::IllegalTransition { .. }));

        // Admin cancellation still releases the reservation.
        h.payouts.cancel(&request.id, "admin", false, at(13_000)).await.unwrap();
        let wallet = h.repo.get_wallet(&vendor).await.unwrap().unwrap();
        assert_eq!(wallet.available(), m("500"));
    }

    #[tokio::test]
    async fn test_rail_failure_keeps_reservation() {
        let h = setup(false).await;
        let vendor = VendorId::new("v-1");
        fund(&h, &vendor, "500").await;
        h.repo.upsert_payout_settings(&mobile_settings(&vendor)).await.unwrap();

        let request = h
            .payouts
            .create_request(&vendor, m("500"), None, false, at(10_000))
            .await
            .unwrap();
        h.payouts.approve(&request.id, "admin", at(11_000)).await.unwrap();

        h.rail
            .fail_with(DisbursementError::NetworkError("rail down".into()));
        let err = h.payouts.process(&request.id, "admin", at(12_000)).await.unwrap_err();
        assert!(matches!(err, PayoutError::Disbursement(_)));

        let stuck = h.repo.get_payout(&request.id).await.unwrap().unwrap();
        assert_eq!(stuck.status, PayoutStatus::Processing);
        let wallet = h.repo.get_wallet(&vendor).await.unwrap().unwrap();
        assert_eq!(wallet.reserved(), m("500"));

        // Manual completion after escalation.
        h.rail.succeed();
        let done = h
            .payouts
            .complete(&request.id, Some("manual-ref".into()), "admin", at(13_000))
            .await
            .unwrap();
        assert_eq!(done.status, PayoutStatus::Completed);
        assert_eq!(done.external_ref.as_deref(), Some("manual-ref"));
    }

    #[tokio::test]
    async fn test_auto_approve_fast_path() {
        let h = setup(true).await;
        let vendor = VendorId::new("v-1");
        fund(&h, &vendor, "500").await;
        h.repo.upsert_payout_settings(&mobile_settings(&vendor)).await.unwrap();

        let request = h
            .payouts
            .create_request(&vendor, m("500"), None, true, at(10_000))
            .await
            .unwrap();
        assert_eq!(request.status, PayoutStatus::Approved);
        assert_eq!(request.status_history.len(), 2);
    }

    #[tokio::test]
    async fn test_below_minimum_rejected() {
        let h = setup(false).await;
        let vendor = VendorId::new("v-1");
        fund(&h, &vendor, "500").await;
        h.repo.upsert_payout_settings(&mobile_settings(&vendor)).await.unwrap();

        let err = h
            .payouts
            .create_request(&vendor, m("10"), None, false, at(10_000))
            .await
            .unwrap_err();
        assert!(matches!(err, PayoutError::Validation(_)));
    }

    #[tokio::test]
    async fn test_missing_method_rejected() {
        let h = setup(false).await;
        let vendor = VendorId::new("v-1");
        fund(&h, &vendor, "500").await;

        let err = h
            .payouts
            .create_request(&vendor, m("100"), None, false, at(10_000))
            .await
            .unwrap_err();
        assert!(matches!(err, PayoutError::Validation(_)));
    }
}
