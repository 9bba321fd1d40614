pub mod health;
pub mod orders;
pub mod payouts;
pub mod rules;
pub mod summaries;
pub mod wallet;

use crate::config::Config;
use crate::db::Repository;
use crate::domain::FinancialSummary;
use crate::ledger::{CommissionService, PayoutService, WalletService};
use axum::{
    routing::{get, post, put},
    Router,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tower_http::cors::{Any, CorsLayer};

/// Read cache for summary listings. Entries expire after a short TTL and
/// the whole cache is dropped on wallet-affecting events.
pub struct SummaryCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, (Instant, Vec<FinancialSummary>)>>,
}

impl SummaryCache {
    pub fn new(ttl: Duration) -> Self {
        SummaryCache {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: &str) -> Option<Vec<FinancialSummary>> {
        let entries = self.entries.lock().expect("summary cache poisoned");
        entries.get(key).and_then(|(stored_at, value)| {
            if stored_at.elapsed() < self.ttl {
                Some(value.clone())
            } else {
                None
            }
        })
    }

    pub fn put(&self, key: String, value: Vec<FinancialSummary>) {
        let mut entries = self.entries.lock().expect("summary cache poisoned");
        entries.insert(key, (Instant::now(), value));
    }

    pub fn invalidate(&self) {
        self.entries.lock().expect("summary cache poisoned").clear();
    }
}

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub config: Config,
    pub commissions: Arc<CommissionService>,
    pub wallets: Arc<WalletService>,
    pub payouts: Arc<PayoutService>,
    pub summary_cache: Arc<SummaryCache>,
}

impl AppState {
    pub fn new(
        repo: Arc<Repository>,
        config: Config,
        commissions: Arc<CommissionService>,
        wallets: Arc<WalletService>,
        payouts: Arc<PayoutService>,
    ) -> Self {
        let ttl = Duration::from_secs(config.summary_cache_ttl_secs);
        Self {
            repo,
            config,
            commissions,
            wallets,
            payouts,
            summary_cache: Arc::new(SummaryCache::new(ttl)),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/v1/orders/commissions", post(orders::record_commissions))
        .route("/v1/orders/fulfill", post(orders::fulfill_order))
        .route("/v1/orders/refund", post(orders::refund_order))
        .route("/v1/earnings", get(orders::list_earnings))
        .route("/v1/wallet", get(wallet::get_wallet))
        .route("/v1/wallet/transactions", get(wallet::get_transactions))
        .route(
            "/v1/wallet/transactions/export",
            get(wallet::export_transactions),
        )
        .route("/v1/payouts", post(payouts::create_payout).get(payouts::list_vendor_payouts))
        .route("/v1/payouts/:id/cancel", post(payouts::cancel_payout))
        .route(
            "/v1/payout-settings",
            get(payouts::get_settings).put(payouts::put_settings),
        )
        .route("/v1/admin/payouts", get(payouts::list_admin_payouts))
        .route("/v1/admin/payouts/:id/review", post(payouts::review_payout))
        .route("/v1/admin/payouts/:id/approve", post(payouts::approve_payout))
        .route("/v1/admin/payouts/:id/reject", post(payouts::reject_payout))
        .route("/v1/admin/payouts/:id/process", post(payouts::process_payout))
        .route("/v1/admin/payouts/:id/complete", post(payouts::complete_payout))
        .route(
            "/v1/admin/commission-rules",
            get(rules::list_rules).post(rules::create_rule),
        )
        .route("/v1/admin/commission-rules/:id", put(rules::update_rule))
        .route("/v1/admin/summaries/run", post(summaries::run_aggregation))
        .route("/v1/admin/summaries", get(summaries::list_summaries))
        .route(
            "/v1/admin/wallets/:vendor/reconcile",
            get(wallet::reconcile_wallet),
        )
        .layer(cors)
        .with_state(state)
}
