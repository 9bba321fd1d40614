//! Shared test harness: a full application over a TempDir SQLite database
//! with the mock disbursement rail.

// Not every test binary uses every helper.
#![allow(dead_code)]

use std::sync::Arc;
use tempfile::TempDir;
use vendorpay::api::{self, AppState};
use vendorpay::config::Config;
use vendorpay::db::init_db;
use vendorpay::disbursement::MockDisbursementRail;
use vendorpay::domain::Money;
use vendorpay::ledger::{CommissionService, PayoutService, WalletService};
use vendorpay::Repository;

pub struct TestApp {
    pub router: axum::Router,
    pub repo: Arc<Repository>,
    pub wallets: Arc<WalletService>,
    pub payouts: Arc<PayoutService>,
    pub commissions: Arc<CommissionService>,
    pub rail: Arc<MockDisbursementRail>,
    pub _temp: TempDir,
}

pub fn m(s: &str) -> Money {
    Money::from_str_canonical(s).unwrap()
}

pub fn test_config(db_path: String) -> Config {
    Config {
        port: 0,
        database_path: db_path,
        gateway_url: "http://rail.invalid".to_string(),
        ledger_currency: "USD".to_string(),
        holding_period_days: 7,
        default_commission_pct: m("10"),
        min_payout_amount: m("50"),
        payout_rate_limit_hours: 24,
        auto_withdraw_auto_approve: false,
        platform_fee_pct: m("0"),
        bank_flat_fee: m("15"),
        mobile_pct: m("2"),
        mobile_fee_cap: m("500"),
        card_pct: m("2.9"),
        card_flat_fee: m("0.30"),
        summary_cache_ttl_secs: 60,
    }
}

pub async fn setup_test_app() -> TestApp {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir
        .path()
        .join("test.db")
        .to_string_lossy()
        .to_string();

    let pool = init_db(&db_path).await.expect("init_db failed");
    let repo = Arc::new(Repository::new(pool));
    let config = test_config(db_path);

    let rail = Arc::new(MockDisbursementRail::new());
    let commissions = Arc::new(CommissionService::new(
        repo.clone(),
        config.default_commission_pct,
    ));
    let wallets = Arc::new(WalletService::new(repo.clone(), config.holding_period()));
    let payouts = Arc::new(PayoutService::new(
        repo.clone(),
        wallets.clone(),
        rail.clone(),
        config.fee_schedule(),
        config.min_payout_amount,
        config.rate_limit_window(),
        config.auto_withdraw_auto_approve,
    ));

    let state = AppState::new(
        repo.clone(),
        config,
        commissions.clone(),
        wallets.clone(),
        payouts.clone(),
    );

    TestApp {
        router: api::create_router(state),
        repo,
        wallets,
        payouts,
        commissions,
        rail,
        _temp: temp_dir,
    }
}

/// Drive one request through the router and return (status, parsed body).
pub async fn request_json(
    router: &axum::Router,
    method: &str,
    uri: &str,
    body: Option<serde_json::Value>,
) -> (axum::http::StatusCode, serde_json::Value) {
    use tower::util::ServiceExt;

    let mut builder = axum::http::Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            builder
                .body(axum::body::Body::from(json.to_string()))
                .unwrap()
        }
        None => builder.body(axum::body::Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
    };
    (status, value)
}
