//! End-to-end money lifecycle: sale -> fulfillment credit -> holding
//! period release -> payout -> refund, with the ledger reconciling at
//! every step.

mod common;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use common::{m, request_json, setup_test_app};
use serde_json::json;
use vendorpay::domain::{EntryStatus, Money, VendorId};
use vendorpay::jobs::run_release_job;
use vendorpay::OrderId;

async fn record_and_fulfill(app: &common::TestApp, order: &str, unit_price: i64) {
    let (status, _) = request_json(
        &app.router,
        "POST",
        "/v1/orders/commissions",
        Some(json!({
            "orderId": order,
            "items": [{
                "orderItemId": "i-1",
                "vendor": "v-1",
                "product": "p-1",
                "category": "c-1",
                "quantity": 1,
                "unitPrice": unit_price
            }]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = request_json(
        &app.router,
        "POST",
        "/v1/orders/fulfill",
        Some(json!({"orderId": order, "vendor": "v-1"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_fulfillment_credits_pending_and_flips_entries() {
    let app = setup_test_app().await;
    record_and_fulfill(&app, "o-1", 10_000).await;

    let (status, wallet) = request_json(&app.router, "GET", "/v1/wallet?vendor=v-1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(wallet["pending"], "9000");
    assert_eq!(wallet["available"], "0");
    assert_eq!(wallet["totalEarned"], "9000");
    assert_eq!(wallet["totalCommissionPaid"], "1000");

    let entries = app
        .repo
        .entries_for_order(&OrderId::new("o-1"))
        .await
        .unwrap();
    assert_eq!(entries[0].status, EntryStatus::Credited);

    // Fulfilling twice finds no pending entries left.
    let (status, _) = request_json(
        &app.router,
        "POST",
        "/v1/orders/fulfill",
        Some(json!({"orderId": "o-1", "vendor": "v-1"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_release_then_refund_spilling_into_pending() {
    let app = setup_test_app().await;
    record_and_fulfill(&app, "o-1", 10_000).await;

    // Pending 9,000 matures after the holding period.
    let after_hold = Utc::now() + Duration::days(8);
    let report = run_release_job(&app.repo, &app.wallets, after_hold)
        .await
        .unwrap();
    assert_eq!(report.succeeded, 1);

    let (_, wallet) = request_json(&app.router, "GET", "/v1/wallet?vendor=v-1", None).await;
    assert_eq!(wallet["available"], "9000");
    assert_eq!(wallet["pending"], "0");

    // Refund of 3,000 comes out of available.
    let (status, refund) = request_json(
        &app.router,
        "POST",
        "/v1/orders/refund",
        Some(json!({
            "orderId": "o-1",
            "vendor": "v-1",
            "refundId": "r-1",
            "amount": 3000
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(refund["availableAfter"], "6000");
    assert_eq!(refund["pendingAfter"], "0");

    let (_, wallet) = request_json(&app.router, "GET", "/v1/wallet?vendor=v-1", None).await;
    assert_eq!(wallet["totalRefunded"], "3000");

    let entries = app
        .repo
        .entries_for_order(&OrderId::new("o-1"))
        .await
        .unwrap();
    assert_eq!(entries[0].status, EntryStatus::Refunded);
}

#[tokio::test]
async fn test_refund_exceeding_coverage_is_consistency_error() {
    let app = setup_test_app().await;
    record_and_fulfill(&app, "o-1", 1_667).await;
    // Pending is 1,500.30; a 3,000 refund exceeds available + pending.
    let (status, body) = request_json(
        &app.router,
        "POST",
        "/v1/orders/refund",
        Some(json!({
            "orderId": "o-1",
            "vendor": "v-1",
            "refundId": "r-1",
            "amount": 3000
        })),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["kind"], "consistency");

    // The failed refund left no partial mutation.
    let report = app.wallets.reconcile(&VendorId::new("v-1")).await.unwrap();
    assert!(report.consistent, "detail: {:?}", report.detail);
    let (_, wallet) = request_json(&app.router, "GET", "/v1/wallet?vendor=v-1", None).await;
    assert_eq!(wallet["totalRefunded"], "0");
}

#[tokio::test]
async fn test_transaction_history_and_reconciliation() {
    let app = setup_test_app().await;
    record_and_fulfill(&app, "o-1", 5_000).await;
    record_and_fulfill(&app, "o-2", 3_000).await;

    let after_hold = Utc::now() + Duration::days(8);
    run_release_job(&app.repo, &app.wallets, after_hold)
        .await
        .unwrap();

    let (status, history) = request_json(
        &app.router,
        "GET",
        "/v1/wallet/transactions?vendor=v-1&limit=10",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history["total"], 4); // 2 holds + 2 releases
    let transactions = history["transactions"].as_array().unwrap();
    // Reverse-chronological: releases first.
    assert_eq!(transactions[0]["txType"], "release");
    assert_eq!(transactions[3]["txType"], "hold");

    // The latest snapshot equals the wallet and replay agrees.
    let (status, report) = request_json(
        &app.router,
        "GET",
        "/v1/admin/wallets/v-1/reconcile",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["consistent"], true);
    assert_eq!(report["transactionCount"], 4);
}

#[tokio::test]
async fn test_csv_export_contains_all_rows() {
    use tower::util::ServiceExt;

    let app = setup_test_app().await;
    record_and_fulfill(&app, "o-1", 2_000).await;

    let request = axum::http::Request::builder()
        .method("GET")
        .uri("/v1/wallet/transactions/export?vendor=v-1")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "text/csv"
    );

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let csv_text = String::from_utf8(bytes.to_vec()).unwrap();
    let lines: Vec<&str> = csv_text.trim().lines().collect();
    assert_eq!(lines.len(), 2); // header + one hold row
    assert!(lines[0].starts_with("id,type,category"));
    assert!(lines[1].contains("hold"));
    assert!(lines[1].contains("order:o-1"));
}

#[tokio::test]
async fn test_replay_reproduces_wallet_exactly() {
    let app = setup_test_app().await;
    record_and_fulfill(&app, "o-1", 10_000).await;
    let after_hold = Utc::now() + Duration::days(8);
    run_release_job(&app.repo, &app.wallets, after_hold)
        .await
        .unwrap();
    request_json(
        &app.router,
        "POST",
        "/v1/orders/refund",
        Some(json!({"orderId": "o-1", "vendor": "v-1", "refundId": "r-1", "amount": 1500})),
    )
    .await;

    let vendor = VendorId::new("v-1");
    let wallet = app.repo.get_wallet(&vendor).await.unwrap().unwrap();
    let transactions = app.repo.all_transactions_asc(&vendor).await.unwrap();

    // Fold the ledger from zero and compare against stored balances.
    let mut available = Money::zero();
    let mut pending = Money::zero();
    for tx in &transactions {
        match tx.tx_type.as_str() {
            "hold" => pending += tx.amount,
            "release" => {
                pending -= tx.amount;
                available += tx.amount;
            }
            "refund" => {
                let from_available = if tx.amount <= available { tx.amount } else { available };
                available -= from_available;
                pending -= tx.amount - from_available;
            }
            other => panic!("unexpected tx type {}", other),
        }
    }
    assert_eq!(available, wallet.available());
    assert_eq!(pending, wallet.pending());
    assert_eq!(available, m("7500"));
}
