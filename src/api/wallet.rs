//! Vendor-facing wallet endpoints: balances, history, CSV export, plus
//! the admin reconciliation check.

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, HeaderValue};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::AppState;
use crate::domain::{VendorId, WalletTransaction};
use crate::error::AppError;
use crate::ledger::ReconcileReport;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletQuery {
    pub vendor: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletResponse {
    pub vendor: String,
    pub available: String,
    pub pending: String,
    pub reserved: String,
    pub total_earned: String,
    pub total_commission_paid: String,
    pub total_withdrawn: String,
    pub total_refunded: String,
}

pub async fn get_wallet(
    Query(params): Query<WalletQuery>,
    State(state): State<AppState>,
) -> Result<Json<WalletResponse>, AppError> {
    let vendor = VendorId::new(params.vendor);
    let wallet = state.repo.get_wallet(&vendor).await?;

    // Vendors without an earning event yet read as a zero wallet.
    let response = match wallet {
        Some(w) => WalletResponse {
            vendor: vendor.to_string(),
            available: w.available().to_canonical_string(),
            pending: w.pending().to_canonical_string(),
            reserved: w.reserved().to_canonical_string(),
            total_earned: w.total_earned().to_canonical_string(),
            total_commission_paid: w.total_commission_paid().to_canonical_string(),
            total_withdrawn: w.total_withdrawn().to_canonical_string(),
            total_refunded: w.total_refunded().to_canonical_string(),
        },
        None => WalletResponse {
            vendor: vendor.to_string(),
            available: "0".to_string(),
            pending: "0".to_string(),
            reserved: "0".to_string(),
            total_earned: "0".to_string(),
            total_commission_paid: "0".to_string(),
            total_withdrawn: "0".to_string(),
            total_refunded: "0".to_string(),
        },
    };
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionsQuery {
    pub vendor: String,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionDto {
    pub id: String,
    pub tx_type: String,
    pub category: String,
    pub amount: String,
    pub available_after: String,
    pub pending_after: String,
    pub reserved_after: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_at_ms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub released_at_ms: Option<i64>,
    pub created_at_ms: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionsResponse {
    pub vendor: String,
    pub total: i64,
    pub transactions: Vec<TransactionDto>,
}

fn to_dto(tx: WalletTransaction) -> TransactionDto {
    TransactionDto {
        id: tx.id,
        tx_type: tx.tx_type.as_str().to_string(),
        category: tx.category.as_str().to_string(),
        amount: tx.amount.to_canonical_string(),
        available_after: tx.balance_after.available.to_canonical_string(),
        pending_after: tx.balance_after.pending.to_canonical_string(),
        reserved_after: tx.balance_after.reserved.to_canonical_string(),
        reference_kind: tx.reference.as_ref().map(|r| r.kind.clone()),
        reference_id: tx.reference.map(|r| r.id),
        release_at_ms: tx.release_at.map(|t| t.timestamp_millis()),
        released_at_ms: tx.released_at.map(|t| t.timestamp_millis()),
        created_at_ms: tx.created_at.timestamp_millis(),
    }
}

pub async fn get_transactions(
    Query(params): Query<TransactionsQuery>,
    State(state): State<AppState>,
) -> Result<Json<TransactionsResponse>, AppError> {
    let vendor = VendorId::new(params.vendor);
    let limit = params.limit.unwrap_or(50).clamp(1, 500);
    let offset = params.offset.unwrap_or(0).max(0);

    let (transactions, total) = state.repo.list_transactions(&vendor, limit, offset).await?;
    Ok(Json(TransactionsResponse {
        vendor: vendor.to_string(),
        total,
        transactions: transactions.into_iter().map(to_dto).collect(),
    }))
}

/// Full transaction history as a CSV download.
pub async fn export_transactions(
    Query(params): Query<WalletQuery>,
    State(state): State<AppState>,
) -> Result<(HeaderMap, String), AppError> {
    let vendor = VendorId::new(params.vendor);
    let transactions = state.repo.all_transactions_asc(&vendor).await?;

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record([
            "id",
            "type",
            "category",
            "amount",
            "available_after",
            "pending_after",
            "reserved_after",
            "reference",
            "created_at_ms",
        ])
        .map_err(|e| AppError::Internal(format!("CSV write failed: {}", e)))?;
    for tx in &transactions {
        let reference = tx
            .reference
            .as_ref()
            .map(|r| format!("{}:{}", r.kind, r.id))
            .unwrap_or_default();
        let record = [
            tx.id.clone(),
            tx.tx_type.as_str().to_string(),
            tx.category.as_str().to_string(),
            tx.amount.to_canonical_string(),
            tx.balance_after.available.to_canonical_string(),
            tx.balance_after.pending.to_canonical_string(),
            tx.balance_after.reserved.to_canonical_string(),
            reference,
            tx.created_at.timestamp_millis().to_string(),
        ];
        writer
            .write_record(&record)
            .map_err(|e| AppError::Internal(format!("CSV write failed: {}", e)))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| AppError::Internal(format!("CSV write failed: {}", e)))?;
    let body = String::from_utf8(bytes)
        .map_err(|e| AppError::Internal(format!("CSV encoding failed: {}", e)))?;

    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/csv"));
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_static("attachment; filename=\"transactions.csv\""),
    );
    Ok((headers, body))
}

pub async fn reconcile_wallet(
    Path(vendor): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<ReconcileReport>, AppError> {
    let vendor = VendorId::new(vendor);
    let report = state.wallets.reconcile(&vendor).await?;
    Ok(Json(report))
}
