//! Order-subsystem intake: sale recording, fulfillment, refunds.

use axum::extract::{Query, State};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::api::AppState;
use crate::domain::{EntryStatus, Money, OrderId, TxReference, VendorId};
use crate::error::AppError;
use crate::ledger::SaleItem;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordCommissionsRequest {
    pub order_id: OrderId,
    pub items: Vec<SaleItem>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommissionEntryDto {
    pub entry_key: String,
    pub order_item_id: String,
    pub vendor: String,
    pub sale_amount: String,
    pub commission_amount: String,
    pub vendor_earning: String,
    pub rate_kind: String,
    pub rate_applied: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier_label: Option<String>,
    pub status: EntryStatus,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordCommissionsResponse {
    pub order_id: String,
    pub entries: Vec<CommissionEntryDto>,
}

pub async fn record_commissions(
    State(state): State<AppState>,
    Json(body): Json<RecordCommissionsRequest>,
) -> Result<Json<RecordCommissionsResponse>, AppError> {
    let entries = state
        .commissions
        .record_sale(&body.order_id, &body.items, Utc::now())
        .await?;

    Ok(Json(RecordCommissionsResponse {
        order_id: body.order_id.to_string(),
        entries: entries
            .into_iter()
            .map(|e| CommissionEntryDto {
                entry_key: e.entry_key,
                order_item_id: e.order_item_id,
                vendor: e.vendor.to_string(),
                sale_amount: e.sale_amount.to_canonical_string(),
                commission_amount: e.commission_amount.to_canonical_string(),
                vendor_earning: e.vendor_earning.to_canonical_string(),
                rate_kind: e.applied.kind,
                rate_applied: e.applied.rate.to_canonical_string(),
                tier_label: e.applied.tier_label,
                status: e.status,
            })
            .collect(),
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FulfillRequest {
    pub order_id: OrderId,
    pub vendor: VendorId,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FulfillResponse {
    pub order_id: String,
    pub vendor: String,
    pub earning_credited: String,
    pub commission_recorded: String,
    pub release_at_ms: Option<i64>,
}

/// Credit the vendor's pending earnings for a fulfilled order.
pub async fn fulfill_order(
    State(state): State<AppState>,
    Json(body): Json<FulfillRequest>,
) -> Result<Json<FulfillResponse>, AppError> {
    let (earning, commission) = state
        .commissions
        .order_split_for_vendor(&body.order_id, &body.vendor, EntryStatus::Pending)
        .await?;
    if !earning.is_positive() {
        return Err(AppError::BadRequest(format!(
            "order {} has no pending earnings for vendor {}",
            body.order_id, body.vendor
        )));
    }

    let tx = state
        .wallets
        .credit_pending_earnings(&body.vendor, &body.order_id, earning, commission, Utc::now())
        .await?;
    state.summary_cache.invalidate();

    Ok(Json(FulfillResponse {
        order_id: body.order_id.to_string(),
        vendor: body.vendor.to_string(),
        earning_credited: earning.to_canonical_string(),
        commission_recorded: commission.to_canonical_string(),
        release_at_ms: tx.release_at.map(|t| t.timestamp_millis()),
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundRequest {
    pub order_id: OrderId,
    pub vendor: VendorId,
    pub refund_id: String,
    pub amount: Money,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundResponse {
    pub vendor: String,
    pub amount_refunded: String,
    pub available_after: String,
    pub pending_after: String,
}

/// Debit a refund from the vendor's wallet and mark the order's credited
/// entries refunded.
pub async fn refund_order(
    State(state): State<AppState>,
    Json(body): Json<RefundRequest>,
) -> Result<Json<RefundResponse>, AppError> {
    if !body.amount.is_positive() {
        return Err(AppError::BadRequest("amount must be positive".into()));
    }

    let now = Utc::now();
    let tx = state
        .wallets
        .process_refund(
            &body.vendor,
            TxReference::refund(&body.refund_id),
            body.amount,
            now,
        )
        .await?;

    let mut conn = state.repo.pool().acquire().await.map_err(AppError::from)?;
    state
        .repo
        .update_order_entry_status_conn(
            &mut conn,
            &body.order_id,
            &body.vendor,
            EntryStatus::Credited,
            EntryStatus::Refunded,
            now,
        )
        .await
        .map_err(AppError::from)?;
    state.summary_cache.invalidate();

    Ok(Json(RefundResponse {
        vendor: body.vendor.to_string(),
        amount_refunded: body.amount.to_canonical_string(),
        available_after: tx.balance_after.available.to_canonical_string(),
        pending_after: tx.balance_after.pending.to_canonical_string(),
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EarningsQuery {
    pub vendor: String,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EarningsResponse {
    pub vendor: String,
    pub total: i64,
    pub entries: Vec<EarningEntryDto>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EarningEntryDto {
    pub entry_key: String,
    pub order_id: String,
    pub order_item_id: String,
    pub sale_amount: String,
    pub commission_amount: String,
    pub vendor_earning: String,
    pub status: EntryStatus,
    pub created_at_ms: i64,
}

/// Vendor-facing earnings listing, reverse-chronological.
pub async fn list_earnings(
    Query(params): Query<EarningsQuery>,
    State(state): State<AppState>,
) -> Result<Json<EarningsResponse>, AppError> {
    let vendor = VendorId::new(params.vendor);
    let limit = params.limit.unwrap_or(50).clamp(1, 500);
    let offset = params.offset.unwrap_or(0).max(0);

    let page = state.repo.entries_for_vendor(&vendor, limit, offset).await?;
    Ok(Json(EarningsResponse {
        vendor: vendor.to_string(),
        total: page.total,
        entries: page
            .entries
            .into_iter()
            .map(|e| EarningEntryDto {
                entry_key: e.entry_key,
                order_id: e.order_id.to_string(),
                order_item_id: e.order_item_id,
                sale_amount: e.sale_amount.to_canonical_string(),
                commission_amount: e.commission_amount.to_canonical_string(),
                vendor_earning: e.vendor_earning.to_canonical_string(),
                status: e.status,
                created_at_ms: e.created_at.timestamp_millis(),
            })
            .collect(),
    }))
}
