//! Payout endpoints: vendor request/cancel/settings plus the admin
//! review workflow.

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::api::AppState;
use crate::domain::{
    Money, PayoutMethod, PayoutRequest, PayoutSettings, PayoutStatus, VendorId,
};
use crate::error::AppError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutDto {
    pub id: String,
    pub vendor: String,
    pub amount: String,
    pub platform_fee: String,
    pub processing_fee: String,
    pub net_amount: String,
    pub method_type: String,
    pub status: String,
    pub auto_initiated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_ref: Option<String>,
    pub status_history: Vec<StatusChangeDto>,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChangeDto {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    pub to: String,
    pub at_ms: i64,
    pub actor: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

fn to_dto(request: PayoutRequest) -> PayoutDto {
    PayoutDto {
        id: request.id,
        vendor: request.vendor.to_string(),
        amount: request.amount.to_canonical_string(),
        platform_fee: request.fees.platform_fee.to_canonical_string(),
        processing_fee: request.fees.processing_fee.to_canonical_string(),
        net_amount: request.fees.net_amount.to_canonical_string(),
        method_type: request.method.kind_str().to_string(),
        status: request.status.as_str().to_string(),
        auto_initiated: request.auto_initiated,
        external_ref: request.external_ref,
        status_history: request
            .status_history
            .into_iter()
            .map(|change| StatusChangeDto {
                from: change.from.map(|s| s.as_str().to_string()),
                to: change.to.as_str().to_string(),
                at_ms: change.at.timestamp_millis(),
                actor: change.actor,
                note: change.note,
            })
            .collect(),
        created_at_ms: request.created_at.timestamp_millis(),
        updated_at_ms: request.updated_at.timestamp_millis(),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePayoutRequest {
    pub vendor: VendorId,
    pub amount: Money,
    #[serde(default)]
    pub method: Option<PayoutMethod>,
}

pub async fn create_payout(
    State(state): State<AppState>,
    Json(body): Json<CreatePayoutRequest>,
) -> Result<Json<PayoutDto>, AppError> {
    let request = state
        .payouts
        .create_request(&body.vendor, body.amount, body.method, false, Utc::now())
        .await?;
    state.summary_cache.invalidate();
    Ok(Json(to_dto(request)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorQuery {
    pub vendor: String,
}

pub async fn list_vendor_payouts(
    Query(params): Query<VendorQuery>,
    State(state): State<AppState>,
) -> Result<Json<Vec<PayoutDto>>, AppError> {
    let vendor = VendorId::new(params.vendor);
    let requests = state.repo.list_payouts_for_vendor(&vendor).await?;
    Ok(Json(requests.into_iter().map(to_dto).collect()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelPayoutRequest {
    pub vendor: VendorId,
}

pub async fn cancel_payout(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(body): Json<CancelPayoutRequest>,
) -> Result<Json<PayoutDto>, AppError> {
    let request = state
        .payouts
        .cancel(&id, body.vendor.as_str(), true, Utc::now())
        .await?;
    state.summary_cache.invalidate();
    Ok(Json(to_dto(request)))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsDto {
    pub vendor: String,
    pub auto_withdraw_enabled: bool,
    pub auto_withdraw_threshold: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_method: Option<PayoutMethod>,
    pub method_verified: bool,
}

pub async fn get_settings(
    Query(params): Query<VendorQuery>,
    State(state): State<AppState>,
) -> Result<Json<SettingsDto>, AppError> {
    let vendor = VendorId::new(params.vendor);
    let settings = state
        .repo
        .get_payout_settings(&vendor)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("no payout settings for {}", vendor)))?;
    Ok(Json(SettingsDto {
        vendor: settings.vendor.to_string(),
        auto_withdraw_enabled: settings.auto_withdraw_enabled,
        auto_withdraw_threshold: settings.auto_withdraw_threshold.to_canonical_string(),
        default_method: settings.default_method,
        method_verified: settings.method_verified,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PutSettingsRequest {
    pub vendor: VendorId,
    pub auto_withdraw_enabled: bool,
    pub auto_withdraw_threshold: Money,
    #[serde(default)]
    pub default_method: Option<PayoutMethod>,
    #[serde(default)]
    pub method_verified: bool,
}

pub async fn put_settings(
    State(state): State<AppState>,
    Json(body): Json<PutSettingsRequest>,
) -> Result<Json<SettingsDto>, AppError> {
    if body.auto_withdraw_threshold.is_negative() {
        return Err(AppError::BadRequest(
            "autoWithdrawThreshold must be non-negative".into(),
        ));
    }
    let settings = PayoutSettings {
        vendor: body.vendor,
        auto_withdraw_enabled: body.auto_withdraw_enabled,
        auto_withdraw_threshold: body.auto_withdraw_threshold,
        default_method: body.default_method,
        method_verified: body.method_verified,
        updated_at: Utc::now(),
    };
    state.repo.upsert_payout_settings(&settings).await?;
    Ok(Json(SettingsDto {
        vendor: settings.vendor.to_string(),
        auto_withdraw_enabled: settings.auto_withdraw_enabled,
        auto_withdraw_threshold: settings.auto_withdraw_threshold.to_canonical_string(),
        default_method: settings.default_method,
        method_verified: settings.method_verified,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminPayoutsQuery {
    pub status: Option<String>,
}

pub async fn list_admin_payouts(
    Query(params): Query<AdminPayoutsQuery>,
    State(state): State<AppState>,
) -> Result<Json<Vec<PayoutDto>>, AppError> {
    let status = match params.status.as_deref() {
        Some(s) => Some(
            PayoutStatus::parse(s)
                .ok_or_else(|| AppError::BadRequest(format!("unknown status {}", s)))?,
        ),
        None => None,
    };
    let requests = state.repo.list_payouts(status).await?;
    Ok(Json(requests.into_iter().map(to_dto).collect()))
}

pub async fn review_payout(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<PayoutDto>, AppError> {
    let request = state
        .payouts
        .mark_under_review(&id, "admin", Utc::now())
        .await?;
    Ok(Json(to_dto(request)))
}

pub async fn approve_payout(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<PayoutDto>, AppError> {
    let request = state.payouts.approve(&id, "admin", Utc::now()).await?;
    Ok(Json(to_dto(request)))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectPayoutRequest {
    #[serde(default)]
    pub note: Option<String>,
}

pub async fn reject_payout(
    Path(id): Path<String>,
    State(state): State<AppState>,
    body: Option<Json<RejectPayoutRequest>>,
) -> Result<Json<PayoutDto>, AppError> {
    let note = body.and_then(|Json(b)| b.note);
    let request = state
        .payouts
        .reject(&id, "admin", note, Utc::now())
        .await?;
    state.summary_cache.invalidate();
    Ok(Json(to_dto(request)))
}

pub async fn process_payout(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<PayoutDto>, AppError> {
    let request = state.payouts.process(&id, "admin", Utc::now()).await?;
    state.summary_cache.invalidate();
    Ok(Json(to_dto(request)))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletePayoutRequest {
    #[serde(default)]
    pub external_ref: Option<String>,
}

pub async fn complete_payout(
    Path(id): Path<String>,
    State(state): State<AppState>,
    body: Option<Json<CompletePayoutRequest>>,
) -> Result<Json<PayoutDto>, AppError> {
    let external_ref = body.and_then(|Json(b)| b.external_ref);
    let request = state
        .payouts
        .complete(&id, external_ref, "admin", Utc::now())
        .await?;
    state.summary_cache.invalidate();
    Ok(Json(to_dto(request)))
}
