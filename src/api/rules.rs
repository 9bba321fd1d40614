//! Operator endpoints for commission rules.

use axum::extract::{Path, State};
use axum::Json;
use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::AppState;
use crate::domain::{
    CategoryId, CommissionRate, CommissionRule, CommissionTier, Money, ProductId, RuleScope,
    VendorId,
};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RulePayload {
    /// "platform" | "vendor" | "category" | "product"
    pub scope: String,
    #[serde(default)]
    pub scope_ref: Option<String>,
    /// "fixed" | "percentage" | "tiered"
    pub rate_kind: String,
    #[serde(default)]
    pub rate_value: Option<Money>,
    #[serde(default)]
    pub tiers: Option<Vec<CommissionTier>>,
    #[serde(default = "default_true")]
    pub include_subcategories: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub starts_at_ms: Option<i64>,
    #[serde(default)]
    pub ends_at_ms: Option<i64>,
    #[serde(default)]
    pub priority: i32,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleDto {
    pub id: String,
    pub scope: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope_ref: Option<String>,
    pub rate_kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tiers: Option<Vec<CommissionTier>>,
    pub include_subcategories: bool,
    pub is_active: bool,
    pub starts_at_ms: Option<i64>,
    pub ends_at_ms: Option<i64>,
    pub priority: i32,
    pub updated_at_ms: i64,
}

fn to_dto(rule: CommissionRule) -> RuleDto {
    let (rate_value, tiers) = match &rule.rate {
        CommissionRate::Fixed { value } | CommissionRate::Percentage { value } => {
            (Some(value.to_canonical_string()), None)
        }
        CommissionRate::Tiered { tiers } => (None, Some(tiers.clone())),
    };
    RuleDto {
        id: rule.id,
        scope: rule.scope.kind_str().to_string(),
        scope_ref: rule.scope.ref_str().map(|s| s.to_string()),
        rate_kind: rule.rate.kind_str().to_string(),
        rate_value,
        tiers,
        include_subcategories: rule.include_subcategories,
        is_active: rule.is_active,
        starts_at_ms: rule.starts_at.map(|t| t.timestamp_millis()),
        ends_at_ms: rule.ends_at.map(|t| t.timestamp_millis()),
        priority: rule.priority,
        updated_at_ms: rule.updated_at.timestamp_millis(),
    }
}

fn parse_scope(scope: &str, scope_ref: Option<String>) -> Result<RuleScope, AppError> {
    match (scope, scope_ref) {
        ("platform", _) => Ok(RuleScope::Platform),
        ("vendor", Some(r)) => Ok(RuleScope::Vendor(VendorId::new(r))),
        ("category", Some(r)) => Ok(RuleScope::Category(CategoryId::new(r))),
        ("product", Some(r)) => Ok(RuleScope::Product(ProductId::new(r))),
        (s @ ("vendor" | "category" | "product"), None) => Err(AppError::BadRequest(format!(
            "{} scope requires scopeRef",
            s
        ))),
        (other, _) => Err(AppError::BadRequest(format!("unknown scope {}", other))),
    }
}

fn parse_rate(payload: &RulePayload) -> Result<CommissionRate, AppError> {
    match payload.rate_kind.as_str() {
        "fixed" => {
            let value = payload
                .rate_value
                .ok_or_else(|| AppError::BadRequest("fixed rate requires rateValue".into()))?;
            if value.is_negative() {
                return Err(AppError::BadRequest("rateValue must be non-negative".into()));
            }
            Ok(CommissionRate::Fixed { value })
        }
        "percentage" => {
            let value = payload
                .rate_value
                .ok_or_else(|| AppError::BadRequest("percentage rate requires rateValue".into()))?;
            if value.is_negative() || value > Money::from(100) {
                return Err(AppError::BadRequest(
                    "percentage must be between 0 and 100".into(),
                ));
            }
            Ok(CommissionRate::Percentage { value })
        }
        "tiered" => {
            let mut tiers = payload
                .tiers
                .clone()
                .ok_or_else(|| AppError::BadRequest("tiered rate requires tiers".into()))?;
            if tiers.is_empty() {
                return Err(AppError::BadRequest("tiers must not be empty".into()));
            }
            tiers.sort_by(|a, b| a.min_amount.cmp(&b.min_amount));
            Ok(CommissionRate::Tiered { tiers })
        }
        other => Err(AppError::BadRequest(format!("unknown rate kind {}", other))),
    }
}

fn build_rule(id: String, payload: RulePayload, created_at_ms: Option<i64>) -> Result<CommissionRule, AppError> {
    let scope = parse_scope(&payload.scope, payload.scope_ref.clone())?;
    let rate = parse_rate(&payload)?;
    let now = Utc::now();
    let created_at = created_at_ms
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .unwrap_or(now);
    Ok(CommissionRule {
        id,
        scope,
        rate,
        include_subcategories: payload.include_subcategories,
        is_active: payload.is_active,
        starts_at: payload
            .starts_at_ms
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        ends_at: payload
            .ends_at_ms
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        priority: payload.priority,
        created_at,
        updated_at: now,
    })
}

pub async fn list_rules(State(state): State<AppState>) -> Result<Json<Vec<RuleDto>>, AppError> {
    let rules = state.repo.list_rules().await?;
    Ok(Json(rules.into_iter().map(to_dto).collect()))
}

pub async fn create_rule(
    State(state): State<AppState>,
    Json(payload): Json<RulePayload>,
) -> Result<Json<RuleDto>, AppError> {
    let rule = build_rule(Uuid::new_v4().to_string(), payload, None)?;
    state.repo.upsert_rule(&rule).await?;
    Ok(Json(to_dto(rule)))
}

pub async fn update_rule(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(payload): Json<RulePayload>,
) -> Result<Json<RuleDto>, AppError> {
    let existing = state
        .repo
        .get_rule(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("no commission rule {}", id)))?;
    let rule = build_rule(id, payload, Some(existing.created_at.timestamp_millis()))?;
    state.repo.upsert_rule(&rule).await?;
    Ok(Json(to_dto(rule)))
}
