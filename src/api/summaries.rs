//! Admin endpoints for financial summary rollups.

use axum::extract::{Query, State};
use axum::Json;
use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::api::AppState;
use crate::domain::{FinancialSummary, SummaryPeriod, SummaryScope};
use crate::error::AppError;
use crate::jobs::{run_aggregation_job, JobReport};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunAggregationRequest {
    pub period: String,
    /// Any instant inside the target period; defaults to now.
    #[serde(default)]
    pub at_ms: Option<i64>,
}

pub async fn run_aggregation(
    State(state): State<AppState>,
    Json(body): Json<RunAggregationRequest>,
) -> Result<Json<JobReport>, AppError> {
    let period = SummaryPeriod::parse(&body.period)
        .ok_or_else(|| AppError::BadRequest(format!("unknown period {}", body.period)))?;
    let now = Utc::now();
    let at = match body.at_ms {
        Some(ms) => Utc
            .timestamp_millis_opt(ms)
            .single()
            .ok_or_else(|| AppError::BadRequest("atMs is out of range".into()))?,
        None => now,
    };

    let report = run_aggregation_job(&state.repo, period, at, now).await?;
    state.summary_cache.invalidate();
    Ok(Json(report))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummariesQuery {
    pub scope: String,
    #[serde(default)]
    pub scope_ref: Option<String>,
    pub period: String,
    #[serde(default)]
    pub from_ms: Option<i64>,
    #[serde(default)]
    pub to_ms: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryDto {
    pub scope: String,
    pub scope_ref: String,
    pub period: String,
    pub period_start_ms: i64,
    pub period_end_ms: i64,
    pub gmv: String,
    pub order_count: i64,
    pub commission_total: String,
    pub vendor_earnings_total: String,
    pub payouts_total: String,
    pub refunds_total: String,
    pub net_revenue: String,
    pub computed_at_ms: i64,
}

fn to_dto(summary: FinancialSummary) -> SummaryDto {
    SummaryDto {
        scope: summary.scope.as_str().to_string(),
        scope_ref: summary.scope_ref,
        period: summary.period.as_str().to_string(),
        period_start_ms: summary.period_start.timestamp_millis(),
        period_end_ms: summary.period_end.timestamp_millis(),
        gmv: summary.gmv.to_canonical_string(),
        order_count: summary.order_count,
        commission_total: summary.commission_total.to_canonical_string(),
        vendor_earnings_total: summary.vendor_earnings_total.to_canonical_string(),
        payouts_total: summary.payouts_total.to_canonical_string(),
        refunds_total: summary.refunds_total.to_canonical_string(),
        net_revenue: summary.net_revenue.to_canonical_string(),
        computed_at_ms: summary.computed_at.timestamp_millis(),
    }
}

pub async fn list_summaries(
    Query(params): Query<SummariesQuery>,
    State(state): State<AppState>,
) -> Result<Json<Vec<SummaryDto>>, AppError> {
    let scope = SummaryScope::parse(&params.scope)
        .ok_or_else(|| AppError::BadRequest(format!("unknown scope {}", params.scope)))?;
    let period = SummaryPeriod::parse(&params.period)
        .ok_or_else(|| AppError::BadRequest(format!("unknown period {}", params.period)))?;
    let from = params
        .from_ms
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .unwrap_or_else(|| Utc.timestamp_millis_opt(0).unwrap());
    let to = params
        .to_ms
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .unwrap_or_else(Utc::now);
    if from > to {
        return Err(AppError::BadRequest("fromMs must be <= toMs".into()));
    }

    let cache_key = format!(
        "{}|{}|{}|{}|{}",
        params.scope,
        params.scope_ref.as_deref().unwrap_or(""),
        params.period,
        from.timestamp_millis(),
        to.timestamp_millis()
    );
    let summaries = match state.summary_cache.get(&cache_key) {
        Some(cached) => cached,
        None => {
            let fresh = state
                .repo
                .list_summaries(&scope, params.scope_ref.as_deref(), period, from, to)
                .await?;
            state.summary_cache.put(cache_key, fresh.clone());
            fresh
        }
    };

    Ok(Json(summaries.into_iter().map(to_dto).collect()))
}
