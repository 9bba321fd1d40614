//! Financial summary rollup storage.

use super::{dt_from_ms, money_col, Repository};
use crate::domain::{FinancialSummary, SummaryPeriod, SummaryScope};
use chrono::{DateTime, Utc};
use sqlx::Row;

impl Repository {
    /// Upsert a rollup by its (scope, scope_ref, period, period_start)
    /// key, so aggregation reruns overwrite rather than duplicate.
    pub async fn upsert_summary(&self, summary: &FinancialSummary) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO financial_summaries (
                scope, scope_ref, period, period_start_ms, period_end_ms,
                gmv, order_count, commission_total, vendor_earnings_total,
                payouts_total, refunds_total, net_revenue, computed_at_ms
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(scope, scope_ref, period, period_start_ms) DO UPDATE SET
                period_end_ms = excluded.period_end_ms,
                gmv = excluded.gmv,
                order_count = excluded.order_count,
                commission_total = excluded.commission_total,
                vendor_earnings_total = excluded.vendor_earnings_total,
                payouts_total = excluded.payouts_total,
                refunds_total = excluded.refunds_total,
                net_revenue = excluded.net_revenue,
                computed_at_ms = excluded.computed_at_ms
            "#,
        )
        .bind(summary.scope.as_str())
        .bind(&summary.scope_ref)
        .bind(summary.period.as_str())
        .bind(summary.period_start.timestamp_millis())
        .bind(summary.period_end.timestamp_millis())
        .bind(summary.gmv.to_canonical_string())
        .bind(summary.order_count)
        .bind(summary.commission_total.to_canonical_string())
        .bind(summary.vendor_earnings_total.to_canonical_string())
        .bind(summary.payouts_total.to_canonical_string())
        .bind(summary.refunds_total.to_canonical_string())
        .bind(summary.net_revenue.to_canonical_string())
        .bind(summary.computed_at.timestamp_millis())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Rollups for a scope and period whose period_start falls inside
    /// `[from, to)`. `scope_ref = None` lists every ref in the scope.
    pub async fn list_summaries(
        &self,
        scope: &SummaryScope,
        scope_ref: Option<&str>,
        period: SummaryPeriod,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<FinancialSummary>, sqlx::Error> {
        let rows = match scope_ref {
            Some(r) => {
                sqlx::query(
                    r#"
                    SELECT * FROM financial_summaries
                    WHERE scope = ? AND scope_ref = ? AND period = ?
                      AND period_start_ms >= ? AND period_start_ms < ?
                    ORDER BY period_start_ms DESC, scope_ref ASC
                    "#,
                )
                .bind(scope.as_str())
                .bind(r)
                .bind(period.as_str())
                .bind(from.timestamp_millis())
                .bind(to.timestamp_millis())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    r#"
                    SELECT * FROM financial_summaries
                    WHERE scope = ? AND period = ?
                      AND period_start_ms >= ? AND period_start_ms < ?
                    ORDER BY period_start_ms DESC, scope_ref ASC
                    "#,
                )
                .bind(scope.as_str())
                .bind(period.as_str())
                .bind(from.timestamp_millis())
                .bind(to.timestamp_millis())
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(rows.iter().filter_map(row_to_summary).collect())
    }
}

fn row_to_summary(row: &sqlx::sqlite::SqliteRow) -> Option<FinancialSummary> {
    let scope_str: String = row.get("scope");
    let period_str: String = row.get("period");
    let gmv: String = row.get("gmv");
    let commission_total: String = row.get("commission_total");
    let vendor_earnings_total: String = row.get("vendor_earnings_total");
    let payouts_total: String = row.get("payouts_total");
    let refunds_total: String = row.get("refunds_total");
    let net_revenue: String = row.get("net_revenue");

    Some(FinancialSummary {
        scope: SummaryScope::parse(&scope_str)?,
        scope_ref: row.get("scope_ref"),
        period: SummaryPeriod::parse(&period_str)?,
        period_start: dt_from_ms(row.get("period_start_ms")),
        period_end: dt_from_ms(row.get("period_end_ms")),
        gmv: money_col(&gmv),
        order_count: row.get("order_count"),
        commission_total: money_col(&commission_total),
        vendor_earnings_total: money_col(&vendor_earnings_total),
        payouts_total: money_col(&payouts_total),
        refunds_total: money_col(&refunds_total),
        net_revenue: money_col(&net_revenue),
        computed_at: dt_from_ms(row.get("computed_at_ms")),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use crate::domain::Money;
    use chrono::TimeZone;
    use tempfile::TempDir;

    async fn setup() -> (Repository, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir
            .path()
            .join("test.db")
            .to_string_lossy()
            .to_string();
        let pool = init_db(&db_path).await.expect("init_db failed");
        (Repository::new(pool), temp_dir)
    }

    fn m(s: &str) -> Money {
        Money::from_str_canonical(s).unwrap()
    }

    fn summary(gmv: &str) -> FinancialSummary {
        let start = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 4, 1, 0, 0, 0).unwrap();
        FinancialSummary {
            scope: SummaryScope::Platform,
            scope_ref: String::new(),
            period: SummaryPeriod::Monthly,
            period_start: start,
            period_end: end,
            gmv: m(gmv),
            order_count: 10,
            commission_total: m("100"),
            vendor_earnings_total: m("900"),
            payouts_total: m("500"),
            refunds_total: m("20"),
            net_revenue: m("80"),
            computed_at: Utc.with_ymd_and_hms(2025, 4, 1, 1, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_upsert_overwrites_on_rerun() {
        let (repo, _temp) = setup().await;
        repo.upsert_summary(&summary("1000")).await.unwrap();
        repo.upsert_summary(&summary("1200")).await.unwrap();

        let from = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let rows = repo
            .list_summaries(&SummaryScope::Platform, None, SummaryPeriod::Monthly, from, to)
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].gmv, m("1200"));
    }

    #[tokio::test]
    async fn test_list_filters_by_scope_ref() {
        let (repo, _temp) = setup().await;
        let mut vendor_summary = summary("700");
        vendor_summary.scope = SummaryScope::Vendor;
        vendor_summary.scope_ref = "v-1".to_string();
        repo.upsert_summary(&vendor_summary).await.unwrap();
        repo.upsert_summary(&summary("1000")).await.unwrap();

        let from = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let rows = repo
            .list_summaries(
                &SummaryScope::Vendor,
                Some("v-1"),
                SummaryPeriod::Monthly,
                from,
                to,
            )
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].gmv, m("700"));
    }
}
