//! Commission rule storage and resolution-candidate queries.

use super::{dt_from_ms, money_col, opt_dt_from_ms, Repository};
use crate::domain::{
    CategoryId, CommissionRate, CommissionRule, CommissionTier, ProductId, RuleScope, VendorId,
};
use sqlx::Row;
use tracing::warn;

impl Repository {
    /// Insert or fully replace a commission rule.
    pub async fn upsert_rule(&self, rule: &CommissionRule) -> Result<(), sqlx::Error> {
        let (rate_value, tiers_json) = rate_columns(&rule.rate);
        sqlx::query(
            r#"
            INSERT INTO commission_rules (
                id, scope, scope_ref, rate_kind, rate_value, tiers_json,
                include_subcategories, is_active, starts_at_ms, ends_at_ms,
                priority, created_at_ms, updated_at_ms
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                scope = excluded.scope,
                scope_ref = excluded.scope_ref,
                rate_kind = excluded.rate_kind,
                rate_value = excluded.rate_value,
                tiers_json = excluded.tiers_json,
                include_subcategories = excluded.include_subcategories,
                is_active = excluded.is_active,
                starts_at_ms = excluded.starts_at_ms,
                ends_at_ms = excluded.ends_at_ms,
                priority = excluded.priority,
                updated_at_ms = excluded.updated_at_ms
            "#,
        )
        .bind(&rule.id)
        .bind(rule.scope.kind_str())
        .bind(rule.scope.ref_str())
        .bind(rule.rate.kind_str())
        .bind(rate_value)
        .bind(tiers_json)
        .bind(rule.include_subcategories as i64)
        .bind(rule.is_active as i64)
        .bind(rule.starts_at.map(|t| t.timestamp_millis()))
        .bind(rule.ends_at.map(|t| t.timestamp_millis()))
        .bind(rule.priority as i64)
        .bind(rule.created_at.timestamp_millis())
        .bind(rule.updated_at.timestamp_millis())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_rule(&self, id: &str) -> Result<Option<CommissionRule>, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM commission_rules WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.and_then(|r| row_to_rule(&r)))
    }

    /// All rules, operator listing order: scope then priority descending.
    pub async fn list_rules(&self) -> Result<Vec<CommissionRule>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT * FROM commission_rules ORDER BY scope ASC, priority DESC, updated_at_ms DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().filter_map(row_to_rule).collect())
    }

    /// Rules that could apply to a sale: the product's rules, the sale
    /// category and its ancestors, the vendor's rules, and platform rules.
    /// Validity filtering happens in the resolver.
    pub async fn candidate_rules(
        &self,
        product: &ProductId,
        categories: &[CategoryId],
        vendor: &VendorId,
    ) -> Result<Vec<CommissionRule>, sqlx::Error> {
        let category_placeholders = if categories.is_empty() {
            "NULL".to_string()
        } else {
            vec!["?"; categories.len()].join(", ")
        };
        let sql = format!(
            r#"
            SELECT * FROM commission_rules
            WHERE is_active = 1 AND (
                (scope = 'product' AND scope_ref = ?)
                OR (scope = 'category' AND scope_ref IN ({}))
                OR (scope = 'vendor' AND scope_ref = ?)
                OR scope = 'platform'
            )
            "#,
            category_placeholders
        );

        let mut query = sqlx::query(&sql).bind(product.as_str());
        for category in categories {
            query = query.bind(category.as_str());
        }
        query = query.bind(vendor.as_str());

        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows.iter().filter_map(row_to_rule).collect())
    }
}

fn rate_columns(rate: &CommissionRate) -> (Option<String>, Option<String>) {
    match rate {
        CommissionRate::Fixed { value } | CommissionRate::Percentage { value } => {
            (Some(value.to_canonical_string()), None)
        }
        CommissionRate::Tiered { tiers } => (
            None,
            Some(serde_json::to_string(tiers).unwrap_or_else(|_| "[]".to_string())),
        ),
    }
}

fn row_to_rule(row: &sqlx::sqlite::SqliteRow) -> Option<CommissionRule> {
    let id: String = row.get("id");
    let scope_kind: String = row.get("scope");
    let scope_ref: Option<String> = row.get("scope_ref");
    let scope = match (scope_kind.as_str(), scope_ref) {
        ("platform", _) => RuleScope::Platform,
        ("vendor", Some(r)) => RuleScope::Vendor(VendorId::new(r)),
        ("category", Some(r)) => RuleScope::Category(CategoryId::new(r)),
        ("product", Some(r)) => RuleScope::Product(ProductId::new(r)),
        _ => {
            warn!(rule_id = %id, scope = %scope_kind, "skipping rule with malformed scope");
            return None;
        }
    };

    let rate_kind: String = row.get("rate_kind");
    let rate_value: Option<String> = row.get("rate_value");
    let tiers_json: Option<String> = row.get("tiers_json");
    let rate = match rate_kind.as_str() {
        "fixed" => CommissionRate::Fixed {
            value: money_col(rate_value.as_deref().unwrap_or("0")),
        },
        "percentage" => CommissionRate::Percentage {
            value: money_col(rate_value.as_deref().unwrap_or("0")),
        },
        "tiered" => {
            let tiers: Vec<CommissionTier> = tiers_json
                .as_deref()
                .and_then(|j| serde_json::from_str(j).ok())
                .unwrap_or_default();
            CommissionRate::Tiered { tiers }
        }
        other => {
            warn!(rule_id = %id, rate_kind = %other, "skipping rule with unknown rate kind");
            return None;
        }
    };

    let include_subcategories: i64 = row.get("include_subcategories");
    let is_active: i64 = row.get("is_active");
    let priority: i64 = row.get("priority");

    Some(CommissionRule {
        id,
        scope,
        rate,
        include_subcategories: include_subcategories != 0,
        is_active: is_active != 0,
        starts_at: opt_dt_from_ms(row.get("starts_at_ms")),
        ends_at: opt_dt_from_ms(row.get("ends_at_ms")),
        priority: priority as i32,
        created_at: dt_from_ms(row.get("created_at_ms")),
        updated_at: dt_from_ms(row.get("updated_at_ms")),
    })
}
