//! Commission ledger entry storage and rollup source queries.

use super::{dt_from_ms, money_col, Repository};
use crate::domain::{
    AppliedRate, CategoryId, CommissionEntry, EntryStatus, Money, OrderId, ProductId, VendorId,
};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteConnection;
use sqlx::Row;

/// Minimal entry row for financial rollups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryRollupRow {
    pub vendor: VendorId,
    pub category: Option<CategoryId>,
    pub order_id: OrderId,
    pub sale_amount: Money,
    pub commission_amount: Money,
    pub vendor_earning: Money,
    pub status: EntryStatus,
}

/// One page of a vendor's entries.
#[derive(Debug, Clone)]
pub struct VendorEntryPage {
    pub entries: Vec<CommissionEntry>,
    pub total: i64,
}

impl Repository {
    /// Insert a commission entry idempotently; duplicate line items
    /// (same entry_key) are ignored.
    pub async fn insert_entry(&self, entry: &CommissionEntry) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO commission_entries (
                entry_key, order_id, order_item_id, vendor, product, category,
                quantity, unit_price, sale_amount, rate_kind, rate_applied,
                tier_label, rule_id, commission_amount, vendor_earning, status,
                created_at_ms, updated_at_ms
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(entry_key) DO NOTHING
            "#,
        )
        .bind(&entry.entry_key)
        .bind(entry.order_id.as_str())
        .bind(&entry.order_item_id)
        .bind(entry.vendor.as_str())
        .bind(entry.product.as_str())
        .bind(entry.category.as_ref().map(|c| c.as_str()))
        .bind(entry.quantity)
        .bind(entry.unit_price.to_canonical_string())
        .bind(entry.sale_amount.to_canonical_string())
        .bind(&entry.applied.kind)
        .bind(entry.applied.rate.to_canonical_string())
        .bind(entry.applied.tier_label.as_deref())
        .bind(entry.applied.rule_id.as_deref())
        .bind(entry.commission_amount.to_canonical_string())
        .bind(entry.vendor_earning.to_canonical_string())
        .bind(entry.status.as_str())
        .bind(entry.created_at.timestamp_millis())
        .bind(entry.updated_at.timestamp_millis())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn entries_for_order(
        &self,
        order_id: &OrderId,
    ) -> Result<Vec<CommissionEntry>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT * FROM commission_entries WHERE order_id = ? ORDER BY order_item_id ASC",
        )
        .bind(order_id.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(row_to_entry).collect())
    }

    /// Flip an order's entries for one vendor from `from` to `to` status.
    /// Runs on the caller's connection so it can share the wallet
    /// transaction. Returns the number of entries updated.
    pub async fn update_order_entry_status_conn(
        &self,
        conn: &mut SqliteConnection,
        order_id: &OrderId,
        vendor: &VendorId,
        from: EntryStatus,
        to: EntryStatus,
        now: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE commission_entries SET status = ?, updated_at_ms = ?
            WHERE order_id = ? AND vendor = ? AND status = ?
            "#,
        )
        .bind(to.as_str())
        .bind(now.timestamp_millis())
        .bind(order_id.as_str())
        .bind(vendor.as_str())
        .bind(from.as_str())
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected())
    }

    /// Sum of a vendor's sale amounts in a time window, for tier selection.
    /// Cancelled and refunded entries do not count toward the tier ladder.
    pub async fn vendor_period_sales(
        &self,
        vendor: &VendorId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Money, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT sale_amount FROM commission_entries
            WHERE vendor = ? AND created_at_ms >= ? AND created_at_ms < ?
              AND status IN ('pending', 'credited', 'disputed')
            "#,
        )
        .bind(vendor.as_str())
        .bind(from.timestamp_millis())
        .bind(to.timestamp_millis())
        .fetch_all(&self.pool)
        .await?;

        let mut total = Money::zero();
        for row in &rows {
            let amount: String = row.get("sale_amount");
            total += money_col(&amount);
        }
        Ok(total)
    }

    /// Whether the vendor has any disputed entries (blocks payouts).
    pub async fn has_open_disputes(&self, vendor: &VendorId) -> Result<bool, sqlx::Error> {
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM commission_entries WHERE vendor = ? AND status = 'disputed'",
        )
        .bind(vendor.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(row.0 > 0)
    }

    pub async fn entries_for_vendor(
        &self,
        vendor: &VendorId,
        limit: i64,
        offset: i64,
    ) -> Result<VendorEntryPage, sqlx::Error> {
        let total: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM commission_entries WHERE vendor = ?")
                .bind(vendor.as_str())
                .fetch_one(&self.pool)
                .await?;

        let rows = sqlx::query(
            r#"
            SELECT * FROM commission_entries WHERE vendor = ?
            ORDER BY created_at_ms DESC, entry_key DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(vendor.as_str())
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(VendorEntryPage {
            entries: rows.iter().map(row_to_entry).collect(),
            total: total.0,
        })
    }

    /// Minimal entry rows created inside `[from, to)`, for the
    /// aggregation job. Amounts are summed in Rust to keep decimal
    /// arithmetic exact.
    pub async fn entries_in_window(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<EntryRollupRow>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT vendor, category, order_id, sale_amount, commission_amount,
                   vendor_earning, status
            FROM commission_entries
            WHERE created_at_ms >= ? AND created_at_ms < ?
            "#,
        )
        .bind(from.timestamp_millis())
        .bind(to.timestamp_millis())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let category: Option<String> = row.get("category");
                let sale: String = row.get("sale_amount");
                let commission: String = row.get("commission_amount");
                let earning: String = row.get("vendor_earning");
                let status: String = row.get("status");
                EntryRollupRow {
                    vendor: VendorId::new(row.get::<String, _>("vendor")),
                    category: category.map(CategoryId::new),
                    order_id: OrderId::new(row.get::<String, _>("order_id")),
                    sale_amount: money_col(&sale),
                    commission_amount: money_col(&commission),
                    vendor_earning: money_col(&earning),
                    status: EntryStatus::parse(&status).unwrap_or(EntryStatus::Pending),
                }
            })
            .collect())
    }
}

fn row_to_entry(row: &sqlx::sqlite::SqliteRow) -> CommissionEntry {
    let category: Option<String> = row.get("category");
    let unit_price: String = row.get("unit_price");
    let sale_amount: String = row.get("sale_amount");
    let rate_applied: String = row.get("rate_applied");
    let commission_amount: String = row.get("commission_amount");
    let vendor_earning: String = row.get("vendor_earning");
    let status: String = row.get("status");

    CommissionEntry {
        entry_key: row.get("entry_key"),
        order_id: OrderId::new(row.get::<String, _>("order_id")),
        order_item_id: row.get("order_item_id"),
        vendor: VendorId::new(row.get::<String, _>("vendor")),
        product: ProductId::new(row.get::<String, _>("product")),
        category: category.map(CategoryId::new),
        quantity: row.get("quantity"),
        unit_price: money_col(&unit_price),
        sale_amount: money_col(&sale_amount),
        applied: AppliedRate {
            kind: row.get("rate_kind"),
            rate: money_col(&rate_applied),
            tier_label: row.get("tier_label"),
            rule_id: row.get("rule_id"),
        },
        commission_amount: money_col(&commission_amount),
        vendor_earning: money_col(&vendor_earning),
        status: EntryStatus::parse(&status).unwrap_or(EntryStatus::Pending),
        created_at: dt_from_ms(row.get("created_at_ms")),
        updated_at: dt_from_ms(row.get("updated_at_ms")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
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

    fn entry(order: &str, item: &str, vendor: &str, sale: &str) -> CommissionEntry {
        let now = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
        let order_id = OrderId::new(order);
        let vendor_id = VendorId::new(vendor);
        let product = ProductId::new("p-1");
        let sale_amount = m(sale);
        CommissionEntry {
            entry_key: CommissionEntry::compute_entry_key(
                &order_id,
                item,
                &vendor_id,
                &product,
                sale_amount,
            ),
            order_id,
            order_item_id: item.to_string(),
            vendor: vendor_id,
            product,
            category: Some(CategoryId::new("c-1")),
            quantity: 1,
            unit_price: sale_amount,
            sale_amount,
            applied: AppliedRate {
                kind: "percentage".to_string(),
                rate: m("10"),
                tier_label: None,
                rule_id: None,
            },
            commission_amount: sale_amount.percent(m("10")),
            vendor_earning: sale_amount - sale_amount.percent(m("10")),
            status: EntryStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_insert_entry_idempotent() {
        let (repo, _temp) = setup().await;
        let e = entry("o-1", "item-1", "v-1", "100");

        assert!(repo.insert_entry(&e).await.unwrap());
        assert!(!repo.insert_entry(&e).await.unwrap());

        let entries = repo.entries_for_order(&e.order_id).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0], e);
    }

    #[tokio::test]
    async fn test_update_order_entry_status() {
        let (repo, _temp) = setup().await;
        let e = entry("o-1", "item-1", "v-1", "100");
        repo.insert_entry(&e).await.unwrap();

        let now = Utc.timestamp_millis_opt(1_700_000_100_000).unwrap();
        let mut conn = repo.pool().acquire().await.unwrap();
        let updated = repo
            .update_order_entry_status_conn(
                &mut conn,
                &e.order_id,
                &e.vendor,
                EntryStatus::Pending,
                EntryStatus::Credited,
                now,
            )
            .await
            .unwrap();
        assert_eq!(updated, 1);

        let entries = repo.entries_for_order(&e.order_id).await.unwrap();
        assert_eq!(entries[0].status, EntryStatus::Credited);
    }

    #[tokio::test]
    async fn test_vendor_period_sales_excludes_refunded() {
        let (repo, _temp) = setup().await;
        let vendor = VendorId::new("v-1");
        repo.insert_entry(&entry("o-1", "i-1", "v-1", "100")).await.unwrap();
        let mut refunded = entry("o-2", "i-1", "v-1", "50");
        refunded.status = EntryStatus::Refunded;
        repo.insert_entry(&refunded).await.unwrap();

        let from = Utc.timestamp_millis_opt(0).unwrap();
        let to = Utc.timestamp_millis_opt(2_000_000_000_000).unwrap();
        let total = repo.vendor_period_sales(&vendor, from, to).await.unwrap();
        assert_eq!(total, m("100"));
    }

    #[tokio::test]
    async fn test_has_open_disputes() {
        let (repo, _temp) = setup().await;
        let vendor = VendorId::new("v-1");
        assert!(!repo.has_open_disputes(&vendor).await.unwrap());

        let mut disputed = entry("o-1", "i-1", "v-1", "100");
        disputed.status = EntryStatus::Disputed;
        repo.insert_entry(&disputed).await.unwrap();
        assert!(repo.has_open_disputes(&vendor).await.unwrap());
    }

    #[tokio::test]
    async fn test_entries_in_window() {
        let (repo, _temp) = setup().await;
        repo.insert_entry(&entry("o-1", "i-1", "v-1", "100")).await.unwrap();
        repo.insert_entry(&entry("o-1", "i-2", "v-2", "200")).await.unwrap();

        let from = Utc.timestamp_millis_opt(1_600_000_000_000).unwrap();
        let to = Utc.timestamp_millis_opt(1_800_000_000_000).unwrap();
        let rows = repo.entries_in_window(from, to).await.unwrap();
        assert_eq!(rows.len(), 2);

        let empty = repo
            .entries_in_window(
                Utc.timestamp_millis_opt(0).unwrap(),
                Utc.timestamp_millis_opt(1_000).unwrap(),
            )
            .await
            .unwrap();
        assert!(empty.is_empty());
    }
}
