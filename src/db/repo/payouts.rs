//! Payout request and payout settings storage.

use super::{dt_from_ms, money_col, Repository};
use crate::domain::{
    FeeBreakdown, Money, PayoutMethod, PayoutRequest, PayoutSettings, PayoutStatus, SafetyChecks,
    VendorId,
};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteConnection;
use sqlx::Row;
use tracing::warn;

/// Minimal completed-payout row for financial rollups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayoutRollupRow {
    pub vendor: VendorId,
    pub amount: Money,
}

impl Repository {
    /// Insert a payout request on the caller's connection, so creation
    /// shares the reservation's transaction.
    pub async fn insert_payout_conn(
        &self,
        conn: &mut SqliteConnection,
        request: &PayoutRequest,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO payout_requests (
                id, vendor, amount, platform_fee, processing_fee, net_amount,
                method_json, status, status_history_json, checks_json,
                auto_initiated, external_ref, created_at_ms, updated_at_ms
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&request.id)
        .bind(request.vendor.as_str())
        .bind(request.amount.to_canonical_string())
        .bind(request.fees.platform_fee.to_canonical_string())
        .bind(request.fees.processing_fee.to_canonical_string())
        .bind(request.fees.net_amount.to_canonical_string())
        .bind(json_string(&request.method))
        .bind(request.status.as_str())
        .bind(json_string(&request.status_history))
        .bind(json_string(&request.checks))
        .bind(request.auto_initiated as i64)
        .bind(request.external_ref.as_deref())
        .bind(request.created_at.timestamp_millis())
        .bind(request.updated_at.timestamp_millis())
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// Persist a request's mutable workflow fields on the caller's
    /// connection (status, history, external reference).
    pub async fn update_payout_conn(
        &self,
        conn: &mut SqliteConnection,
        request: &PayoutRequest,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE payout_requests SET
                status = ?, status_history_json = ?, external_ref = ?, updated_at_ms = ?
            WHERE id = ?
            "#,
        )
        .bind(request.status.as_str())
        .bind(json_string(&request.status_history))
        .bind(request.external_ref.as_deref())
        .bind(request.updated_at.timestamp_millis())
        .bind(&request.id)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    pub async fn get_payout(&self, id: &str) -> Result<Option<PayoutRequest>, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM payout_requests WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.and_then(|r| row_to_payout(&r)))
    }

    pub async fn list_payouts_for_vendor(
        &self,
        vendor: &VendorId,
    ) -> Result<Vec<PayoutRequest>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT * FROM payout_requests WHERE vendor = ? ORDER BY created_at_ms DESC",
        )
        .bind(vendor.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().filter_map(row_to_payout).collect())
    }

    /// Admin listing, optionally filtered by status.
    pub async fn list_payouts(
        &self,
        status: Option<PayoutStatus>,
    ) -> Result<Vec<PayoutRequest>, sqlx::Error> {
        let rows = match status {
            Some(s) => {
                sqlx::query(
                    "SELECT * FROM payout_requests WHERE status = ? ORDER BY created_at_ms DESC",
                )
                .bind(s.as_str())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query("SELECT * FROM payout_requests ORDER BY created_at_ms DESC")
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        Ok(rows.iter().filter_map(row_to_payout).collect())
    }

    /// Whether the vendor has a request that has not reached a terminal
    /// state.
    pub async fn has_non_terminal_payout(&self, vendor: &VendorId) -> Result<bool, sqlx::Error> {
        let row: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM payout_requests
            WHERE vendor = ? AND status NOT IN ('completed', 'rejected', 'cancelled')
            "#,
        )
        .bind(vendor.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(row.0 > 0)
    }

    /// Creation time of the vendor's most recent request, for rate limiting.
    pub async fn latest_payout_created_at(
        &self,
        vendor: &VendorId,
    ) -> Result<Option<DateTime<Utc>>, sqlx::Error> {
        let row: Option<(i64,)> = sqlx::query_as(
            "SELECT created_at_ms FROM payout_requests WHERE vendor = ? ORDER BY created_at_ms DESC LIMIT 1",
        )
        .bind(vendor.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(ms,)| dt_from_ms(ms)))
    }

    /// Completed payouts inside `[from, to)` (by completion update time),
    /// for the aggregation job.
    pub async fn completed_payouts_in_window(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<PayoutRollupRow>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT vendor, amount FROM payout_requests
            WHERE status = 'completed' AND updated_at_ms >= ? AND updated_at_ms < ?
            "#,
        )
        .bind(from.timestamp_millis())
        .bind(to.timestamp_millis())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .iter()
            .map(|row| {
                let amount: String = row.get("amount");
                PayoutRollupRow {
                    vendor: VendorId::new(row.get::<String, _>("vendor")),
                    amount: money_col(&amount),
                }
            })
            .collect())
    }

    pub async fn upsert_payout_settings(
        &self,
        settings: &PayoutSettings,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO payout_settings (
                vendor, auto_withdraw_enabled, auto_withdraw_threshold,
                method_json, method_verified, updated_at_ms
            ) VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(vendor) DO UPDATE SET
                auto_withdraw_enabled = excluded.auto_withdraw_enabled,
                auto_withdraw_threshold = excluded.auto_withdraw_threshold,
                method_json = excluded.method_json,
                method_verified = excluded.method_verified,
                updated_at_ms = excluded.updated_at_ms
            "#,
        )
        .bind(settings.vendor.as_str())
        .bind(settings.auto_withdraw_enabled as i64)
        .bind(settings.auto_withdraw_threshold.to_canonical_string())
        .bind(settings.default_method.as_ref().map(json_string))
        .bind(settings.method_verified as i64)
        .bind(settings.updated_at.timestamp_millis())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_payout_settings(
        &self,
        vendor: &VendorId,
    ) -> Result<Option<PayoutSettings>, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM payout_settings WHERE vendor = ?")
            .bind(vendor.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| row_to_settings(&r)))
    }

    /// Vendors that opted into auto-withdrawal.
    pub async fn auto_withdraw_vendors(&self) -> Result<Vec<PayoutSettings>, sqlx::Error> {
        let rows =
            sqlx::query("SELECT * FROM payout_settings WHERE auto_withdraw_enabled = 1")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.iter().map(row_to_settings).collect())
    }
}

fn json_string<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "null".to_string())
}

fn row_to_payout(row: &sqlx::sqlite::SqliteRow) -> Option<PayoutRequest> {
    let id: String = row.get("id");
    let method_json: String = row.get("method_json");
    let method: PayoutMethod = match serde_json::from_str(&method_json) {
        Ok(m) => m,
        Err(e) => {
            warn!(payout_id = %id, error = %e, "skipping payout with malformed method snapshot");
            return None;
        }
    };
    let status_str: String = row.get("status");
    let status = PayoutStatus::parse(&status_str)?;
    let history_json: String = row.get("status_history_json");
    let checks_json: String = row.get("checks_json");

    let amount: String = row.get("amount");
    let platform_fee: String = row.get("platform_fee");
    let processing_fee: String = row.get("processing_fee");
    let net_amount: String = row.get("net_amount");
    let auto_initiated: i64 = row.get("auto_initiated");

    Some(PayoutRequest {
        id,
        vendor: VendorId::new(row.get::<String, _>("vendor")),
        amount: money_col(&amount),
        fees: FeeBreakdown {
            platform_fee: money_col(&platform_fee),
            processing_fee: money_col(&processing_fee),
            net_amount: money_col(&net_amount),
        },
        method,
        status,
        status_history: serde_json::from_str(&history_json).unwrap_or_default(),
        checks: serde_json::from_str(&checks_json).unwrap_or(SafetyChecks {
            no_open_disputes: false,
            balance_verified: false,
            method_verified: false,
        }),
        auto_initiated: auto_initiated != 0,
        external_ref: row.get("external_ref"),
        created_at: dt_from_ms(row.get("created_at_ms")),
        updated_at: dt_from_ms(row.get("updated_at_ms")),
    })
}

fn row_to_settings(row: &sqlx::sqlite::SqliteRow) -> PayoutSettings {
    let threshold: String = row.get("auto_withdraw_threshold");
    let method_json: Option<String> = row.get("method_json");
    let auto_enabled: i64 = row.get("auto_withdraw_enabled");
    let method_verified: i64 = row.get("method_verified");

    PayoutSettings {
        vendor: VendorId::new(row.get::<String, _>("vendor")),
        auto_withdraw_enabled: auto_enabled != 0,
        auto_withdraw_threshold: money_col(&threshold),
        default_method: method_json.and_then(|j| serde_json::from_str(&j).ok()),
        method_verified: method_verified != 0,
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

    fn at(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).unwrap()
    }

    fn request(vendor: &str, amount: &str, created_ms: i64) -> PayoutRequest {
        PayoutRequest::new(
            VendorId::new(vendor),
            m(amount),
            FeeBreakdown {
                platform_fee: Money::zero(),
                processing_fee: m("2"),
                net_amount: m(amount) - m("2"),
            },
            PayoutMethod::BankTransfer {
                bank_name: "First Bank".to_string(),
                account_last4: "1234".to_string(),
            },
            SafetyChecks {
                no_open_disputes: true,
                balance_verified: true,
                method_verified: true,
            },
            false,
            at(created_ms),
        )
    }

    async fn insert(repo: &Repository, request: &PayoutRequest) {
        let mut conn = repo.pool().acquire().await.unwrap();
        repo.insert_payout_conn(&mut conn, request).await.unwrap();
    }

    #[tokio::test]
    async fn test_insert_and_get_payout() {
        let (repo, _temp) = setup().await;
        let r = request("v-1", "100", 1_000);
        insert(&repo, &r).await;

        let fetched = repo.get_payout(&r.id).await.unwrap().unwrap();
        assert_eq!(fetched, r);
    }

    #[tokio::test]
    async fn test_update_payout_status() {
        let (repo, _temp) = setup().await;
        let mut r = request("v-1", "100", 1_000);
        insert(&repo, &r).await;

        assert!(r.transition(PayoutStatus::Approved, "admin", None, at(2_000)));
        let mut conn = repo.pool().acquire().await.unwrap();
        repo.update_payout_conn(&mut conn, &r).await.unwrap();
        drop(conn);

        let fetched = repo.get_payout(&r.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, PayoutStatus::Approved);
        assert_eq!(fetched.status_history.len(), 2);
    }

    #[tokio::test]
    async fn test_non_terminal_detection() {
        let (repo, _temp) = setup().await;
        let vendor = VendorId::new("v-1");
        assert!(!repo.has_non_terminal_payout(&vendor).await.unwrap());

        let mut r = request("v-1", "100", 1_000);
        insert(&repo, &r).await;
        assert!(repo.has_non_terminal_payout(&vendor).await.unwrap());

        r.transition(PayoutStatus::Cancelled, "vendor", None, at(2_000));
        let mut conn = repo.pool().acquire().await.unwrap();
        repo.update_payout_conn(&mut conn, &r).await.unwrap();
        drop(conn);
        assert!(!repo.has_non_terminal_payout(&vendor).await.unwrap());
    }

    #[tokio::test]
    async fn test_latest_payout_created_at() {
        let (repo, _temp) = setup().await;
        let vendor = VendorId::new("v-1");
        assert!(repo.latest_payout_created_at(&vendor).await.unwrap().is_none());

        insert(&repo, &request("v-1", "50", 1_000)).await;
        insert(&repo, &request("v-1", "60", 5_000)).await;
        let latest = repo.latest_payout_created_at(&vendor).await.unwrap().unwrap();
        assert_eq!(latest, at(5_000));
    }

    #[tokio::test]
    async fn test_settings_roundtrip() {
        let (repo, _temp) = setup().await;
        let settings = PayoutSettings {
            vendor: VendorId::new("v-1"),
            auto_withdraw_enabled: true,
            auto_withdraw_threshold: m("500"),
            default_method: Some(PayoutMethod::MobileWallet {
                provider: "mpesa".to_string(),
                phone: "+254700000000".to_string(),
            }),
            method_verified: true,
            updated_at: at(1_000),
        };
        repo.upsert_payout_settings(&settings).await.unwrap();

        let fetched = repo
            .get_payout_settings(&settings.vendor)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched, settings);

        let auto = repo.auto_withdraw_vendors().await.unwrap();
        assert_eq!(auto.len(), 1);
    }

    #[tokio::test]
    async fn test_completed_payouts_in_window() {
        let (repo, _temp) = setup().await;
        let mut r = request("v-1", "100", 1_000);
        insert(&repo, &r).await;
        r.transition(PayoutStatus::Approved, "admin", None, at(2_000));
        r.transition(PayoutStatus::Processing, "admin", None, at(3_000));
        r.transition(PayoutStatus::Completed, "system", None, at(4_000));
        let mut conn = repo.pool().acquire().await.unwrap();
        repo.update_payout_conn(&mut conn, &r).await.unwrap();
        drop(conn);

        let rows = repo
            .completed_payouts_in_window(at(0), at(10_000))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].amount, m("100"));

        let outside = repo
            .completed_payouts_in_window(at(10_000), at(20_000))
            .await
            .unwrap();
        assert!(outside.is_empty());
    }
}
