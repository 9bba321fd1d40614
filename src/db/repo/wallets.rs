//! Vendor wallet rows and the append-only wallet transaction ledger.

use super::{dt_from_ms, money_col, opt_dt_from_ms, Repository};
use crate::domain::{
    BalanceSnapshot, TxCategory, TxReference, TxType, VendorId, VendorWallet, WalletTransaction,
};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteConnection;
use sqlx::Row;

impl Repository {
    pub async fn get_wallet(&self, vendor: &VendorId) -> Result<Option<VendorWallet>, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM vendor_wallets WHERE vendor = ?")
            .bind(vendor.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| row_to_wallet(&r)))
    }

    /// Wallet read on the caller's connection, for transaction scoping.
    pub async fn get_wallet_conn(
        &self,
        conn: &mut SqliteConnection,
        vendor: &VendorId,
    ) -> Result<Option<VendorWallet>, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM vendor_wallets WHERE vendor = ?")
            .bind(vendor.as_str())
            .fetch_optional(&mut *conn)
            .await?;
        Ok(row.map(|r| row_to_wallet(&r)))
    }

    /// Persist a wallet's balances and counters on the caller's connection.
    pub async fn upsert_wallet_conn(
        &self,
        conn: &mut SqliteConnection,
        wallet: &VendorWallet,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO vendor_wallets (
                vendor, available, pending, reserved, total_earned,
                total_commission_paid, total_withdrawn, total_refunded,
                created_at_ms, updated_at_ms
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(vendor) DO UPDATE SET
                available = excluded.available,
                pending = excluded.pending,
                reserved = excluded.reserved,
                total_earned = excluded.total_earned,
                total_commission_paid = excluded.total_commission_paid,
                total_withdrawn = excluded.total_withdrawn,
                total_refunded = excluded.total_refunded,
                updated_at_ms = excluded.updated_at_ms
            "#,
        )
        .bind(wallet.vendor.as_str())
        .bind(wallet.available().to_canonical_string())
        .bind(wallet.pending().to_canonical_string())
        .bind(wallet.reserved().to_canonical_string())
        .bind(wallet.total_earned().to_canonical_string())
        .bind(wallet.total_commission_paid().to_canonical_string())
        .bind(wallet.total_withdrawn().to_canonical_string())
        .bind(wallet.total_refunded().to_canonical_string())
        .bind(wallet.created_at.timestamp_millis())
        .bind(wallet.updated_at.timestamp_millis())
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// Append a ledger row on the caller's connection.
    pub async fn insert_transaction_conn(
        &self,
        conn: &mut SqliteConnection,
        tx: &WalletTransaction,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO wallet_transactions (
                id, vendor, tx_type, category, amount,
                available_after, pending_after, reserved_after,
                reference_kind, reference_id, note,
                release_at_ms, released_at_ms, created_at_ms
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&tx.id)
        .bind(tx.vendor.as_str())
        .bind(tx.tx_type.as_str())
        .bind(tx.category.as_str())
        .bind(tx.amount.to_canonical_string())
        .bind(tx.balance_after.available.to_canonical_string())
        .bind(tx.balance_after.pending.to_canonical_string())
        .bind(tx.balance_after.reserved.to_canonical_string())
        .bind(tx.reference.as_ref().map(|r| r.kind.as_str()))
        .bind(tx.reference.as_ref().map(|r| r.id.as_str()))
        .bind(tx.note.as_deref())
        .bind(tx.release_at.map(|t| t.timestamp_millis()))
        .bind(tx.released_at.map(|t| t.timestamp_millis()))
        .bind(tx.created_at.timestamp_millis())
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    pub async fn get_transaction(
        &self,
        id: &str,
    ) -> Result<Option<WalletTransaction>, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM wallet_transactions WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| row_to_tx(&r)))
    }

    /// The most recently appended row for a vendor, if any.
    pub async fn latest_transaction(
        &self,
        vendor: &VendorId,
    ) -> Result<Option<WalletTransaction>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT * FROM wallet_transactions WHERE vendor = ?
            ORDER BY created_at_ms DESC, rowid DESC LIMIT 1
            "#,
        )
        .bind(vendor.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| row_to_tx(&r)))
    }

    /// One page of a vendor's history, reverse-chronological, plus the
    /// total row count.
    pub async fn list_transactions(
        &self,
        vendor: &VendorId,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<WalletTransaction>, i64), sqlx::Error> {
        let total: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM wallet_transactions WHERE vendor = ?")
                .bind(vendor.as_str())
                .fetch_one(&self.pool)
                .await?;

        let rows = sqlx::query(
            r#"
            SELECT * FROM wallet_transactions WHERE vendor = ?
            ORDER BY created_at_ms DESC, rowid DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(vendor.as_str())
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok((rows.iter().map(row_to_tx).collect(), total.0))
    }

    /// Full history in application order, for ledger replay.
    pub async fn all_transactions_asc(
        &self,
        vendor: &VendorId,
    ) -> Result<Vec<WalletTransaction>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM wallet_transactions WHERE vendor = ?
            ORDER BY created_at_ms ASC, rowid ASC
            "#,
        )
        .bind(vendor.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(row_to_tx).collect())
    }

    /// Sale holds whose release date has passed and which are not yet
    /// released.
    pub async fn due_holds(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<WalletTransaction>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM wallet_transactions
            WHERE tx_type = 'hold' AND release_at_ms IS NOT NULL
              AND release_at_ms <= ? AND released_at_ms IS NULL
            ORDER BY release_at_ms ASC, rowid ASC
            LIMIT ?
            "#,
        )
        .bind(now.timestamp_millis())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(row_to_tx).collect())
    }

    /// Claim a hold row for release. The `released_at IS NULL` guard makes
    /// the release job idempotent; returns false when the row was already
    /// claimed.
    pub async fn mark_hold_released_conn(
        &self,
        conn: &mut SqliteConnection,
        tx_id: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE wallet_transactions SET released_at_ms = ? WHERE id = ? AND released_at_ms IS NULL",
        )
        .bind(now.timestamp_millis())
        .bind(tx_id)
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

fn row_to_wallet(row: &sqlx::sqlite::SqliteRow) -> VendorWallet {
    let available: String = row.get("available");
    let pending: String = row.get("pending");
    let reserved: String = row.get("reserved");
    let total_earned: String = row.get("total_earned");
    let total_commission_paid: String = row.get("total_commission_paid");
    let total_withdrawn: String = row.get("total_withdrawn");
    let total_refunded: String = row.get("total_refunded");

    VendorWallet::from_storage(
        VendorId::new(row.get::<String, _>("vendor")),
        money_col(&available),
        money_col(&pending),
        money_col(&reserved),
        money_col(&total_earned),
        money_col(&total_commission_paid),
        money_col(&total_withdrawn),
        money_col(&total_refunded),
        dt_from_ms(row.get("created_at_ms")),
        dt_from_ms(row.get("updated_at_ms")),
    )
}

fn row_to_tx(row: &sqlx::sqlite::SqliteRow) -> WalletTransaction {
    let tx_type: String = row.get("tx_type");
    let category: String = row.get("category");
    let amount: String = row.get("amount");
    let available_after: String = row.get("available_after");
    let pending_after: String = row.get("pending_after");
    let reserved_after: String = row.get("reserved_after");
    let reference_kind: Option<String> = row.get("reference_kind");
    let reference_id: Option<String> = row.get("reference_id");

    WalletTransaction {
        id: row.get("id"),
        vendor: VendorId::new(row.get::<String, _>("vendor")),
        tx_type: TxType::parse(&tx_type).unwrap_or(TxType::Adjustment),
        category: TxCategory::parse(&category).unwrap_or(TxCategory::Adjustment),
        amount: money_col(&amount),
        balance_after: BalanceSnapshot {
            available: money_col(&available_after),
            pending: money_col(&pending_after),
            reserved: money_col(&reserved_after),
        },
        reference: match (reference_kind, reference_id) {
            (Some(kind), Some(id)) => Some(TxReference { kind, id }),
            _ => None,
        },
        note: row.get("note"),
        release_at: opt_dt_from_ms(row.get("release_at_ms")),
        released_at: opt_dt_from_ms(row.get("released_at_ms")),
        created_at: dt_from_ms(row.get("created_at_ms")),
    }
}
