//! Repository layer for database operations.
//!
//! Methods are organized across submodules by domain area:
//! - `rules.rs` - commission rule CRUD and resolution candidates
//! - `commissions.rs` - commission ledger entries and rollup source rows
//! - `wallets.rs` - wallet rows and the append-only transaction ledger
//! - `payouts.rs` - payout requests and per-vendor payout settings
//! - `summaries.rs` - financial summary upserts and reads
//!
//! Monetary columns hold canonical decimal strings; timestamps are epoch
//! milliseconds. Wallet and payout writes offer `&mut SqliteConnection`
//! variants so the ledger services can scope them inside one transaction.

mod commissions;
mod payouts;
mod rules;
mod summaries;
mod wallets;

use crate::domain::Money;
use chrono::{DateTime, TimeZone, Utc};
use sqlx::sqlite::SqlitePool;

pub use commissions::{EntryRollupRow, VendorEntryPage};
pub use payouts::PayoutRollupRow;

/// Repository for database operations.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }

    /// The underlying pool, for transaction scoping in the ledger services.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Parse a stored canonical money string; malformed values read as zero.
pub(crate) fn money_col(s: &str) -> Money {
    Money::from_str_canonical(s).unwrap_or_default()
}

pub(crate) fn dt_from_ms(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .unwrap_or_else(|| Utc.timestamp_millis_opt(0).unwrap())
}

pub(crate) fn opt_dt_from_ms(ms: Option<i64>) -> Option<DateTime<Utc>> {
    ms.map(dt_from_ms)
}
