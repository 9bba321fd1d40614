//! Vendor wallet: the three-bucket balance and its closed set of transitions.
//!
//! Balance fields are private. The six transition methods below are the
//! only way any code mutates a balance; each validates its precondition,
//! applies the move, and returns the post-mutation snapshot for the
//! ledger row the caller must append.

use crate::domain::{Money, VendorId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Balances immediately after a wallet mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceSnapshot {
    pub available: Money,
    pub pending: Money,
    pub reserved: Money,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WalletError {
    #[error("amount must be positive, got {0}")]
    NonPositiveAmount(Money),
    #[error("insufficient {bucket} balance: have {have}, need {need}")]
    InsufficientBalance {
        bucket: &'static str,
        have: Money,
        need: Money,
    },
    /// A refund exceeded available + pending. This cannot happen in a
    /// correctly accounted system and must surface to an operator.
    #[error("refund {need} exceeds available + pending ({have})")]
    Inconsistent { have: Money, need: Money },
}

/// One wallet row per vendor. Created lazily on the first earning event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VendorWallet {
    pub vendor: VendorId,
    available: Money,
    pending: Money,
    reserved: Money,
    total_earned: Money,
    total_commission_paid: Money,
    total_withdrawn: Money,
    total_refunded: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VendorWallet {
    /// A zeroed wallet for a vendor's first earning event.
    pub fn new(vendor: VendorId, now: DateTime<Utc>) -> Self {
        VendorWallet {
            vendor,
            available: Money::zero(),
            pending: Money::zero(),
            reserved: Money::zero(),
            total_earned: Money::zero(),
            total_commission_paid: Money::zero(),
            total_withdrawn: Money::zero(),
            total_refunded: Money::zero(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Rehydrate a wallet from storage. Only the repository layer calls this.
    #[allow(clippy::too_many_arguments)]
    pub fn from_storage(
        vendor: VendorId,
        available: Money,
        pending: Money,
        reserved: Money,
        total_earned: Money,
        total_commission_paid: Money,
        total_withdrawn: Money,
        total_refunded: Money,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        VendorWallet {
            vendor,
            available,
            pending,
            reserved,
            total_earned,
            total_commission_paid,
            total_withdrawn,
            total_refunded,
            created_at,
            updated_at,
        }
    }

    pub fn available(&self) -> Money {
        self.available
    }

    pub fn pending(&self) -> Money {
        self.pending
    }

    pub fn reserved(&self) -> Money {
        self.reserved
    }

    pub fn total_earned(&self) -> Money {
        self.total_earned
    }

    pub fn total_commission_paid(&self) -> Money {
        self.total_commission_paid
    }

    pub fn total_withdrawn(&self) -> Money {
        self.total_withdrawn
    }

    pub fn total_refunded(&self) -> Money {
        self.total_refunded
    }

    pub fn snapshot(&self) -> BalanceSnapshot {
        BalanceSnapshot {
            available: self.available,
            pending: self.pending,
            reserved: self.reserved,
        }
    }

    fn require_positive(amount: Money) -> Result<(), WalletError> {
        if !amount.is_positive() {
            return Err(WalletError::NonPositiveAmount(amount));
        }
        Ok(())
    }

    /// Credit earnings into the pending bucket on order fulfillment.
    ///
    /// `commission` is the platform's cut recorded alongside the earning
    /// for the lifetime counters.
    pub fn credit_pending(
        &mut self,
        earning: Money,
        commission: Money,
        now: DateTime<Utc>,
    ) -> Result<BalanceSnapshot, WalletError> {
        Self::require_positive(earning)?;
        self.pending += earning;
        self.total_earned += earning;
        self.total_commission_paid += commission;
        self.updated_at = now;
        Ok(self.snapshot())
    }

    /// Move matured funds from pending to available (holding period expiry).
    pub fn release_pending_to_available(
        &mut self,
        amount: Money,
        now: DateTime<Utc>,
    ) -> Result<BalanceSnapshot, WalletError> {
        Self::require_positive(amount)?;
        if amount > self.pending {
            return Err(WalletError::InsufficientBalance {
                bucket: "pending",
                have: self.pending,
                need: amount,
            });
        }
        self.pending -= amount;
        self.available += amount;
        self.updated_at = now;
        Ok(self.snapshot())
    }

    /// Reserve available funds for an in-flight payout request.
    pub fn reserve_for_payout(
        &mut self,
        amount: Money,
        now: DateTime<Utc>,
    ) -> Result<BalanceSnapshot, WalletError> {
        Self::require_positive(amount)?;
        if amount > self.available {
            return Err(WalletError::InsufficientBalance {
                bucket: "available",
                have: self.available,
                need: amount,
            });
        }
        self.available -= amount;
        self.reserved += amount;
        self.updated_at = now;
        Ok(self.snapshot())
    }

    /// Debit reserved funds on disbursement confirmation.
    pub fn complete_payout(
        &mut self,
        amount: Money,
        now: DateTime<Utc>,
    ) -> Result<BalanceSnapshot, WalletError> {
        Self::require_positive(amount)?;
        if amount > self.reserved {
            return Err(WalletError::InsufficientBalance {
                bucket: "reserved",
                have: self.reserved,
                need: amount,
            });
        }
        self.reserved -= amount;
        self.total_withdrawn += amount;
        self.updated_at = now;
        Ok(self.snapshot())
    }

    /// Return reserved funds to available on rejection/cancellation.
    pub fn cancel_payout(
        &mut self,
        amount: Money,
        now: DateTime<Utc>,
    ) -> Result<BalanceSnapshot, WalletError> {
        Self::require_positive(amount)?;
        if amount > self.reserved {
            return Err(WalletError::InsufficientBalance {
                bucket: "reserved",
                have: self.reserved,
                need: amount,
            });
        }
        self.reserved -= amount;
        self.available += amount;
        self.updated_at = now;
        Ok(self.snapshot())
    }

    /// Debit a refund: available first, then pending for the remainder.
    ///
    /// Errors with [`WalletError::Inconsistent`] when the two buckets
    /// together cannot cover the refund; the wallet is left untouched.
    pub fn process_refund(
        &mut self,
        amount: Money,
        now: DateTime<Utc>,
    ) -> Result<BalanceSnapshot, WalletError> {
        Self::require_positive(amount)?;
        let coverage = self.available + self.pending;
        if amount > coverage {
            return Err(WalletError::Inconsistent {
                have: coverage,
                need: amount,
            });
        }
        let from_available = amount.min(self.available);
        let from_pending = amount - from_available;
        self.available -= from_available;
        self.pending -= from_pending;
        self.total_refunded += amount;
        self.updated_at = now;
        Ok(self.snapshot())
    }
}
