//! Payout request workflow types: status state machine, fees, methods.

use crate::domain::{Money, VendorId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Workflow status of a payout request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayoutStatus {
    Requested,
    UnderReview,
    Approved,
    Processing,
    Completed,
    Rejected,
    Cancelled,
}

impl PayoutStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayoutStatus::Requested => "requested",
            PayoutStatus::UnderReview => "under_review",
            PayoutStatus::Approved => "approved",
            PayoutStatus::Processing => "processing",
            PayoutStatus::Completed => "completed",
            PayoutStatus::Rejected => "rejected",
            PayoutStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "requested" => Some(PayoutStatus::Requested),
            "under_review" => Some(PayoutStatus::UnderReview),
            "approved" => Some(PayoutStatus::Approved),
            "processing" => Some(PayoutStatus::Processing),
            "completed" => Some(PayoutStatus::Completed),
            "rejected" => Some(PayoutStatus::Rejected),
            "cancelled" => Some(PayoutStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PayoutStatus::Completed | PayoutStatus::Rejected | PayoutStatus::Cancelled
        )
    }

    /// Legal forward transitions. Requested -> Approved is the automated
    /// fast path when safety checks pass; no other state is skipped.
    pub fn can_transition_to(&self, next: PayoutStatus) -> bool {
        use PayoutStatus::*;
        matches!(
            (*self, next),
            (Requested, UnderReview)
                | (Requested, Approved)
                | (Requested, Rejected)
                | (Requested, Cancelled)
                | (UnderReview, Approved)
                | (UnderReview, Rejected)
                | (UnderReview, Cancelled)
                | (Approved, Processing)
                | (Processing, Completed)
        )
    }

    /// Whether the vendor may cancel from this state. Later states are
    /// administrative cancellation only.
    pub fn vendor_cancellable(&self) -> bool {
        matches!(self, PayoutStatus::Requested | PayoutStatus::UnderReview)
    }
}

/// Payment method snapshot embedded in a request at creation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PayoutMethod {
    #[serde(rename_all = "camelCase")]
    BankTransfer {
        bank_name: String,
        account_last4: String,
    },
    #[serde(rename_all = "camelCase")]
    MobileWallet {
        provider: String,
        phone: String,
    },
    #[serde(rename_all = "camelCase")]
    Card {
        network: String,
        card_last4: String,
    },
}

impl PayoutMethod {
    pub fn kind_str(&self) -> &'static str {
        match self {
            PayoutMethod::BankTransfer { .. } => "bank_transfer",
            PayoutMethod::MobileWallet { .. } => "mobile_wallet",
            PayoutMethod::Card { .. } => "card",
        }
    }
}

/// Fee breakdown computed once at request creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeBreakdown {
    pub platform_fee: Money,
    pub processing_fee: Money,
    pub net_amount: Money,
}

/// Safety checks evaluated at creation; all must hold for auto-approval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafetyChecks {
    pub no_open_disputes: bool,
    pub balance_verified: bool,
    pub method_verified: bool,
}

impl SafetyChecks {
    pub fn all_passed(&self) -> bool {
        self.no_open_disputes && self.balance_verified && self.method_verified
    }
}

/// One entry of the request's status audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChange {
    pub from: Option<PayoutStatus>,
    pub to: PayoutStatus,
    pub at: DateTime<Utc>,
    pub actor: String,
    pub note: Option<String>,
}

/// One withdrawal attempt. Terminal requests are immutable except for
/// late-binding external transaction references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutRequest {
    pub id: String,
    pub vendor: VendorId,
    pub amount: Money,
    pub fees: FeeBreakdown,
    pub method: PayoutMethod,
    pub status: PayoutStatus,
    pub status_history: Vec<StatusChange>,
    pub checks: SafetyChecks,
    pub auto_initiated: bool,
    pub external_ref: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PayoutRequest {
    pub fn new(
        vendor: VendorId,
        amount: Money,
        fees: FeeBreakdown,
        method: PayoutMethod,
        checks: SafetyChecks,
        auto_initiated: bool,
        now: DateTime<Utc>,
    ) -> Self {
        let actor = if auto_initiated { "system" } else { "vendor" };
        PayoutRequest {
            id: Uuid::new_v4().to_string(),
            vendor,
            amount,
            fees,
            method,
            status: PayoutStatus::Requested,
            status_history: vec![StatusChange {
                from: None,
                to: PayoutStatus::Requested,
                at: now,
                actor: actor.to_string(),
                note: None,
            }],
            checks,
            auto_initiated,
            external_ref: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a status transition, appending to the audit trail.
    ///
    /// Returns `false` without mutating when the transition is illegal.
    pub fn transition(
        &mut self,
        next: PayoutStatus,
        actor: &str,
        note: Option<String>,
        now: DateTime<Utc>,
    ) -> bool {
        if !self.status.can_transition_to(next) {
            return false;
        }
        self.status_history.push(StatusChange {
            from: Some(self.status),
            to: next,
            at: now,
            actor: actor.to_string(),
            note,
        });
        self.status = next;
        self.updated_at = now;
        true
    }
}

/// Per-vendor payout configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutSettings {
    pub vendor: VendorId,
    pub auto_withdraw_enabled: bool,
    pub auto_withdraw_threshold: Money,
    pub default_method: Option<PayoutMethod>,
    pub method_verified: bool,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn m(s: &str) -> Money {
        Money::from_str_canonical(s).unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_700_000_000_000).unwrap()
    }

    fn request() -> PayoutRequest {
        PayoutRequest::new(
            VendorId::new("v-1"),
            m("1000"),
            FeeBreakdown {
                platform_fee: Money::zero(),
                processing_fee: m("20"),
                net_amount: m("980"),
            },
            PayoutMethod::MobileWallet {
                provider: "mpesa".to_string(),
                phone: "+254700000000".to_string(),
            },
            SafetyChecks {
                no_open_disputes: true,
                balance_verified: true,
                method_verified: true,
            },
            false,
            now(),
        )
    }

    #[test]
    fn test_full_happy_path() {
        let mut r = request();
        assert!(r.transition(PayoutStatus::UnderReview, "admin", None, now()));
        assert!(r.transition(PayoutStatus::Approved, "admin", None, now()));
        assert!(r.transition(PayoutStatus::Processing, "admin", None, now()));
        assert!(r.transition(PayoutStatus::Completed, "system", None, now()));
        assert_eq!(r.status_history.len(), 5);
        assert!(r.status.is_terminal());
    }

    #[test]
    fn test_auto_fast_path() {
        let mut r = request();
        assert!(r.transition(PayoutStatus::Approved, "system", None, now()));
        assert_eq!(r.status, PayoutStatus::Approved);
    }

    #[test]
    fn test_illegal_transitions_rejected() {
        let mut r = request();
        assert!(!r.transition(PayoutStatus::Processing, "admin", None, now()));
        assert!(!r.transition(PayoutStatus::Completed, "admin", None, now()));
        assert_eq!(r.status, PayoutStatus::Requested);
        assert_eq!(r.status_history.len(), 1);

        r.transition(PayoutStatus::Approved, "admin", None, now());
        assert!(!r.transition(PayoutStatus::Rejected, "admin", None, now()));
        assert!(!r.transition(PayoutStatus::Cancelled, "vendor", None, now()));
    }

    #[test]
    fn test_vendor_cancellable_only_early() {
        assert!(PayoutStatus::Requested.vendor_cancellable());
        assert!(PayoutStatus::UnderReview.vendor_cancellable());
        assert!(!PayoutStatus::Approved.vendor_cancellable());
        assert!(!PayoutStatus::Processing.vendor_cancellable());
    }

    #[test]
    fn test_terminal_states() {
        for s in [
            PayoutStatus::Completed,
            PayoutStatus::Rejected,
            PayoutStatus::Cancelled,
        ] {
            assert!(s.is_terminal());
        }
        for s in [
            PayoutStatus::Requested,
            PayoutStatus::UnderReview,
            PayoutStatus::Approved,
            PayoutStatus::Processing,
        ] {
            assert!(!s.is_terminal());
        }
    }

    #[test]
    fn test_status_roundtrip() {
        for s in [
            PayoutStatus::Requested,
            PayoutStatus::UnderReview,
            PayoutStatus::Approved,
            PayoutStatus::Processing,
            PayoutStatus::Completed,
            PayoutStatus::Rejected,
            PayoutStatus::Cancelled,
        ] {
            assert_eq!(PayoutStatus::parse(s.as_str()), Some(s));
        }
    }

    #[test]
    fn test_method_json_roundtrip() {
        let method = PayoutMethod::BankTransfer {
            bank_name: "First Bank".to_string(),
            account_last4: "1234".to_string(),
        };
        let json = serde_json::to_string(&method).unwrap();
        let back: PayoutMethod = serde_json::from_str(&json).unwrap();
        assert_eq!(back, method);
        assert_eq!(method.kind_str(), "bank_transfer");
    }
}
