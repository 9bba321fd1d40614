//! Ledger services: the only write paths to wallets and payout requests.

pub mod commission_service;
pub mod payout_service;
pub mod wallet_service;

pub use commission_service::{CommissionService, SaleEventError, SaleItem};
pub use payout_service::{PayoutError, PayoutService};
pub use wallet_service::{LedgerError, ReconcileReport, WalletOp, WalletService};
