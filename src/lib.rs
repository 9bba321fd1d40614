pub mod api;
pub mod config;
pub mod db;
pub mod disbursement;
pub mod domain;
pub mod engine;
pub mod error;
pub mod jobs;
pub mod ledger;

pub use config::Config;
pub use db::{init_db, Repository};
pub use disbursement::{DisbursementRail, HttpDisbursementGateway, MockDisbursementRail};
pub use domain::{
    BalanceSnapshot, CategoryId, CommissionEntry, CommissionRule, Money, OrderId, PayoutRequest,
    PayoutStatus, ProductId, VendorId, VendorWallet, WalletTransaction,
};
pub use error::AppError;
pub use ledger::{CommissionService, PayoutService, WalletService};
