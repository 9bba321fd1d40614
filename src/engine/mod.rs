//! Pure computation engines: rule resolution, commission math, payout fees.
//!
//! Everything here is stateless and freely parallelizable across order
//! line items; all I/O stays in the ledger services.

pub mod commission;
pub mod fees;
pub mod resolver;

pub use commission::{compute_commission, CommissionBreakdown};
pub use fees::{compute_fees, FeeSchedule};
pub use resolver::{ResolvedRate, RuleResolver};
