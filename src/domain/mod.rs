//! Framework-agnostic ledger model: obligations, payment claims, billing
//! calendar and the waterfall allocation planner.

pub mod allocation;
pub mod billing;
pub mod obligation;
pub mod transaction;

pub use allocation::{Allocation, AllocationPlan};
pub use obligation::{CycleInsert, NewObligation, Obligation, ObligationLabel, ObligationStatus};
pub use transaction::{PaymentTransaction, SubmissionOutcome, VerificationState};
