//! Leave lifecycle: submission rules, the approval state machine, and the
//! yearly quota ledger.

pub mod approval;
pub mod eligibility;
pub mod ledger;
pub mod service;

pub use approval::{ApprovalEngine, DecisionSource, Verdict};
pub use eligibility::{ConfiguredEligibility, EligibilityPolicy};
pub use ledger::QuotaBook;
pub use service::{LeaveService, SubmitLeave, Workflow};
