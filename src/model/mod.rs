pub mod leave_request;
pub mod quota_ledger;
