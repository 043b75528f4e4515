//! Record store for leave requests, quota ledgers and the poller lease.
//!
//! Every status change goes through [`LeaveStore::apply_transition`], which
//! performs the "still pending?" check and the write as one atomic step and,
//! for approved annual leave, consumes the quota inside the same step.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::model::leave_request::{LeaveRequest, LeaveStatus, NewLeaveRequest, TicketRef};
use crate::model::quota_ledger::{NewQuotaLedger, QuotaLedger, QuotaPatch};

pub mod memory;
pub mod mysql;

pub use memory::MemoryLeaveStore;
pub use mysql::MySqlLeaveStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("record already exists: {0}")]
    Duplicate(String),
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone, Default)]
pub struct LeaveQuery {
    pub employee_name: Option<String>,
    pub status: Option<LeaveStatus>,
    pub year: Option<i32>,
    /// 1-based
    pub page: u64,
    pub per_page: u64,
}

impl LeaveQuery {
    pub fn pending() -> Self {
        Self {
            status: Some(LeaveStatus::Pending),
            ..Default::default()
        }
    }

    pub fn offset(&self) -> u64 {
        self.page.saturating_sub(1) * self.per_page
    }
}

#[derive(Debug, Clone, Default)]
pub struct LedgerQuery {
    pub employee_name: Option<String>,
    pub year: Option<i32>,
}

/// Quota to draw down together with a status change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Consumption {
    pub employee_name: String,
    pub year: i32,
    pub days: i32,
}

/// A guarded move out of `Pending`.
#[derive(Debug, Clone)]
pub struct Transition {
    pub request_id: u64,
    pub to: LeaveStatus,
    pub approver_name: Option<String>,
    pub approver_comment: Option<String>,
    pub decided_at: DateTime<Utc>,
    pub consume: Option<Consumption>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransitionOutcome {
    Applied(LeaveRequest),
    /// No request with that id.
    Missing,
    /// Someone else already decided it.
    NotPending(LeaveStatus),
    /// Annual leave approved but no ledger row for (employee, year).
    LedgerMissing,
    InsufficientQuota { available: i32 },
}

#[async_trait]
pub trait LeaveStore: Send + Sync {
    async fn insert_request(&self, new: NewLeaveRequest) -> StoreResult<LeaveRequest>;
    async fn get_request(&self, id: u64) -> StoreResult<Option<LeaveRequest>>;
    /// Newest first. Returns the page plus the total match count.
    async fn list_requests(&self, query: &LeaveQuery) -> StoreResult<(Vec<LeaveRequest>, i64)>;
    async fn pending_requests(&self) -> StoreResult<Vec<LeaveRequest>>;
    async fn delete_request(&self, id: u64) -> StoreResult<bool>;

    /// Write-once: returns `false` when the request is missing or already linked.
    async fn attach_ticket(&self, id: u64, ticket: &TicketRef) -> StoreResult<bool>;

    async fn apply_transition(&self, transition: &Transition) -> StoreResult<TransitionOutcome>;

    async fn insert_ledger(&self, new: NewQuotaLedger) -> StoreResult<QuotaLedger>;
    async fn get_ledger(&self, id: u64) -> StoreResult<Option<QuotaLedger>>;
    async fn find_ledger(&self, employee_name: &str, year: i32) -> StoreResult<Option<QuotaLedger>>;
    async fn list_ledgers(&self, query: &LedgerQuery) -> StoreResult<Vec<QuotaLedger>>;
    async fn update_ledger(&self, id: u64, patch: &QuotaPatch) -> StoreResult<Option<QuotaLedger>>;
    async fn delete_ledger(&self, id: u64) -> StoreResult<bool>;

    /// Takes or renews the named lease for `holder` until `expires_at`.
    /// Succeeds when the lease is free, expired, or already held by `holder`.
    async fn try_acquire_lease(
        &self,
        name: &str,
        holder: &str,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<bool>;
    async fn release_lease(&self, name: &str, holder: &str) -> StoreResult<()>;
}
