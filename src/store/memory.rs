use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::{
    LeaveQuery, LeaveStore, LedgerQuery, StoreError, StoreResult, Transition, TransitionOutcome,
};
use crate::model::leave_request::{LeaveRequest, LeaveStatus, NewLeaveRequest, TicketRef};
use crate::model::quota_ledger::{LedgerRuleError, NewQuotaLedger, QuotaLedger, QuotaPatch};

#[derive(Default)]
struct Tables {
    next_request_id: u64,
    next_ledger_id: u64,
    requests: BTreeMap<u64, LeaveRequest>,
    ledgers: BTreeMap<u64, QuotaLedger>,
    leases: BTreeMap<String, (String, DateTime<Utc>)>,
}

impl Tables {
    fn ledger_mut(&mut self, employee_name: &str, year: i32) -> Option<&mut QuotaLedger> {
        self.ledgers
            .values_mut()
            .find(|l| l.employee_name == employee_name && l.year == year)
    }
}

/// Process-local store. Backs local development (`STORE_BACKEND=memory`) and
/// the test suites. A single lock over all tables makes every operation,
/// including the guarded transition, atomic.
#[derive(Default)]
pub struct MemoryLeaveStore {
    tables: Mutex<Tables>,
}

impl MemoryLeaveStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LeaveStore for MemoryLeaveStore {
    async fn insert_request(&self, new: NewLeaveRequest) -> StoreResult<LeaveRequest> {
        let mut tables = self.tables.lock().await;
        tables.next_request_id += 1;
        let request = LeaveRequest {
            id: tables.next_request_id,
            employee_name: new.employee_name,
            leave_type: new.leave_type,
            requested_dates: new.requested_dates,
            reason: new.reason,
            status: LeaveStatus::Pending,
            approver_name: None,
            approver_comment: None,
            decided_at: None,
            external_ticket_id: None,
            external_task_id: None,
            created_at: new.created_at,
        };
        tables.requests.insert(request.id, request.clone());
        Ok(request)
    }

    async fn get_request(&self, id: u64) -> StoreResult<Option<LeaveRequest>> {
        Ok(self.tables.lock().await.requests.get(&id).cloned())
    }

    async fn list_requests(&self, query: &LeaveQuery) -> StoreResult<(Vec<LeaveRequest>, i64)> {
        let tables = self.tables.lock().await;
        let mut matched: Vec<&LeaveRequest> = tables
            .requests
            .values()
            .filter(|r| {
                query
                    .employee_name
                    .as_deref()
                    .is_none_or(|name| r.employee_name == name)
            })
            .filter(|r| query.status.is_none_or(|status| r.status == status))
            .filter(|r| query.year.is_none_or(|year| r.quota_year() == year))
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let total = matched.len() as i64;
        let page = matched
            .into_iter()
            .skip(query.offset() as usize)
            .take(query.per_page as usize)
            .cloned()
            .collect();
        Ok((page, total))
    }

    async fn pending_requests(&self) -> StoreResult<Vec<LeaveRequest>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .requests
            .values()
            .filter(|r| r.is_pending())
            .cloned()
            .collect())
    }

    async fn delete_request(&self, id: u64) -> StoreResult<bool> {
        Ok(self.tables.lock().await.requests.remove(&id).is_some())
    }

    async fn attach_ticket(&self, id: u64, ticket: &TicketRef) -> StoreResult<bool> {
        let mut tables = self.tables.lock().await;
        match tables.requests.get_mut(&id) {
            Some(request) if request.external_ticket_id.is_none() => {
                request.external_ticket_id = Some(ticket.ticket_id.clone());
                request.external_task_id = Some(ticket.task_id.clone());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn apply_transition(&self, transition: &Transition) -> StoreResult<TransitionOutcome> {
        let mut tables = self.tables.lock().await;
        let status = match tables.requests.get(&transition.request_id) {
            None => return Ok(TransitionOutcome::Missing),
            Some(request) => request.status,
        };
        if status != LeaveStatus::Pending {
            return Ok(TransitionOutcome::NotPending(status));
        }

        if let Some(consume) = &transition.consume {
            let Some(ledger) = tables.ledger_mut(&consume.employee_name, consume.year) else {
                return Ok(TransitionOutcome::LedgerMissing);
            };
            match ledger.commit_consumption(consume.days) {
                Ok(()) => {}
                Err(LedgerRuleError::Insufficient { available, .. }) => {
                    return Ok(TransitionOutcome::InsufficientQuota { available });
                }
                Err(err @ LedgerRuleError::NonPositive(_)) => {
                    return Err(StoreError::Corrupt(err.to_string()));
                }
            }
        }

        let Some(request) = tables.requests.get_mut(&transition.request_id) else {
            return Ok(TransitionOutcome::Missing);
        };
        request.status = transition.to;
        request.approver_name = transition.approver_name.clone();
        request.approver_comment = transition.approver_comment.clone();
        request.decided_at = Some(transition.decided_at);
        Ok(TransitionOutcome::Applied(request.clone()))
    }

    async fn insert_ledger(&self, new: NewQuotaLedger) -> StoreResult<QuotaLedger> {
        let mut tables = self.tables.lock().await;
        if tables.ledger_mut(&new.employee_name, new.year).is_some() {
            return Err(StoreError::Duplicate(format!(
                "quota ledger for {} in {}",
                new.employee_name, new.year
            )));
        }
        tables.next_ledger_id += 1;
        let ledger = QuotaLedger {
            id: tables.next_ledger_id,
            employee_name: new.employee_name,
            year: new.year,
            available_days: new.available_days,
            used_days: new.used_days,
            work_year: new.work_year,
            anniversary_year: new.anniversary_year,
            created_at: Utc::now(),
        };
        tables.ledgers.insert(ledger.id, ledger.clone());
        Ok(ledger)
    }

    async fn get_ledger(&self, id: u64) -> StoreResult<Option<QuotaLedger>> {
        Ok(self.tables.lock().await.ledgers.get(&id).cloned())
    }

    async fn find_ledger(&self, employee_name: &str, year: i32) -> StoreResult<Option<QuotaLedger>> {
        let mut tables = self.tables.lock().await;
        Ok(tables.ledger_mut(employee_name, year).map(|l| l.clone()))
    }

    async fn list_ledgers(&self, query: &LedgerQuery) -> StoreResult<Vec<QuotaLedger>> {
        let tables = self.tables.lock().await;
        let mut rows: Vec<QuotaLedger> = tables
            .ledgers
            .values()
            .filter(|l| {
                query
                    .employee_name
                    .as_deref()
                    .is_none_or(|name| l.employee_name == name)
            })
            .filter(|l| query.year.is_none_or(|year| l.year == year))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(rows)
    }

    async fn update_ledger(&self, id: u64, patch: &QuotaPatch) -> StoreResult<Option<QuotaLedger>> {
        let mut tables = self.tables.lock().await;
        if let Some(year) = patch.year {
            let clash = tables.ledgers.get(&id).and_then(|current| {
                tables
                    .ledgers
                    .values()
                    .find(|l| l.id != id && l.employee_name == current.employee_name && l.year == year)
            });
            if clash.is_some() {
                return Err(StoreError::Duplicate(format!("quota ledger for year {year}")));
            }
        }
        Ok(tables.ledgers.get_mut(&id).map(|ledger| {
            ledger.apply_patch(patch);
            ledger.clone()
        }))
    }

    async fn delete_ledger(&self, id: u64) -> StoreResult<bool> {
        Ok(self.tables.lock().await.ledgers.remove(&id).is_some())
    }

    async fn try_acquire_lease(
        &self,
        name: &str,
        holder: &str,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let mut tables = self.tables.lock().await;
        let free = match tables.leases.get(name) {
            None => true,
            Some((current, until)) => current == holder || *until < now,
        };
        if free {
            tables
                .leases
                .insert(name.to_string(), (holder.to_string(), expires_at));
        }
        Ok(free)
    }

    async fn release_lease(&self, name: &str, holder: &str) -> StoreResult<()> {
        let mut tables = self.tables.lock().await;
        if tables.leases.get(name).is_some_and(|(current, _)| current == holder) {
            tables.leases.remove(name);
        }
        Ok(())
    }
}
