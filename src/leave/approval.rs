use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use strum_macros::Display;
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::error::{LeaveError, LeaveResult};
use crate::model::leave_request::{LeaveRequest, LeaveStatus};
use crate::store::{Consumption, LeaveStore, Transition, TransitionOutcome};

/// Terminal decision an approver (human or external) can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Display, ToSchema)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Verdict {
    Approve,
    Reject,
}

impl Verdict {
    fn target(self) -> LeaveStatus {
        match self {
            Verdict::Approve => LeaveStatus::Approved,
            Verdict::Reject => LeaveStatus::Rejected,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum DecisionSource {
    Approver,
    Reconciliation,
}

/// The single path through which a leave request leaves `Pending`.
#[derive(Clone)]
pub struct ApprovalEngine {
    store: Arc<dyn LeaveStore>,
}

impl ApprovalEngine {
    pub fn new(store: Arc<dyn LeaveStore>) -> Self {
        Self { store }
    }

    /// Approves or rejects a pending request. Approving annual leave consumes
    /// the requester's quota for the submission year in the same atomic step.
    pub async fn decide(
        &self,
        id: u64,
        verdict: Verdict,
        approver: &str,
        comment: Option<String>,
        source: DecisionSource,
    ) -> LeaveResult<LeaveRequest> {
        if approver.trim().is_empty() {
            return Err(LeaveError::validation("Missing required field: approver"));
        }

        let request = self.load(id).await?;
        if !request.is_pending() {
            return Err(LeaveError::Conflict {
                id,
                status: request.status,
            });
        }

        let consume = (verdict == Verdict::Approve && request.leave_type.consumes_quota()).then(
            || Consumption {
                employee_name: request.employee_name.clone(),
                year: request.quota_year(),
                days: request.used_days(),
            },
        );

        let transition = Transition {
            request_id: id,
            to: verdict.target(),
            approver_name: Some(approver.trim().to_string()),
            approver_comment: comment,
            decided_at: Utc::now(),
            consume,
        };

        let decided = self.apply(&request, &transition).await?;
        info!(
            leave_id = id,
            %verdict,
            %source,
            approver = %approver,
            employee = %decided.employee_name,
            "leave request decided"
        );
        Ok(decided)
    }

    /// Withdraws a pending request. Only the submitter may do this.
    pub async fn revoke(&self, id: u64, requester: &str) -> LeaveResult<LeaveRequest> {
        let request = self.load(id).await?;
        if request.employee_name != requester {
            return Err(LeaveError::validation(
                "Only the submitter can revoke a leave request",
            ));
        }
        if !request.is_pending() {
            return Err(LeaveError::Conflict {
                id,
                status: request.status,
            });
        }

        let transition = Transition {
            request_id: id,
            to: LeaveStatus::Revoked,
            approver_name: None,
            approver_comment: None,
            decided_at: Utc::now(),
            consume: None,
        };
        let revoked = self.apply(&request, &transition).await?;
        info!(leave_id = id, employee = %requester, "leave request revoked");
        Ok(revoked)
    }

    async fn load(&self, id: u64) -> LeaveResult<LeaveRequest> {
        self.store
            .get_request(id)
            .await?
            .ok_or_else(|| LeaveError::not_found("Leave request not found"))
    }

    async fn apply(
        &self,
        request: &LeaveRequest,
        transition: &Transition,
    ) -> LeaveResult<LeaveRequest> {
        match self.store.apply_transition(transition).await? {
            TransitionOutcome::Applied(updated) => Ok(updated),
            TransitionOutcome::Missing => Err(LeaveError::not_found("Leave request not found")),
            TransitionOutcome::NotPending(status) => Err(LeaveError::Conflict {
                id: request.id,
                status,
            }),
            TransitionOutcome::LedgerMissing => {
                warn!(
                    leave_id = request.id,
                    employee = %request.employee_name,
                    year = request.quota_year(),
                    "approval blocked: no quota ledger"
                );
                Err(LeaveError::InvariantViolation(format!(
                    "No quota ledger for {} in {}; annual leave cannot be approved",
                    request.employee_name,
                    request.quota_year()
                )))
            }
            TransitionOutcome::InsufficientQuota { available } => {
                warn!(
                    leave_id = request.id,
                    employee = %request.employee_name,
                    available,
                    requested = request.used_days(),
                    "approval blocked: insufficient quota"
                );
                Err(LeaveError::InvariantViolation(format!(
                    "{} day(s) requested but only {available} available",
                    request.used_days()
                )))
            }
        }
    }
}
