use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{Datelike, NaiveDate, SubsecRound, Utc};
use serde::Deserialize;
use tracing::info;
use utoipa::ToSchema;

use super::eligibility::EligibilityPolicy;
use super::ledger::QuotaBook;
use crate::error::{LeaveError, LeaveResult};
use crate::model::leave_request::{LeaveRequest, LeaveType, NewLeaveRequest};
use crate::store::{LeaveQuery, LeaveStore};
use crate::workflow::{PollerSupervisor, WorkflowBridge};

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SubmitLeave {
    #[schema(example = "alice")]
    pub employee_name: String,
    #[schema(example = "annual", value_type = String)]
    pub leave_type: LeaveType,
    #[schema(example = json!(["2026-04-01", "2026-04-02"]), value_type = Vec<String>)]
    pub requested_dates: Vec<NaiveDate>,
    #[schema(example = "Family trip")]
    pub reason: String,
}

/// Ticketing integration used after a submission is stored.
#[derive(Clone)]
pub struct Workflow {
    pub bridge: Arc<WorkflowBridge>,
    pub poller: Arc<PollerSupervisor>,
}

/// Submission and read side of leave requests.
#[derive(Clone)]
pub struct LeaveService {
    store: Arc<dyn LeaveStore>,
    quota: QuotaBook,
    eligibility: Arc<dyn EligibilityPolicy>,
    workflow: Option<Workflow>,
}

impl LeaveService {
    pub fn new(
        store: Arc<dyn LeaveStore>,
        eligibility: Arc<dyn EligibilityPolicy>,
        workflow: Option<Workflow>,
    ) -> Self {
        Self {
            quota: QuotaBook::new(store.clone()),
            store,
            eligibility,
            workflow,
        }
    }

    /// Validates and stores a new `Pending` request. When ticketing is
    /// configured, ticket creation runs in the background and a poller is
    /// ensured; neither can fail the submission.
    pub async fn submit(&self, input: SubmitLeave) -> LeaveResult<LeaveRequest> {
        let new = self.validate(input).await?;
        let request = self.store.insert_request(new).await?;
        info!(
            leave_id = request.id,
            employee = %request.employee_name,
            leave_type = %request.leave_type,
            used_days = request.used_days(),
            "leave request submitted"
        );

        if let Some(workflow) = &self.workflow {
            let bridge = workflow.bridge.clone();
            let submitted = request.clone();
            actix_web::rt::spawn(async move {
                bridge.register(&submitted).await;
            });
            workflow.poller.ensure_running();
        }
        Ok(request)
    }

    async fn validate(&self, input: SubmitLeave) -> LeaveResult<NewLeaveRequest> {
        let employee_name = input.employee_name.trim().to_string();
        if employee_name.is_empty() {
            return Err(LeaveError::validation("Missing required field: employee_name"));
        }
        if input.leave_type.as_str().trim().is_empty() {
            return Err(LeaveError::validation("Missing required field: leave_type"));
        }
        if input.reason.trim().is_empty() {
            return Err(LeaveError::validation("Missing required field: reason"));
        }
        if input.requested_dates.is_empty() {
            return Err(LeaveError::validation("At least one leave date is required"));
        }

        let unique: BTreeSet<NaiveDate> = input.requested_dates.iter().copied().collect();
        if unique.len() != input.requested_dates.len() {
            return Err(LeaveError::validation("Leave dates must not repeat"));
        }
        let requested_dates: Vec<NaiveDate> = unique.into_iter().collect();

        if !self
            .eligibility
            .is_eligible(&employee_name, &input.leave_type)
        {
            return Err(LeaveError::validation(format!(
                "{employee_name} is not eligible for {} leave",
                input.leave_type
            )));
        }

        // whole seconds, so the stored year matches the year checked here
        let created_at = Utc::now().trunc_subsecs(0);
        if input.leave_type.consumes_quota() {
            let used_days = requested_dates.len() as i32;
            if !self
                .quota
                .check_and_reserve(&employee_name, created_at.year(), used_days)
                .await?
            {
                return Err(LeaveError::validation(
                    "Not enough annual leave left for this year",
                ));
            }
        }

        Ok(NewLeaveRequest {
            employee_name,
            leave_type: input.leave_type,
            requested_dates,
            reason: input.reason.trim().to_string(),
            created_at,
        })
    }

    pub async fn get(&self, id: u64) -> LeaveResult<LeaveRequest> {
        self.store
            .get_request(id)
            .await?
            .ok_or_else(|| LeaveError::not_found("Leave request not found"))
    }

    pub async fn list(&self, query: &LeaveQuery) -> LeaveResult<(Vec<LeaveRequest>, i64)> {
        Ok(self.store.list_requests(query).await?)
    }

    pub async fn delete(&self, id: u64) -> LeaveResult<()> {
        if !self.store.delete_request(id).await? {
            return Err(LeaveError::not_found("Leave request not found"));
        }
        info!(leave_id = id, "leave request deleted");
        Ok(())
    }
}
