use crate::api::leave_request::{
    DecisionBody, LeaveFilter, LeaveListResponse, LeaveResponse, RevokeBody,
};
use crate::api::quota::{QuotaFilter, QuotaOwner};
use crate::leave::{SubmitLeave, Verdict};
use crate::model::leave_request::LeaveStatus;
use crate::model::quota_ledger::{NewQuotaLedger, QuotaLedger, QuotaPatch};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "HRM Leave API",
        version = "1.0.0",
        description = r#"
## Leave Management

Employees submit leave requests against a yearly quota; an approver accepts or
rejects them. When an external workflow system is configured, every submission
opens a ticket there and its decisions are reconciled in the background.

### Key Features
- **Leave requests**: submit, revoke, delete, list by employee, approver inbox
- **Decisions**: approve / reject, each request decided exactly once
- **Quota ledgers**: per employee and year, annual leave drawn on approval

### Response Format
- JSON bodies, errors as `{"error": "..."}`
- 400 validation, 404 missing record, 409 already decided, 422 quota invariant

Authentication is enforced by the surrounding gateway.
"#,
    ),
    paths(
        crate::api::leave_request::create_leave,
        crate::api::leave_request::leave_list,
        crate::api::leave_request::pending_list,
        crate::api::leave_request::get_leave,
        crate::api::leave_request::delete_leave,
        crate::api::leave_request::approve_leave,
        crate::api::leave_request::reject_leave,
        crate::api::leave_request::revoke_leave,

        crate::api::quota::create_quota,
        crate::api::quota::quota_list,
        crate::api::quota::get_quota,
        crate::api::quota::update_quota,
        crate::api::quota::delete_quota
    ),
    components(
        schemas(
            SubmitLeave,
            LeaveStatus,
            Verdict,
            LeaveFilter,
            LeaveResponse,
            LeaveListResponse,
            DecisionBody,
            RevokeBody,
            QuotaLedger,
            NewQuotaLedger,
            QuotaPatch,
            QuotaFilter,
            QuotaOwner
        )
    ),
    tags(
        (name = "Leave", description = "Leave request APIs"),
        (name = "Quota", description = "Quota ledger APIs"),
    )
)]
pub struct ApiDoc;
