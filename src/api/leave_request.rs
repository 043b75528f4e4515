use actix_web::{HttpResponse, Responder, web};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::leave::{DecisionSource, SubmitLeave, Verdict};
use crate::model::leave_request::{LeaveRequest, LeaveStatus};
use crate::state::AppState;
use crate::store::LeaveQuery;

#[derive(Serialize, Deserialize, ToSchema)]
pub struct LeaveResponse {
    #[schema(example = 1)]
    /// leave application id
    pub id: u64,
    #[schema(example = "alice")]
    pub employee_name: String,
    #[schema(example = "annual")]
    pub leave_type: String,
    #[schema(example = json!(["2026-04-01", "2026-04-02"]), value_type = Vec<String>)]
    pub requested_dates: Vec<NaiveDate>,
    /// number of requested dates
    #[schema(example = 2)]
    pub used_days: i32,
    #[schema(example = "Family trip")]
    pub reason: String,
    pub status: LeaveStatus,
    pub approver_name: Option<String>,
    pub approver_comment: Option<String>,
    #[schema(example = "2026-01-02T09:30:00Z", format = "date-time", value_type = Option<String>)]
    pub decided_at: Option<DateTime<Utc>>,
    pub external_ticket_id: Option<String>,
    pub external_task_id: Option<String>,
    #[schema(example = "2026-01-01T00:00:00Z", format = "date-time", value_type = String)]
    pub created_at: DateTime<Utc>,
}

impl From<LeaveRequest> for LeaveResponse {
    fn from(request: LeaveRequest) -> Self {
        Self {
            id: request.id,
            used_days: request.used_days(),
            employee_name: request.employee_name,
            leave_type: request.leave_type.into(),
            requested_dates: request.requested_dates,
            reason: request.reason,
            status: request.status,
            approver_name: request.approver_name,
            approver_comment: request.approver_comment,
            decided_at: request.decided_at,
            external_ticket_id: request.external_ticket_id,
            external_task_id: request.external_task_id,
            created_at: request.created_at,
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct LeaveListResponse {
    pub data: Vec<LeaveResponse>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 10)]
    pub per_page: u32,
    #[schema(example = 1)]
    pub total: i64,
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct LeaveFilter {
    #[schema(example = "alice")]
    /// Filter by employee name
    pub employee_name: Option<String>,
    #[schema(example = "pending")]
    /// Filter by leave status
    pub status: Option<LeaveStatus>,
    #[schema(example = 2026)]
    /// Filter by submission year
    pub year: Option<i32>,
    #[schema(example = 1)]
    /// Pagination page number (start with 1)
    pub page: Option<u64>, // 1-based
    #[schema(example = 10)]
    /// Pagination per page number
    pub per_page: Option<u64>, // items per page
}

impl LeaveFilter {
    fn to_query(&self) -> LeaveQuery {
        LeaveQuery {
            employee_name: self.employee_name.clone(),
            status: self.status,
            year: self.year,
            page: self.page.unwrap_or(1).max(1),
            per_page: self.per_page.unwrap_or(10).clamp(1, 100),
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct DecisionBody {
    #[schema(example = "bob")]
    pub approver: String,
    #[schema(example = "Enjoy your trip")]
    pub comment: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct RevokeBody {
    /// must match the submitter
    #[schema(example = "alice")]
    pub employee_name: String,
}

async fn list_page(state: &AppState, query: LeaveQuery) -> actix_web::Result<HttpResponse> {
    let (requests, total) = state.leaves.list(&query).await?;
    Ok(HttpResponse::Ok().json(LeaveListResponse {
        data: requests.into_iter().map(LeaveResponse::from).collect(),
        page: query.page as u32,
        per_page: query.per_page as u32,
        total,
    }))
}

async fn decide(
    state: &AppState,
    leave_id: u64,
    verdict: Verdict,
    body: DecisionBody,
) -> actix_web::Result<HttpResponse> {
    let decided = state
        .approvals
        .decide(
            leave_id,
            verdict,
            &body.approver,
            body.comment,
            DecisionSource::Approver,
        )
        .await?;
    Ok(HttpResponse::Ok().json(LeaveResponse::from(decided)))
}

/* =========================
Submit leave request
========================= */
#[utoipa::path(
    post,
    path = "/api/leave",
    request_body(
        content = SubmitLeave,
        description = "Leave request payload",
        content_type = "application/json"
    ),
    responses(
        (status = 201, description = "Leave request submitted", body = LeaveResponse),
        (status = 400, description = "Validation failed", body = Object, example = json!({
            "error": "At least one leave date is required"
        })),
        (status = 404, description = "No quota ledger for annual leave")
    ),
    tag = "Leave"
)]
pub async fn create_leave(
    state: web::Data<AppState>,
    payload: web::Json<SubmitLeave>,
) -> actix_web::Result<impl Responder> {
    let request = state.leaves.submit(payload.into_inner()).await?;
    Ok(HttpResponse::Created().json(LeaveResponse::from(request)))
}

/// for getting leave applications endpoint
#[utoipa::path(
    get,
    path = "/api/leave",
    params(LeaveFilter),
    responses(
        (status = 200, description = "Paginated leave list", body = LeaveListResponse)
    ),
    tag = "Leave"
)]
pub async fn leave_list(
    state: web::Data<AppState>,
    query: web::Query<LeaveFilter>,
) -> actix_web::Result<impl Responder> {
    list_page(&state, query.to_query()).await
}

/// Approver inbox: every request still waiting for a decision
#[utoipa::path(
    get,
    path = "/api/leave/pending",
    params(LeaveFilter),
    responses(
        (status = 200, description = "Paginated pending leave list", body = LeaveListResponse)
    ),
    tag = "Leave"
)]
pub async fn pending_list(
    state: web::Data<AppState>,
    query: web::Query<LeaveFilter>,
) -> actix_web::Result<impl Responder> {
    let mut query = query.to_query();
    query.status = Some(LeaveStatus::Pending);
    list_page(&state, query).await
}

#[utoipa::path(
    get,
    path = "/api/leave/{leave_id}",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request to fetch")
    ),
    responses(
        (status = 200, description = "Leave request found", body = LeaveResponse),
        (status = 404, description = "Leave request not found", body = Object, example = json!({
            "error": "Leave request not found"
        }))
    ),
    tag = "Leave"
)]
pub async fn get_leave(
    state: web::Data<AppState>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let request = state.leaves.get(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(LeaveResponse::from(request)))
}

#[utoipa::path(
    delete,
    path = "/api/leave/{leave_id}",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request to delete")
    ),
    responses(
        (status = 200, description = "Leave request deleted"),
        (status = 404, description = "Leave request not found")
    ),
    tag = "Leave"
)]
pub async fn delete_leave(
    state: web::Data<AppState>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    state.leaves.delete(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Leave request deleted"
    })))
}

/* =========================
Approve / reject leave
========================= */
#[utoipa::path(
    put,
    path = "/api/leave/{leave_id}/approve",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request to approve")
    ),
    request_body = DecisionBody,
    responses(
        (status = 200, description = "Leave approved", body = LeaveResponse),
        (status = 404, description = "Leave request not found"),
        (status = 409, description = "Leave request already decided", body = Object, example = json!({
            "error": "leave request 1 is already approved"
        })),
        (status = 422, description = "Quota ledger missing or exhausted")
    ),
    tag = "Leave"
)]
pub async fn approve_leave(
    state: web::Data<AppState>,
    path: web::Path<u64>,
    body: web::Json<DecisionBody>,
) -> actix_web::Result<impl Responder> {
    decide(&state, path.into_inner(), Verdict::Approve, body.into_inner()).await
}

#[utoipa::path(
    put,
    path = "/api/leave/{leave_id}/reject",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request to reject")
    ),
    request_body = DecisionBody,
    responses(
        (status = 200, description = "Leave rejected", body = LeaveResponse),
        (status = 404, description = "Leave request not found"),
        (status = 409, description = "Leave request already decided")
    ),
    tag = "Leave"
)]
pub async fn reject_leave(
    state: web::Data<AppState>,
    path: web::Path<u64>,
    body: web::Json<DecisionBody>,
) -> actix_web::Result<impl Responder> {
    decide(&state, path.into_inner(), Verdict::Reject, body.into_inner()).await
}

#[utoipa::path(
    post,
    path = "/api/leave/{leave_id}/revoke",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request to revoke")
    ),
    request_body = RevokeBody,
    responses(
        (status = 200, description = "Leave revoked", body = LeaveResponse),
        (status = 400, description = "Caller is not the submitter"),
        (status = 404, description = "Leave request not found"),
        (status = 409, description = "Only pending requests can be revoked")
    ),
    tag = "Leave"
)]
pub async fn revoke_leave(
    state: web::Data<AppState>,
    path: web::Path<u64>,
    body: web::Json<RevokeBody>,
) -> actix_web::Result<impl Responder> {
    let revoked = state
        .approvals
        .revoke(path.into_inner(), body.employee_name.trim())
        .await?;
    Ok(HttpResponse::Ok().json(LeaveResponse::from(revoked)))
}
