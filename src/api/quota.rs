use actix_web::{HttpResponse, Responder, web};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use crate::model::quota_ledger::{NewQuotaLedger, QuotaLedger, QuotaPatch};
use crate::state::AppState;
use crate::store::LedgerQuery;

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct QuotaFilter {
    #[schema(example = "alice")]
    pub employee_name: Option<String>,
    #[schema(example = 2026)]
    pub year: Option<i32>,
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct QuotaOwner {
    /// owner of the ledger row; must match for deletion
    #[schema(example = "alice")]
    pub employee_name: String,
}

#[utoipa::path(
    post,
    path = "/api/quota",
    request_body = NewQuotaLedger,
    responses(
        (status = 201, description = "Quota ledger created", body = QuotaLedger),
        (status = 400, description = "Validation failed"),
        (status = 409, description = "Ledger for this employee and year already exists")
    ),
    tag = "Quota"
)]
pub async fn create_quota(
    state: web::Data<AppState>,
    payload: web::Json<NewQuotaLedger>,
) -> actix_web::Result<impl Responder> {
    let ledger = state.quota.create(payload.into_inner()).await?;
    Ok(HttpResponse::Created().json(ledger))
}

#[utoipa::path(
    get,
    path = "/api/quota",
    params(QuotaFilter),
    responses(
        (status = 200, description = "Quota ledgers", body = Vec<QuotaLedger>)
    ),
    tag = "Quota"
)]
pub async fn quota_list(
    state: web::Data<AppState>,
    query: web::Query<QuotaFilter>,
) -> actix_web::Result<impl Responder> {
    let query = query.into_inner();
    let ledgers = state
        .quota
        .list(&LedgerQuery {
            employee_name: query.employee_name,
            year: query.year,
        })
        .await?;
    Ok(HttpResponse::Ok().json(ledgers))
}

#[utoipa::path(
    get,
    path = "/api/quota/{quota_id}",
    params(("quota_id" = u64, Path, description = "Quota ledger ID")),
    responses(
        (status = 200, description = "Quota ledger found", body = QuotaLedger),
        (status = 404, description = "Quota ledger not found")
    ),
    tag = "Quota"
)]
pub async fn get_quota(
    state: web::Data<AppState>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let ledger = state.quota.get(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ledger))
}

#[utoipa::path(
    put,
    path = "/api/quota/{quota_id}",
    params(("quota_id" = u64, Path, description = "Quota ledger ID")),
    request_body = QuotaPatch,
    responses(
        (status = 200, description = "Quota ledger corrected", body = QuotaLedger),
        (status = 400, description = "No valid fields provided for update"),
        (status = 404, description = "Quota ledger not found")
    ),
    tag = "Quota"
)]
pub async fn update_quota(
    state: web::Data<AppState>,
    path: web::Path<u64>,
    body: web::Json<QuotaPatch>,
) -> actix_web::Result<impl Responder> {
    let ledger = state.quota.adjust(path.into_inner(), &body).await?;
    Ok(HttpResponse::Ok().json(ledger))
}

#[utoipa::path(
    delete,
    path = "/api/quota/{quota_id}",
    params(
        ("quota_id" = u64, Path, description = "Quota ledger ID"),
        QuotaOwner
    ),
    responses(
        (status = 200, description = "Quota ledger deleted"),
        (status = 400, description = "User does not match"),
        (status = 404, description = "Quota ledger not found")
    ),
    tag = "Quota"
)]
pub async fn delete_quota(
    state: web::Data<AppState>,
    path: web::Path<u64>,
    owner: web::Query<QuotaOwner>,
) -> actix_web::Result<impl Responder> {
    state
        .quota
        .delete(path.into_inner(), owner.employee_name.trim())
        .await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Quota ledger deleted"
    })))
}
