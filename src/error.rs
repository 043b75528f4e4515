use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde_json::json;

use crate::model::leave_request::LeaveStatus;
use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum LeaveError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("leave request {id} is already {status}")]
    Conflict { id: u64, status: LeaveStatus },
    #[error("{0}")]
    InvariantViolation(String),
    #[error("external service error: {0}")]
    ExternalService(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type LeaveResult<T> = Result<T, LeaveError>;

impl LeaveError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }
}

impl ResponseError for LeaveError {
    fn status_code(&self) -> StatusCode {
        match self {
            LeaveError::Validation(_) => StatusCode::BAD_REQUEST,
            LeaveError::NotFound(_) => StatusCode::NOT_FOUND,
            LeaveError::Conflict { .. } => StatusCode::CONFLICT,
            LeaveError::InvariantViolation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            LeaveError::ExternalService(_) => StatusCode::BAD_GATEWAY,
            LeaveError::Store(StoreError::Duplicate(_)) => StatusCode::CONFLICT,
            LeaveError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            LeaveError::Store(StoreError::Duplicate(msg)) => format!("{msg} already exists"),
            LeaveError::Store(e) => {
                tracing::error!(error = %e, "store failure");
                "Internal Server Error".to_string()
            }
            other => other.to_string(),
        };
        HttpResponse::build(self.status_code()).json(json!({ "error": message }))
    }
}
