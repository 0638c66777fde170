//! API error handling.
//!
//! Every failure leaves the API as `{"error": message}` with a status code
//! that tells NotFound apart from bad input and from source faults.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::query::QueryError;
use crate::storage::LoadError;

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    Load(LoadError),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Load(err) => {
                // Already reported by the query service.
                tracing::debug!(error = %err, "responding with load failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("execution log could not be loaded: {err}"),
                )
            }
            ApiError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<QueryError> for ApiError {
    fn from(err: QueryError) -> Self {
        match err {
            QueryError::NotFound(_) => ApiError::NotFound(err.to_string()),
            QueryError::DuplicateRecords { .. } => ApiError::Conflict(err.to_string()),
            QueryError::Load(load) => ApiError::Load(load),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
