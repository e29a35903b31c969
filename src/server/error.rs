//! API error type and its JSON wire shape.

use crate::sdk::{ErrorDetail, ErrorResponse};
use crate::store::StoreError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

pub const CODE_NOT_FOUND: &str = "NOT_FOUND";
pub const CODE_BAD_REQUEST: &str = "BAD_REQUEST";
pub const CODE_INTERNAL: &str = "INTERNAL_ERROR";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => CODE_NOT_FOUND,
            ApiError::BadRequest(_) => CODE_BAD_REQUEST,
            ApiError::Internal(_) => CODE_INTERNAL,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Map a store failure on a single-game lookup. Details of persistence
    /// errors stay in the logs, not in the response.
    pub fn from_store(err: StoreError, id: i64) -> Self {
        match err {
            StoreError::NotFound => ApiError::NotFound(format!("game {id} not found")),
            other => {
                tracing::warn!(error = %other, game_id = id, "store query failed");
                ApiError::Internal("failed to fetch game".into())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: ErrorDetail {
                code: self.code().to_string(),
                message: self.to_string(),
            },
        };
        (self.status(), Json(body)).into_response()
    }
}
