use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use tracing::error;

use blueline_common::BluelineError;

/// HTTP-facing error. Every body is `{"detail": "..."}`.
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    Unprocessable(String),
    Internal(String),
}

impl ApiError {
    fn detail(&self) -> &str {
        match self {
            ApiError::NotFound(d) | ApiError::Unprocessable(d) | ApiError::Internal(d) => d,
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<BluelineError> for ApiError {
    fn from(e: BluelineError) -> Self {
        match e {
            BluelineError::NoActiveSources(region) => {
                ApiError::NotFound(format!("No active sources for region: {region}"))
            }
            BluelineError::JobNotFound => ApiError::NotFound("Job not found".to_string()),
            other => {
                error!(error = %other, "Unhandled pipeline error");
                ApiError::Internal("Internal pipeline error".to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "detail": self.detail() }));
        (self.status(), body).into_response()
    }
}
