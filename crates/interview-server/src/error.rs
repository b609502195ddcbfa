use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use interview_types::InterviewError;

/// Wraps a domain error for the HTTP boundary.
#[derive(Debug)]
pub struct ApiError(pub InterviewError);

impl From<InterviewError> for ApiError {
    fn from(e: InterviewError) -> Self {
        ApiError(e)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self.0 {
            InterviewError::Unauthorized => StatusCode::UNAUTHORIZED,
            InterviewError::NotFound(_) => StatusCode::NOT_FOUND,
            InterviewError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            InterviewError::InvalidTransition { .. } => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}
