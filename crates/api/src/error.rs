//! Transport-level error mapping.
//!
//! The core reports a closed failure taxonomy; this module owns its mapping
//! to HTTP statuses and the boundary-side logging of security-relevant and
//! fatal events. Storage detail is never leaked to clients.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use fastaid_core::TriageError;
use serde::Serialize;
use utoipa::ToSchema;

/// Error payload returned to clients.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The request carried no resolvable credential.
    #[error("invalid authentication credentials")]
    Unauthorized,
    #[error(transparent)]
    Core(#[from] TriageError),
    /// Failures of the boundary itself (hashing, task join).
    #[error("internal error")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string()),
            ApiError::Core(err) => match err {
                TriageError::NotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
                TriageError::AccessDenied => {
                    tracing::warn!("access denied");
                    (StatusCode::FORBIDDEN, err.to_string())
                }
                TriageError::InvalidReference(_) | TriageError::InvalidInput(_) => {
                    (StatusCode::BAD_REQUEST, err.to_string())
                }
                TriageError::AlreadyExists(_) => (StatusCode::CONFLICT, err.to_string()),
                TriageError::Generation(cause) => {
                    tracing::error!(error = %cause, "prediagnosis generation failed");
                    (StatusCode::BAD_GATEWAY, err.to_string())
                }
                TriageError::Storage(cause) => {
                    tracing::error!(error = %cause, "storage failure");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "internal error".to_string(),
                    )
                }
            },
            ApiError::Internal(detail) => {
                tracing::error!(error = %detail, "request handling failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal error".to_string(),
                )
            }
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}
