use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::error;

use crate::completion::CompletionError;
use crate::handlers::quota_headers;
use crate::models::{FieldErrors, format_timestamp};
use crate::rate_limit::QuotaStatus;

/// Errors surfaced to HTTP clients.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{message}")]
    Validation {
        message: &'static str,
        errors: FieldErrors,
    },

    /// Modeled denial from the admission controller, not a fault.
    #[error("rate limit exceeded ({} of {} used)", .0.used, .0.limit)]
    QuotaExceeded(QuotaStatus),

    #[error("report generation failed: {0}")]
    Generation(#[source] CompletionError),

    #[error("report translation failed: {0}")]
    Translation(#[source] CompletionError),

    #[error("statement processing failed: {0}")]
    StatementProcessing(#[source] CompletionError),

    #[error("{0}")]
    BadRequest(&'static str),

    #[error("{0}")]
    NotFound(&'static str),

    #[error("unauthorized")]
    Unauthorized,

    /// The generation queue is full or its workers are gone.
    #[error("generation queue unavailable")]
    Unavailable,
}

impl ApiError {
    pub fn invalid(message: &'static str, errors: FieldErrors) -> Self {
        ApiError::Validation { message, errors }
    }

    // Unparseable body: report it under a single "body" key
    pub fn malformed(message: &'static str, rejection: JsonRejection) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert("body".to_string(), rejection.body_text());
        ApiError::Validation { message, errors }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation { message, errors } => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "message": message, "errors": errors })),
            )
                .into_response(),
            ApiError::QuotaExceeded(status) => {
                let retry_after = format_timestamp(&status.reset_time);
                let body = json!({
                    "error": "Rate limit exceeded",
                    "message": format!(
                        "You have exceeded the limit of {} report generations. \
                         Please try again after {}.",
                        status.limit, retry_after
                    ),
                    "retryAfter": retry_after,
                    "remaining": 0,
                    "used": status.used,
                    "limit": status.limit,
                });
                (StatusCode::TOO_MANY_REQUESTS, quota_headers(&status), Json(body)).into_response()
            }
            ApiError::Generation(e) => {
                error!(error = %e, "error generating report");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "message": "Error generating report" })),
                )
                    .into_response()
            }
            ApiError::Translation(e) => {
                error!(error = %e, "error translating report");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "message": "Error translating report" })),
                )
                    .into_response()
            }
            ApiError::StatementProcessing(e) => {
                error!(error = %e, "error processing statement");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "message": "Error processing statement" })),
                )
                    .into_response()
            }
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "message": message }))).into_response()
            }
            ApiError::NotFound(message) => {
                (StatusCode::NOT_FOUND, Json(json!({ "message": message }))).into_response()
            }
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "message": "Unauthorized" })),
            )
                .into_response(),
            ApiError::Unavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "message": "Text generation is temporarily unavailable" })),
            )
                .into_response(),
        }
    }
}
