//! API error types and responses.

use axum::extract::rejection::BytesRejection;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use usage_ingest_core::IngestError;
use usage_ingest_store::StoreError;

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Missing or malformed credentials.
    #[error("{0}")]
    Unauthorized(&'static str),

    /// Well-formed credentials that do not match.
    #[error("invalid bearer token")]
    Forbidden,

    /// Body could not be decompressed or parsed.
    #[error("{0}")]
    MalformedPayload(String),

    /// Payload structurally invalid as a whole.
    #[error("{0}")]
    ValidationFailed(String),

    /// Body exceeds a byte ceiling.
    #[error("{0}")]
    PayloadTooLarge(String),

    /// Batch carries too many items.
    #[error("batch of {count} items exceeds limit of {limit}")]
    BatchTooLarge {
        /// Items submitted.
        count: usize,
        /// Configured maximum.
        limit: usize,
    },

    /// Storage engine unreachable.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// JSON error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match &self {
            Self::Unauthorized(msg) => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                (*msg).to_string(),
                None,
            ),
            Self::Forbidden => (StatusCode::FORBIDDEN, "forbidden", self.to_string(), None),
            Self::MalformedPayload(msg) => (
                StatusCode::BAD_REQUEST,
                "malformed_payload",
                msg.clone(),
                None,
            ),
            Self::ValidationFailed(msg) => (
                StatusCode::BAD_REQUEST,
                "validation_failed",
                msg.clone(),
                None,
            ),
            Self::PayloadTooLarge(msg) => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "payload_too_large",
                msg.clone(),
                None,
            ),
            Self::BatchTooLarge { count, limit } => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "batch_too_large",
                self.to_string(),
                Some(serde_json::json!({
                    "count": count,
                    "limit": limit
                })),
            ),
            Self::StoreUnavailable(msg) => {
                tracing::error!(error = %msg, "Store unavailable");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "store_unavailable",
                    "Storage is temporarily unavailable; nothing was written".to_string(),
                    None,
                )
            }
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message,
                details,
            },
        };

        let mut response = (status, Json(body)).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                header::HeaderValue::from_static("Bearer"),
            );
        }
        response
    }
}

impl From<IngestError> for ApiError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::MalformedPayload(msg) => Self::MalformedPayload(msg),
            IngestError::ValidationFailed(msg) => Self::ValidationFailed(msg),
            IngestError::PayloadTooLarge { .. } => Self::PayloadTooLarge(err.to_string()),
            IngestError::BatchTooLarge { count, limit } => Self::BatchTooLarge { count, limit },
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) => Self::StoreUnavailable(msg),
            StoreError::Integrity(msg) | StoreError::Database(msg) => Self::Internal(msg),
        }
    }
}

impl From<BytesRejection> for ApiError {
    fn from(rejection: BytesRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self::PayloadTooLarge(rejection.body_text())
        } else {
            Self::MalformedPayload(rejection.body_text())
        }
    }
}
