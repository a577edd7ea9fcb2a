//! Standardized API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use etl_core::error::{INTERNAL_CODE, NOT_FOUND_CODE};
use serde::{Deserialize, Serialize};
use telemetry::HealthReport;

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub backend: String,
    pub warehouse_connected: bool,
    pub data_lake_available: bool,
    pub run_in_progress: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_run_finished_at: Option<i64>,
    pub report: HealthReport,
}

/// Error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Vec<String>) -> Self {
        self.details = Some(details);
        self
    }
}

/// API error type with coded responses.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub response: ErrorResponse,
}

impl ApiError {
    pub fn with_code(status: StatusCode, code: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            status,
            response: ErrorResponse::new(msg, code),
        }
    }

    /// Malformed request body.
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::with_code(StatusCode::BAD_REQUEST, "VALID_001", msg)
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::with_code(StatusCode::NOT_FOUND, NOT_FOUND_CODE, msg)
    }

    /// Local failure outside the store: disk, lock files, worker tasks.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::with_code(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_CODE, msg)
    }

    pub fn validation(code: impl Into<String>, errors: Vec<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            response: ErrorResponse::new("Validation failed", code).with_details(errors),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.response)).into_response()
    }
}

impl From<etl_core::Error> for ApiError {
    fn from(err: etl_core::Error) -> Self {
        Self::from(&err)
    }
}

impl From<&etl_core::Error> for ApiError {
    fn from(err: &etl_core::Error) -> Self {
        match err {
            etl_core::Error::Etl {
                code,
                message,
                http_status,
            } => {
                let status =
                    StatusCode::from_u16(*http_status).unwrap_or(StatusCode::BAD_REQUEST);
                ApiError::with_code(status, *code, message)
            }
            etl_core::Error::ValidationWithCode { code, message, .. } => {
                ApiError::validation(*code, vec![message.clone()])
            }
            etl_core::Error::Database { code, message, .. } => {
                ApiError::with_code(StatusCode::INTERNAL_SERVER_ERROR, *code, message)
            }
            etl_core::Error::NotFound(_) => ApiError::not_found(err.to_string()),
            etl_core::Error::Validation(msg) => ApiError::validation("VALID_002", vec![msg.clone()]),
            etl_core::Error::MissingField(field) => ApiError::validation(
                "VALID_002",
                vec![format!("missing required field: {}", field)],
            ),
            etl_core::Error::Serialization(e) => ApiError::bad_request(e.to_string()),
            etl_core::Error::Io(_) | etl_core::Error::Internal(_) => {
                ApiError::internal(err.to_string())
            }
        }
    }
}
