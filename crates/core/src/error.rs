//! Unified error types for the MovieFlix pipeline.
//!
//! Error codes:
//! - ETL_001-005: Pipeline run errors
//! - VALID_001-002: Request validation errors
//! - NOT_FOUND_001: Unknown resource
//! - DB_001: Storage errors
//! - INTERNAL_001: Local I/O and task failures

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Pipeline run error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EtlErrorCode {
    /// ETL_001: Input file missing or unreadable
    InputMissing,
    /// ETL_002: CSV header does not match the expected layout
    HeaderMismatch,
    /// ETL_003: Row could not be parsed
    MalformedRow,
    /// ETL_004: Warehouse constraint violated under the abort policy
    ConstraintViolation,
    /// ETL_005: Another run holds the pipeline lock
    RunInProgress,
}

impl EtlErrorCode {
    /// Get the error code string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InputMissing => "ETL_001",
            Self::HeaderMismatch => "ETL_002",
            Self::MalformedRow => "ETL_003",
            Self::ConstraintViolation => "ETL_004",
            Self::RunInProgress => "ETL_005",
        }
    }

    /// Get the HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::InputMissing => 400,
            Self::HeaderMismatch => 400,
            Self::MalformedRow => 400,
            Self::ConstraintViolation => 422,
            Self::RunInProgress => 409,
        }
    }
}

/// Validation error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationErrorCode {
    /// VALID_001: Malformed request body
    InvalidFormat,
    /// VALID_002: Missing or out-of-range field
    InvalidField,
}

impl ValidationErrorCode {
    /// Get the error code string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidFormat => "VALID_001",
            Self::InvalidField => "VALID_002",
        }
    }

    /// Get the HTTP status code.
    pub fn http_status(&self) -> u16 {
        400
    }
}

/// Database error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbErrorCode {
    /// DB_001: Storage operation failed
    StoreFailed,
}

impl DbErrorCode {
    /// Get the error code string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::StoreFailed => "DB_001",
        }
    }

    /// Get the HTTP status code.
    pub fn http_status(&self) -> u16 {
        500
    }
}

/// Code carried by [`Error::NotFound`].
pub const NOT_FOUND_CODE: &str = "NOT_FOUND_001";

/// Code carried by [`Error::Io`] and [`Error::Internal`].
pub const INTERNAL_CODE: &str = "INTERNAL_001";

/// Unified error type for the pipeline and both APIs.
#[derive(Debug, Error)]
pub enum Error {
    /// Pipeline run error with code.
    #[error("[{code}] {message}")]
    Etl {
        code: &'static str,
        message: String,
        http_status: u16,
    },

    /// Validation error with code.
    #[error("[{code}] {message}")]
    ValidationWithCode {
        code: &'static str,
        message: String,
        http_status: u16,
    },

    /// Database error with code.
    #[error("[{code}] {message}")]
    Database {
        code: &'static str,
        message: String,
        http_status: u16,
    },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("missing required field: {0}")]
    MissingField(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a pipeline run error.
    pub fn etl(code: EtlErrorCode, msg: impl Into<String>) -> Self {
        Self::Etl {
            code: code.code(),
            message: msg.into(),
            http_status: code.http_status(),
        }
    }

    /// Create a validation error with code.
    pub fn validation_code(code: ValidationErrorCode, msg: impl Into<String>) -> Self {
        Self::ValidationWithCode {
            code: code.code(),
            message: msg.into(),
            http_status: code.http_status(),
        }
    }

    /// Create a database error.
    pub fn database(code: DbErrorCode, msg: impl Into<String>) -> Self {
        Self::Database {
            code: code.code(),
            message: msg.into(),
            http_status: code.http_status(),
        }
    }

    pub fn input_missing(msg: impl Into<String>) -> Self {
        Self::etl(EtlErrorCode::InputMissing, msg)
    }

    pub fn header_mismatch(file: &str, expected: &[&str], found: &[String]) -> Self {
        Self::etl(
            EtlErrorCode::HeaderMismatch,
            format!(
                "{}: expected header [{}], found [{}]",
                file,
                expected.join(","),
                found.join(",")
            ),
        )
    }

    pub fn malformed_row(file: &str, line: u64, msg: impl Into<String>) -> Self {
        Self::etl(
            EtlErrorCode::MalformedRow,
            format!("{} line {}: {}", file, line, msg.into()),
        )
    }

    pub fn constraint_violation(msg: impl Into<String>) -> Self {
        Self::etl(EtlErrorCode::ConstraintViolation, msg)
    }

    pub fn run_in_progress(pipeline: &str) -> Self {
        Self::etl(
            EtlErrorCode::RunInProgress,
            format!("pipeline '{}' already has a run in progress", pipeline),
        )
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::database(DbErrorCode::StoreFailed, msg)
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField(field.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Get the HTTP status code for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Etl { http_status, .. } => *http_status,
            Self::ValidationWithCode { http_status, .. } => *http_status,
            Self::Database { http_status, .. } => *http_status,
            Self::NotFound(_) => 404,
            Self::Validation(_) => 400,
            Self::MissingField(_) => 400,
            Self::Serialization(_) => 400,
            Self::Io(_) => 500,
            Self::Internal(_) => 500,
        }
    }

    /// Get the error code if this is a coded error.
    pub fn error_code(&self) -> Option<&'static str> {
        match self {
            Self::Etl { code, .. } => Some(code),
            Self::ValidationWithCode { code, .. } => Some(code),
            Self::Database { code, .. } => Some(code),
            Self::NotFound(_) => Some(NOT_FOUND_CODE),
            Self::Io(_) | Self::Internal(_) => Some(INTERNAL_CODE),
            _ => None,
        }
    }

    /// True when the error is a run failure raised before any table was touched.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self.error_code(),
            Some("ETL_001") | Some("ETL_002") | Some("ETL_003")
        )
    }
}
