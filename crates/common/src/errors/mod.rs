//! Error types for citetree
//!
//! Provides a single error enum shared by the store, the scholar client and the
//! crawler services, with:
//! - Distinct variants for each failure class (not-found, input, rate-limited,
//!   transient network, generic API, storage)
//! - Machine-readable error codes
//! - Stable process exit codes so automation can tell "retry me" from
//!   "fix your input" from "give up"

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Process exit codes
pub mod exit {
    pub const SUCCESS: u8 = 0;
    /// Resource not found (specific ID lookup)
    pub const NOT_FOUND: u8 = 1;
    /// Invalid input, missing arguments, file not found
    pub const INPUT_ERROR: u8 = 2;
    /// API error (non-retriable)
    pub const API_ERROR: u8 = 3;
    /// Rate limited (retriable)
    pub const RATE_LIMITED: u8 = 4;
}

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Input errors (1xxx)
    ValidationError,
    InvalidInput,
    InvalidDirection,

    // Resource errors (4xxx)
    PaperNotFound,

    // Rate limiting (6xxx)
    RateLimited,

    // Database errors (7xxx)
    DatabaseError,
    ConnectionError,

    // Upstream errors (8xxx)
    UpstreamError,
    UpstreamConnection,
    UpstreamUnavailable,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationError,
    SerializationError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            ErrorCode::ValidationError => 1001,
            ErrorCode::InvalidInput => 1002,
            ErrorCode::InvalidDirection => 1003,

            ErrorCode::PaperNotFound => 4002,

            ErrorCode::RateLimited => 6001,

            ErrorCode::DatabaseError => 7001,
            ErrorCode::ConnectionError => 7002,

            ErrorCode::UpstreamError => 8001,
            ErrorCode::UpstreamConnection => 8002,
            ErrorCode::UpstreamUnavailable => 8003,

            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
            ErrorCode::SerializationError => 9003,
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Input errors
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Invalid direction '{value}': must be 'citations' or 'references'")]
    InvalidDirection { value: String },

    // Resource errors
    #[error("Paper not found: {id}")]
    PaperNotFound { id: String },

    // Upstream errors
    #[error("Rate limited by upstream: {message}")]
    RateLimited { message: String },

    /// Connection refused/reset or retries exhausted before any response
    #[error("Upstream connection failed: {message}")]
    UpstreamConnection { message: String },

    /// Timeouts and gateway failures
    #[error("Upstream unavailable: {message}")]
    UpstreamUnavailable { message: String },

    #[error("Upstream API error {status}: {message}")]
    Upstream { status: u16, message: String },

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Database connection error: {message}")]
    DatabaseConnection { message: String },

    // Internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AppError {
    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::InvalidInput { .. } => ErrorCode::InvalidInput,
            AppError::InvalidDirection { .. } => ErrorCode::InvalidDirection,
            AppError::PaperNotFound { .. } => ErrorCode::PaperNotFound,
            AppError::RateLimited { .. } => ErrorCode::RateLimited,
            AppError::UpstreamConnection { .. } => ErrorCode::UpstreamConnection,
            AppError::UpstreamUnavailable { .. } => ErrorCode::UpstreamUnavailable,
            AppError::Upstream { .. } => ErrorCode::UpstreamError,
            AppError::Database(_) => ErrorCode::DatabaseError,
            AppError::DatabaseConnection { .. } => ErrorCode::ConnectionError,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
        }
    }

    /// Get the process exit code for this error
    pub fn exit_code(&self) -> u8 {
        if self.is_not_found() {
            exit::NOT_FOUND
        } else if self.is_input_error() {
            exit::INPUT_ERROR
        } else if self.is_rate_limited() {
            exit::RATE_LIMITED
        } else {
            exit::API_ERROR
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::PaperNotFound { .. })
    }

    /// Invalid parameters; fatal before any network access
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            AppError::Validation { .. }
                | AppError::InvalidInput { .. }
                | AppError::InvalidDirection { .. }
                | AppError::Configuration { .. }
        )
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, AppError::RateLimited { .. })
    }

    /// Connection, timeout and gateway failures
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AppError::UpstreamConnection { .. } | AppError::UpstreamUnavailable { .. }
        )
    }

    /// Classify an upstream HTTP status
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            404 => AppError::PaperNotFound { id: message },
            429 => AppError::RateLimited { message },
            502..=504 => AppError::UpstreamUnavailable { message },
            _ => AppError::Upstream { status, message },
        }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return AppError::from_status(status.as_u16(), err.to_string());
        }
        if err.is_timeout() {
            AppError::UpstreamUnavailable {
                message: err.to_string(),
            }
        } else if err.is_connect() || err.is_request() {
            AppError::UpstreamConnection {
                message: err.to_string(),
            }
        } else if err.is_decode() {
            AppError::Upstream {
                status: 200,
                message: format!("Failed to decode response: {}", err),
            }
        } else {
            AppError::Upstream {
                status: 0,
                message: err.to_string(),
            }
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal {
            message: err.to_string(),
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration {
            message: err.to_string(),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errs: validator::ValidationErrors) -> Self {
        let field = errs.field_errors().keys().next().map(|f| f.to_string());
        AppError::Validation {
            message: errs.to_string(),
            field,
        }
    }
}
