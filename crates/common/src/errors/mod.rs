//! Error types for the digest services
//!
//! Provides:
//! - The failure taxonomy of the read pipeline (store, mapping, joins, lookups)
//! - HTTP status code mapping
//! - Structured error responses
//! - Error codes for client handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Resource errors (4xxx)
    NotFound,

    // Store errors (7xxx)
    StoreUnavailable,
    QueryError,

    // Materialization errors (8xxx)
    MalformedRow,
    DanglingReference,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationError,
    SerializationError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            ErrorCode::NotFound => 4001,

            ErrorCode::StoreUnavailable => 7001,
            ErrorCode::QueryError => 7002,

            ErrorCode::MalformedRow => 8001,
            ErrorCode::DanglingReference => 8002,

            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
            ErrorCode::SerializationError => 9003,
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Store errors
    #[error("Row store unavailable: {message}")]
    StoreUnavailable { message: String },

    #[error("Query failed: {message}")]
    Query { message: String },

    // Mapping and join errors
    #[error("Malformed {kind} row: {reason}")]
    MalformedRow { kind: &'static str, reason: String },

    #[error("{entity} {entity_id} references missing {target} {target_id}")]
    DanglingReference {
        entity: &'static str,
        entity_id: i64,
        target: &'static str,
        target_id: i64,
    },

    // Resource errors
    #[error("{resource_type} not found: {id}")]
    NotFound {
        resource_type: &'static str,
        id: String,
    },

    // Internal errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal server error: {message}")]
    Internal { message: String },

    // Generic
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Shorthand for a lookup miss on an integer-keyed entity
    pub fn not_found(resource_type: &'static str, id: i64) -> Self {
        AppError::NotFound {
            resource_type,
            id: id.to_string(),
        }
    }

    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::StoreUnavailable { .. } => ErrorCode::StoreUnavailable,
            AppError::Query { .. } => ErrorCode::QueryError,
            AppError::MalformedRow { .. } => ErrorCode::MalformedRow,
            AppError::DanglingReference { .. } => ErrorCode::DanglingReference,
            AppError::NotFound { .. } => ErrorCode::NotFound,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 404 Not Found
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,

            // 500 Internal Server Error
            AppError::Query { .. } |
            AppError::MalformedRow { .. } |
            AppError::DanglingReference { .. } |
            AppError::Configuration { .. } |
            AppError::Serialization(_) |
            AppError::Internal { .. } |
            AppError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,

            // 503 Service Unavailable
            AppError::StoreUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Transient failures that the next scheduled cycle may clear
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::StoreUnavailable { .. })
    }

    /// Check if this error should be logged at error level
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Check if this error is a client error
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

/// Structured error response for API
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: ErrorCode,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let message = self.to_string();

        // Log based on severity
        if self.is_server_error() {
            tracing::error!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Server error"
            );
        } else if self.is_client_error() {
            tracing::warn!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Client error"
            );
        }

        let body = ErrorResponse {
            error: ErrorDetails { code, message },
        };

        (status, Json(body)).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_) => AppError::StoreUnavailable {
                message: err.to_string(),
            },
            other => AppError::Query {
                message: other.to_string(),
            },
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_mapping() {
        let err = AppError::not_found("story", 42);
        assert_eq!(err.code(), ErrorCode::NotFound);
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.to_string(), "story not found: 42");
        assert!(err.is_client_error());
    }

    #[test]
    fn test_store_unavailable_is_transient() {
        let err = AppError::StoreUnavailable {
            message: "connection refused".into(),
        };
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(err.is_transient());
        assert!(err.is_server_error());
    }

    #[test]
    fn test_dangling_reference_message() {
        let err = AppError::DanglingReference {
            entity: "article",
            entity_id: 7,
            target: "provider",
            target_id: 99,
        };
        assert_eq!(err.to_string(), "article 7 references missing provider 99");
        assert_eq!(err.code().as_code(), 8002);
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.is_transient());
    }

    #[test]
    fn test_sqlx_error_classification() {
        let err: AppError = sqlx::Error::PoolTimedOut.into();
        assert_eq!(err.code(), ErrorCode::StoreUnavailable);

        let err: AppError = sqlx::Error::RowNotFound.into();
        assert_eq!(err.code(), ErrorCode::QueryError);
    }

    #[test]
    fn test_error_code_wire_format() {
        let json = serde_json::to_string(&ErrorCode::DanglingReference).unwrap();
        assert_eq!(json, "\"DANGLING_REFERENCE\"");
    }
}
