//! Error types for ragrelay services
//!
//! Provides:
//! - Distinct error types for different failure modes
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
    // Validation errors (1xxx)
    ValidationError,
    MalformedRequest,

    // Resource errors (4xxx)
    CollectionNotFound,

    // External service errors (8xxx)
    BackendUnavailable,
    UpstreamError,
    EmbeddingError,
    StoreError,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationError,
    IndexingError,
    SerializationError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            // Validation (1xxx)
            ErrorCode::ValidationError => 1001,
            ErrorCode::MalformedRequest => 1002,

            // Resources (4xxx)
            ErrorCode::CollectionNotFound => 4001,

            // External (8xxx)
            ErrorCode::BackendUnavailable => 8001,
            ErrorCode::UpstreamError => 8002,
            ErrorCode::EmbeddingError => 8003,
            ErrorCode::StoreError => 8004,

            // Internal (9xxx)
            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
            ErrorCode::IndexingError => 9003,
            ErrorCode::SerializationError => 9004,
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    /// A chat request without any user message
    #[error("Malformed request: {message}")]
    MalformedRequest { message: String },

    // Resource errors
    #[error("Collection not found: {name}")]
    CollectionNotFound { name: String },

    // External service errors
    #[error("Generation backend unavailable: {message}")]
    BackendUnavailable { message: String },

    #[error("Upstream error: {message}")]
    Upstream { message: String },

    #[error("Embedding service error: {message}")]
    Embedding { message: String },

    #[error("Vector store error: {message}")]
    Store { message: String },

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    // Internal errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Indexing error: {message}")]
    Indexing { message: String },

    #[error("Internal server error: {message}")]
    Internal { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::MalformedRequest { .. } => ErrorCode::MalformedRequest,
            AppError::CollectionNotFound { .. } => ErrorCode::CollectionNotFound,
            AppError::BackendUnavailable { .. } => ErrorCode::BackendUnavailable,
            AppError::Upstream { .. } => ErrorCode::UpstreamError,
            AppError::Embedding { .. } => ErrorCode::EmbeddingError,
            AppError::Store { .. } => ErrorCode::StoreError,
            AppError::HttpClient(_) => ErrorCode::UpstreamError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Indexing { .. } => ErrorCode::IndexingError,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
            AppError::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            AppError::Validation { .. } | AppError::MalformedRequest { .. } => {
                StatusCode::BAD_REQUEST
            }

            // 500 Internal Server Error
            AppError::CollectionNotFound { .. }
            | AppError::Configuration { .. }
            | AppError::Indexing { .. }
            | AppError::Internal { .. }
            | AppError::Serialization(_)
            | AppError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,

            // 502 Bad Gateway
            AppError::Upstream { .. }
            | AppError::Embedding { .. }
            | AppError::Store { .. }
            | AppError::HttpClient(_) => StatusCode::BAD_GATEWAY,

            // 503 Service Unavailable
            AppError::BackendUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        }
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

/// Structured error response for the API
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
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
            error: ErrorDetails {
                code,
                message,
                details: None,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_mapping() {
        let err = AppError::MalformedRequest {
            message: "no user message found".into(),
        };
        assert_eq!(err.code(), ErrorCode::MalformedRequest);
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(err.is_client_error());
    }

    #[test]
    fn test_backend_unavailable_is_503() {
        let err = AppError::BackendUnavailable {
            message: "connection refused".into(),
        };
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(err.is_server_error());
    }

    #[test]
    fn test_upstream_is_bad_gateway() {
        let err = AppError::Upstream {
            message: "backend returned 500".into(),
        };
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.code().as_code(), 8002);
    }

    #[test]
    fn test_configuration_is_server_error() {
        let err = AppError::Configuration {
            message: "embedding model mismatch".into(),
        };
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.is_server_error());
    }
}
