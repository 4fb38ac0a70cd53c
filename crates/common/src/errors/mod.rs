//! Error types for PaperLens services
//!
//! Provides a single error enum for every layer with:
//! - Distinct variants for input, auth, storage and upstream failures
//! - HTTP status code mapping
//! - Flat `{error, code}` JSON responses
//! - Generic public messages for upstream and storage failures

use axum::{
    extract::rejection::JsonRejection,
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
    MissingField,
    InvalidFormat,

    // Authentication errors (2xxx)
    Unauthorized,
    InvalidToken,
    ExpiredToken,

    // Resource errors (4xxx)
    NotFound,

    // Conflict errors (5xxx)
    Conflict,

    // Rate limiting (6xxx)
    RateLimited,

    // Database errors (7xxx)
    DatabaseError,
    ConnectionError,

    // External service errors (8xxx)
    UpstreamError,
    MalformedResponse,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationError,
    SerializationError,
}

/// Upstream services the gateway talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upstream {
    PaperIndex,
    Completion,
    Workspace,
}

impl Upstream {
    pub fn as_str(&self) -> &'static str {
        match self {
            Upstream::PaperIndex => "paper_index",
            Upstream::Completion => "completion",
            Upstream::Workspace => "workspace",
        }
    }
}

impl std::fmt::Display for Upstream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>
    },

    #[error("Required field missing: {field}")]
    MissingField { field: String },

    #[error("Invalid format: {message}")]
    InvalidFormat { message: String },

    // Authentication errors
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    #[error("Invalid access token")]
    InvalidToken,

    #[error("Token expired")]
    ExpiredToken,

    // Resource errors
    #[error("Resource not found: {resource_type} with id {id}")]
    NotFound { resource_type: String, id: String },

    // Conflict errors
    #[error("Duplicate resource: {message}")]
    Duplicate { message: String },

    // Rate limiting
    #[error("Rate limit exceeded: {limit} requests per second")]
    RateLimited { limit: u32 },

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Database connection error: {message}")]
    DatabaseConnection { message: String },

    // External service errors
    #[error("Upstream {service} error: {message}")]
    Upstream { service: Upstream, message: String },

    #[error("Malformed response from {service}: {message}")]
    MalformedResponse { service: Upstream, message: String },

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    // Internal errors
    #[error("Internal server error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Shorthand for a missing resource
    pub fn not_found(resource_type: &str, id: impl ToString) -> Self {
        AppError::NotFound {
            resource_type: resource_type.to_string(),
            id: id.to_string(),
        }
    }

    /// Shorthand for an upstream failure
    pub fn upstream(service: Upstream, message: impl Into<String>) -> Self {
        AppError::Upstream {
            service,
            message: message.into(),
        }
    }

    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::MissingField { .. } => ErrorCode::MissingField,
            AppError::InvalidFormat { .. } => ErrorCode::InvalidFormat,
            AppError::Unauthorized { .. } => ErrorCode::Unauthorized,
            AppError::InvalidToken => ErrorCode::InvalidToken,
            AppError::ExpiredToken => ErrorCode::ExpiredToken,
            AppError::NotFound { .. } => ErrorCode::NotFound,
            AppError::Duplicate { .. } => ErrorCode::Conflict,
            AppError::RateLimited { .. } => ErrorCode::RateLimited,
            AppError::Database(_) => ErrorCode::DatabaseError,
            AppError::DatabaseConnection { .. } => ErrorCode::ConnectionError,
            AppError::Upstream { .. } => ErrorCode::UpstreamError,
            AppError::MalformedResponse { .. } => ErrorCode::MalformedResponse,
            AppError::HttpClient(_) => ErrorCode::UpstreamError,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
            AppError::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            AppError::Validation { .. } |
            AppError::MissingField { .. } |
            AppError::InvalidFormat { .. } => StatusCode::BAD_REQUEST,

            // 401 Unauthorized
            AppError::Unauthorized { .. } |
            AppError::InvalidToken |
            AppError::ExpiredToken => StatusCode::UNAUTHORIZED,

            // 404 Not Found
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,

            // 409 Conflict
            AppError::Duplicate { .. } => StatusCode::CONFLICT,

            // 429 Too Many Requests
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,

            // 500 Internal Server Error, upstream failures included
            AppError::Database(_) |
            AppError::DatabaseConnection { .. } |
            AppError::Upstream { .. } |
            AppError::MalformedResponse { .. } |
            AppError::HttpClient(_) |
            AppError::Internal { .. } |
            AppError::Configuration { .. } |
            AppError::Serialization(_) |
            AppError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to hand to HTTP callers.
    ///
    /// Server-side failures never echo upstream or storage detail.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Upstream { service, .. } |
            AppError::MalformedResponse { service, .. } => match service {
                Upstream::PaperIndex => "Failed to fetch papers".to_string(),
                Upstream::Completion => "Failed to analyze paper".to_string(),
                Upstream::Workspace => "Failed to reach workspace".to_string(),
            },
            AppError::HttpClient(_) => "Upstream request failed".to_string(),
            AppError::Database(_) |
            AppError::DatabaseConnection { .. } => "Storage operation failed".to_string(),
            AppError::Internal { .. } |
            AppError::Configuration { .. } |
            AppError::Serialization(_) |
            AppError::Other(_) => "Internal server error".to_string(),
            _ => self.to_string(),
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

/// Flat error body returned by every route
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: ErrorCode,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let message = self.to_string();

        if self.is_server_error() {
            if matches!(self, AppError::Database(_) | AppError::DatabaseConnection { .. }) {
                metrics::counter!(crate::metrics::names::STORAGE_ERRORS).increment(1);
            }
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
            error: self.public_message(),
            code,
        };

        (status, Json(body)).into_response()
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        let field = err.field_errors().keys().next().map(|f| f.to_string());
        AppError::Validation {
            message: err.to_string(),
            field,
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        let message = rejection.body_text();
        match rejection {
            JsonRejection::JsonDataError(_) => match missing_field(&message) {
                Some(field) => AppError::MissingField { field },
                None => AppError::Validation { message, field: None },
            },
            _ => AppError::InvalidFormat { message },
        }
    }
}

/// Field name from a serde "missing field `name`" message
fn missing_field(message: &str) -> Option<String> {
    let rest = &message[message.find("missing field `")? + "missing field `".len()..];
    rest.find('`').map(|end| rest[..end].to_string())
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal {
            message: err.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_mapping() {
        let err = AppError::not_found("project", "abc");
        assert_eq!(err.code(), ErrorCode::NotFound);
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_missing_field_name() {
        let message = "Failed to deserialize the JSON body into the target type: \
                       missing field `title` at line 1 column 26";
        assert_eq!(missing_field(message), Some("title".to_string()));
        assert_eq!(missing_field("invalid type: string, expected u32"), None);
    }

    #[test]
    fn test_validation_error() {
        let err = AppError::MissingField { field: "query".into() };
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(!err.is_server_error());
        assert!(err.is_client_error());
    }

    #[test]
    fn test_upstream_error_is_500_and_generic() {
        let err = AppError::upstream(Upstream::Completion, "openai said 503: overloaded");
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.public_message(), "Failed to analyze paper");
        assert!(!err.public_message().contains("overloaded"));
    }

    #[test]
    fn test_malformed_response_code() {
        let err = AppError::MalformedResponse {
            service: Upstream::Completion,
            message: "empty body".into(),
        };
        assert_eq!(err.code(), ErrorCode::MalformedResponse);
        assert!(err.is_server_error());
    }

    #[test]
    fn test_auth_errors_are_401() {
        assert_eq!(AppError::InvalidToken.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::ExpiredToken.status_code(), StatusCode::UNAUTHORIZED);
        let err = AppError::Unauthorized { message: "No access token provided".into() };
        assert_eq!(err.public_message(), "Unauthorized: No access token provided");
    }

    #[test]
    fn test_error_body_shape() {
        let body = ErrorResponse {
            error: "Query is required".into(),
            code: ErrorCode::MissingField,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["error"], "Query is required");
        assert_eq!(json["code"], "MISSING_FIELD");
    }
}
