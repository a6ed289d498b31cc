use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::ConfigError;
use crate::models::PackageStatus;
use crate::services::lifecycle::{PackageAction, TransitionError};

/// Main error type for the parcel-desk service
#[derive(Debug)]
pub enum DeskError {
    // HTTP and API errors
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    InternalServer(String),

    // Backend collaborator errors
    NetworkTimeout,
    NetworkConnection(String),
    HttpClient(String),
    UpstreamStatus { status: u16, message: String },
    ServiceUnavailable(String),

    // Serialization and parsing errors
    JsonParsing(String),

    // Package board errors
    PackageNotFound(String),
    StaleData(String),
    ActionNotAllowed { action: PackageAction, status: PackageStatus },
    InvalidTransition(TransitionError),
    MutationInProgress,

    // Validation errors
    ValidationFailed(Vec<ValidationError>),

    // Configuration and setup errors
    ConfigurationError(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

/// Coarse grouping used to decide how an error is surfaced to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorCategory {
    Network,
    Validation,
    NotFound,
    Refused,
    Internal,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl fmt::Display for DeskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeskError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            DeskError::NotFound(msg) => write!(f, "Not found: {}", msg),
            DeskError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            DeskError::InternalServer(msg) => write!(f, "Internal server error: {}", msg),

            DeskError::NetworkTimeout => write!(f, "Backend request timed out"),
            DeskError::NetworkConnection(msg) => write!(f, "Backend connection error: {}", msg),
            DeskError::HttpClient(msg) => write!(f, "HTTP client error: {}", msg),
            DeskError::UpstreamStatus { status, message } => {
                write!(f, "Backend responded with {}: {}", status, message)
            }
            DeskError::ServiceUnavailable(service) => write!(f, "Service unavailable: {}", service),

            DeskError::JsonParsing(msg) => write!(f, "JSON parsing error: {}", msg),

            DeskError::PackageNotFound(id) => write!(f, "Package not found: {}", id),
            DeskError::StaleData(msg) => write!(f, "Stale data, refresh and try again: {}", msg),
            DeskError::ActionNotAllowed { action, status } => {
                write!(f, "{} is not allowed while the package is {}", action, status)
            }
            DeskError::InvalidTransition(err) => write!(f, "{}", err),
            DeskError::MutationInProgress => write!(f, "Another update is still in progress"),

            DeskError::ValidationFailed(errors) => {
                write!(f, "Validation failed: {} errors", errors.len())
            }

            DeskError::ConfigurationError(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for DeskError {}

impl DeskError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            DeskError::NetworkTimeout
            | DeskError::NetworkConnection(_)
            | DeskError::HttpClient(_)
            | DeskError::UpstreamStatus { .. }
            | DeskError::ServiceUnavailable(_) => ErrorCategory::Network,

            DeskError::BadRequest(_) | DeskError::ValidationFailed(_) => ErrorCategory::Validation,

            DeskError::NotFound(_) | DeskError::PackageNotFound(_) | DeskError::StaleData(_) => {
                ErrorCategory::NotFound
            }

            DeskError::Conflict(_)
            | DeskError::ActionNotAllowed { .. }
            | DeskError::InvalidTransition(_)
            | DeskError::MutationInProgress => ErrorCategory::Refused,

            _ => ErrorCategory::Internal,
        }
    }
}

impl IntoResponse for DeskError {
    fn into_response(self) -> Response {
        let (status, error_type, message, details) = match self {
            DeskError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg, None),
            DeskError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg, None),
            DeskError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg, None),

            DeskError::ValidationFailed(errors) => {
                let details = serde_json::to_value(&errors).ok();
                (StatusCode::BAD_REQUEST, "validation_failed", "Validation errors occurred".to_string(), details)
            }

            DeskError::PackageNotFound(id) => {
                (StatusCode::NOT_FOUND, "package_not_found", format!("Package not found: {}", id), None)
            }
            DeskError::StaleData(msg) => (StatusCode::CONFLICT, "stale_data", msg, None),
            ref err @ DeskError::ActionNotAllowed { .. } => {
                (StatusCode::CONFLICT, "action_not_allowed", err.to_string(), None)
            }
            DeskError::InvalidTransition(err) => {
                (StatusCode::CONFLICT, "invalid_transition", err.to_string(), None)
            }
            DeskError::MutationInProgress => (
                StatusCode::CONFLICT,
                "mutation_in_progress",
                "Another update is still in progress".to_string(),
                None,
            ),

            DeskError::NetworkTimeout => {
                (StatusCode::GATEWAY_TIMEOUT, "backend_timeout", "Backend request timed out".to_string(), None)
            }
            ref err @ (DeskError::NetworkConnection(_)
            | DeskError::HttpClient(_)
            | DeskError::UpstreamStatus { .. }) => (StatusCode::BAD_GATEWAY, "backend_error", err.to_string(), None),
            DeskError::ServiceUnavailable(service) => {
                (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable", format!("Service unavailable: {}", service), None)
            }

            // All other errors are treated as internal server errors
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", self.to_string(), None),
        };

        let error_response = ErrorResponse {
            error: error_type.to_string(),
            message,
            details,
        };

        (status, axum::Json(error_response)).into_response()
    }
}

// Convenience type alias for Results
pub type DeskResult<T> = Result<T, DeskError>;

// Conversion implementations for common error types
impl From<reqwest::Error> for DeskError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            DeskError::NetworkTimeout
        } else if err.is_connect() {
            DeskError::NetworkConnection(err.to_string())
        } else if err.is_decode() {
            DeskError::JsonParsing(err.to_string())
        } else {
            DeskError::HttpClient(err.to_string())
        }
    }
}

impl From<std::io::Error> for DeskError {
    fn from(err: std::io::Error) -> Self {
        DeskError::InternalServer(err.to_string())
    }
}

impl From<TransitionError> for DeskError {
    fn from(err: TransitionError) -> Self {
        DeskError::InvalidTransition(err)
    }
}

impl From<ConfigError> for DeskError {
    fn from(err: ConfigError) -> Self {
        DeskError::ConfigurationError(err.to_string())
    }
}

// Helper functions for creating common errors
impl DeskError {
    pub fn validation_error(field: impl Into<String>, message: impl Into<String>) -> Self {
        DeskError::ValidationFailed(vec![ValidationError {
            field: field.into(),
            message: message.into(),
        }])
    }

    pub fn package_not_found(package_id: impl Into<String>) -> Self {
        DeskError::PackageNotFound(package_id.into())
    }

    pub fn stale(package_id: impl Into<String>) -> Self {
        DeskError::StaleData(format!("package {} is not on the current board", package_id.into()))
    }
}
