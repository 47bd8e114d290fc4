//! Typed error handling for nestapi
//!
//! Every failure that can reach an HTTP response is an [`ApiError`]. Each
//! variant knows its status code and renders the same JSON envelope:
//!
//! ```json
//! { "status": "Invalid request.", "error": "missing required 'title' field" }
//! ```
//!
//! # Error Categories
//!
//! - [`ApiError`]: errors rendered to HTTP clients (handlers, hooks, middleware)
//! - [`StorageError`]: errors returned by [`Storage`](crate::core::Storage) backends
//! - [`ConfigError`]: mistakes in API tree wiring or configuration files
//!
//! # Example
//!
//! ```rust,ignore
//! use nestapi::prelude::*;
//!
//! let api = Api::new("events", "/events", Event::default)
//!     .set_before_delete(|ctx, _id| async move {
//!         if ctx.query("password").is_none() {
//!             return Err(ApiError::Forbidden);
//!         }
//!         Ok(())
//!     });
//! ```

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Result alias used by handlers and hooks
pub type ApiResult<T> = Result<T, ApiError>;

/// Error rendered to HTTP clients
///
/// Hooks return these to abort a request; the engine renders them verbatim
/// using [`ApiError::status_code`] and [`ApiError::to_response`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// The requested resource (or one of its ancestors) does not exist
    NotFound,

    /// The request body or parameters could not be bound
    InvalidRequest(String),

    /// The resource refuses this verb
    MethodNotAllowed(String),

    /// A collaborator rejected access
    Forbidden,

    /// Storage or unexpected failure
    Internal(String),

    /// Any other status with its own status text
    Custom {
        status: StatusCode,
        status_text: String,
        detail: Option<String>,
    },
}

/// JSON error envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human readable status text
    pub status: String,
    /// Optional detail, usually the underlying error message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ApiError {
    /// Build an `InvalidRequest` from any displayable error
    pub fn invalid(err: impl fmt::Display) -> Self {
        ApiError::InvalidRequest(err.to_string())
    }

    /// Build an `Internal` from any displayable error
    pub fn internal(err: impl fmt::Display) -> Self {
        ApiError::Internal(err.to_string())
    }

    /// Build an error with an arbitrary status code
    pub fn custom(status: StatusCode, status_text: impl Into<String>) -> Self {
        ApiError::Custom {
            status,
            status_text: status_text.into(),
            detail: None,
        }
    }

    /// Attach a detail message to a `Custom` error; other variants are returned unchanged
    pub fn with_detail(self, detail: impl Into<String>) -> Self {
        match self {
            ApiError::Custom {
                status,
                status_text,
                ..
            } => ApiError::Custom {
                status,
                status_text,
                detail: Some(detail.into()),
            },
            other => other,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Custom { status, .. } => *status,
        }
    }

    /// Get the status text placed in the envelope's `status` field
    pub fn status_text(&self) -> &str {
        match self {
            ApiError::NotFound => "Resource not found.",
            ApiError::InvalidRequest(_) => "Invalid request.",
            ApiError::MethodNotAllowed(_) => "Method not allowed.",
            ApiError::Forbidden => "Forbidden",
            ApiError::Internal(_) => "Internal server error.",
            ApiError::Custom { status_text, .. } => status_text,
        }
    }

    /// Get the detail placed in the envelope's `error` field
    pub fn detail(&self) -> Option<&str> {
        match self {
            ApiError::InvalidRequest(detail)
            | ApiError::MethodNotAllowed(detail)
            | ApiError::Internal(detail) => Some(detail),
            ApiError::Custom { detail, .. } => detail.as_deref(),
            ApiError::NotFound | ApiError::Forbidden => None,
        }
    }

    /// Convert to an error response
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            status: self.status_text().to_string(),
            error: self.detail().map(str::to_string),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.detail() {
            Some(detail) => write!(f, "{}: {}", self.status_text(), detail),
            None => write!(f, "{}", self.status_text()),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %self, "request rejected");
        }
        (status, Json(self.to_response())).into_response()
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound => ApiError::NotFound,
            StorageError::Internal(msg) => ApiError::Internal(msg),
        }
    }
}

// =============================================================================
// Storage Errors
// =============================================================================

/// Errors returned by storage backends
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    /// No resource is stored under the requested ID
    #[error("resource not found")]
    NotFound,

    /// Backend failure (lock poisoning, I/O, serialization)
    #[error("storage failure: {0}")]
    Internal(String),
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors detected while wiring the API tree or loading configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Two sibling APIs (or an API and one of its ancestors) share a name
    #[error("duplicate API name '{name}' under '{parent}'")]
    DuplicateName { parent: String, name: String },

    /// A root route was registered on an API that ended up nested
    #[error("API '{name}' has custom root routes but is nested under another API")]
    RootRouteOnChild { name: String },

    /// Two routes in one tree would match the same requests
    #[error("route '{path}' conflicts with '{existing}'")]
    RouteConflict { path: String, existing: String },

    /// A configuration value could not be parsed
    #[error("invalid value '{value}' for '{key}'")]
    InvalidValue { key: String, value: String },

    /// Configuration file could not be read
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file is not valid YAML for the expected shape
    #[error("failed to parse configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
