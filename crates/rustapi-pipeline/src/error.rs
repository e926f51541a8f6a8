//! Error types for the pipeline

use http::StatusCode;
use serde::Serialize;
use std::fmt;

/// Result type alias for request-time operations
pub type Result<T, E = ApiError> = std::result::Result<T, E>;

/// Boxed error carried by [`PipelineError::Plugin`]
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Standard API error type
///
/// Rendered as `{"error":{"type":...,"message":...}}` when turned into a response.
#[derive(Debug, Clone)]
pub struct ApiError {
    /// HTTP status code
    pub status: StatusCode,
    /// Error type identifier
    pub error_type: String,
    /// Human-readable error message
    pub message: String,
}

impl ApiError {
    /// Create a new API error
    pub fn new(
        status: StatusCode,
        error_type: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            status,
            error_type: error_type.into(),
            message: message.into(),
        }
    }

    /// Create a 400 Bad Request error
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "bad_request", message)
    }

    /// Create a 404 Not Found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }

    /// Create a 500 Internal Server Error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", message)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.error_type, self.message)
    }
}

impl std::error::Error for ApiError {}

/// JSON representation of API error response
#[derive(Serialize)]
pub(crate) struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Serialize)]
pub(crate) struct ErrorBody {
    #[serde(rename = "type")]
    pub error_type: String,
    pub message: String,
}

impl From<ApiError> for ErrorResponse {
    fn from(err: ApiError) -> Self {
        Self {
            error: ErrorBody {
                error_type: err.error_type,
                message: err.message,
            },
        }
    }
}

/// Errors raised while assembling a [`Pipeline`](crate::Pipeline).
///
/// These are programmer or configuration errors and are never produced while
/// serving requests.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The plugin is already installed on this pipeline.
    #[error("plugin `{plugin}` has already been registered")]
    AlreadyRegistered {
        /// Name of the plugin
        plugin: &'static str,
    },

    /// The plugin needs another plugin that has not been registered yet.
    #[error("plugin `{plugin}` requires `{dependency}` to be registered first")]
    MissingDependency {
        /// Name of the plugin being registered
        plugin: &'static str,
        /// Name of the missing plugin
        dependency: &'static str,
    },

    /// The plugin rejected its own configuration.
    #[error("plugin `{plugin}` failed to register: {source}")]
    Plugin {
        /// Name of the plugin
        plugin: &'static str,
        /// Underlying error
        #[source]
        source: BoxError,
    },
}

impl PipelineError {
    /// Wrap a plugin's own error
    pub fn plugin(plugin: &'static str, source: impl Into<BoxError>) -> Self {
        Self::Plugin {
            plugin,
            source: source.into(),
        }
    }
}
