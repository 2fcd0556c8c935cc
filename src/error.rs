//! Error types
//!
//! Two families live here. [`ClientError`] is what an instrumented client
//! raises; it reaches the caller untouched. [`InstrumentationError`] is what
//! the telemetry code itself can hit; it is logged and never reaches the
//! caller of an instrumented method.

use std::time::Duration;

/// Errors raised by an LLM client call.
///
/// Variants follow the error classes of the Anthropic client library so the
/// `error.type` metric dimension carries familiar names.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    // Transport errors
    #[error("connection error: {0}")]
    ApiConnection(String),

    #[error("request timed out")]
    ApiTimeout,

    // Status errors
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("rate limited, retry after {retry_after:?}")]
    RateLimit { retry_after: Option<Duration> },

    #[error("internal server error ({status}): {message}")]
    InternalServer { status: u16, message: String },

    #[error("API error ({status}): {message}")]
    ApiStatus { status: u16, message: String },

    /// An error from outside the client library's taxonomy whose class name
    /// is known, e.g. one raised by a transport or hook layer.
    #[error("{class}: {source}")]
    Foreign {
        class: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Anything the client library raises outside the classes above.
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl ClientError {
    /// Build the status error matching an HTTP response code.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            400 => ClientError::BadRequest(message),
            401 => ClientError::Authentication(message),
            403 => ClientError::PermissionDenied(message),
            404 => ClientError::NotFound(message),
            429 => ClientError::RateLimit { retry_after: None },
            500..=599 => ClientError::InternalServer { status, message },
            _ => ClientError::ApiStatus { status, message },
        }
    }

    /// Wrap a foreign error, keeping its class name for telemetry.
    pub fn foreign(
        class: &'static str,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        ClientError::Foreign {
            class,
            source: source.into(),
        }
    }

    /// Class name of the error, used as the `error.type` dimension.
    pub fn error_type(&self) -> &'static str {
        match self {
            ClientError::ApiConnection(_) => "APIConnectionError",
            ClientError::ApiTimeout => "APITimeoutError",
            ClientError::BadRequest(_) => "BadRequestError",
            ClientError::Authentication(_) => "AuthenticationError",
            ClientError::PermissionDenied(_) => "PermissionDeniedError",
            ClientError::NotFound(_) => "NotFoundError",
            ClientError::RateLimit { .. } => "RateLimitError",
            ClientError::InternalServer { .. } => "InternalServerError",
            ClientError::ApiStatus { .. } => "APIStatusError",
            ClientError::Foreign { class, .. } => *class,
            ClientError::Other(_) => "Error",
        }
    }

    /// HTTP status carried by the error, if it came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::BadRequest(_) => Some(400),
            ClientError::Authentication(_) => Some(401),
            ClientError::PermissionDenied(_) => Some(403),
            ClientError::NotFound(_) => Some(404),
            ClientError::RateLimit { .. } => Some(429),
            ClientError::InternalServer { status, .. } | ClientError::ApiStatus { status, .. } => {
                Some(*status)
            }
            ClientError::ApiConnection(_)
            | ClientError::ApiTimeout
            | ClientError::Foreign { .. }
            | ClientError::Other(_) => None,
        }
    }
}

/// Failures inside the instrumentation layer.
#[derive(Debug, thiserror::Error)]
pub enum InstrumentationError {
    #[error("failed to serialize prompt content: {0}")]
    Json(#[from] serde_json::Error),

    #[error("token counting failed: {0}")]
    TokenCount(#[source] ClientError),

    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Result type alias for instrumentation operations
pub type Result<T> = std::result::Result<T, InstrumentationError>;
