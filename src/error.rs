//! Error types for the BIG-IP provider.

use thiserror::Error;

use crate::schema::Diagnostic;

/// Errors raised while configuring the provider or managing a resource.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The requested object does not exist on the device.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Resource attributes failed validation before any call was made.
    #[error("Validation error: {0}")]
    Validation(String),

    /// An internal invariant of the provider was violated.
    #[error("Internal error: {0}")]
    Internal(String),

    /// The provider configuration is missing or invalid.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The requested resource or data source type is unknown.
    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    /// A JSON document could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP transport failure (connection refused, DNS, TLS, body read).
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// A device URL could not be built.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The device answered with a non-success HTTP status.
    #[error("Device API error (HTTP {status}): {message}")]
    Api {
        /// HTTP status code returned by the device.
        status: u16,
        /// Response body preview.
        message: String,
    },

    /// Login was rejected or no usable credentials were supplied.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// An asynchronous device task finished in a failed state.
    #[error("Task {task_id} failed: {message}")]
    TaskFailed {
        /// Identifier of the device task.
        task_id: String,
        /// Failure detail reported by the device.
        message: String,
    },

    /// A poll or lock wait ran past its deadline.
    #[error("Deadline exceeded: {0}")]
    DeadlineExceeded(String),

    /// The operation was aborted because the provider is stopping.
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// Operation not supported by this resource type.
    #[error("Unimplemented: {0}")]
    Unimplemented(String),
}

impl ProviderError {
    /// Get the error message without the variant prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::NotFound(msg)
            | Self::Validation(msg)
            | Self::Internal(msg)
            | Self::Configuration(msg)
            | Self::UnknownResource(msg)
            | Self::Authentication(msg)
            | Self::DeadlineExceeded(msg)
            | Self::Cancelled(msg)
            | Self::Unimplemented(msg) => msg,
            Self::Api { message, .. } | Self::TaskFailed { message, .. } => message,
            Self::Serialization(_err) => "serialization error (see Debug output)",
            Self::Transport(_err) => "transport error (see Debug output)",
            Self::InvalidUrl(_err) => "invalid URL (see Debug output)",
        }
    }

    /// Build an [`ProviderError::Api`] from a status and a response body,
    /// truncating the body to a readable preview.
    pub fn api(status: u16, body: &str) -> Self {
        let preview: String = body.chars().take(512).collect();
        Self::Api {
            status,
            message: preview,
        }
    }

    /// Returns `true` when the error means the remote object is gone.
    ///
    /// Covers explicit not-found errors, HTTP 404 and 204 answers, and a
    /// response body that ended before any JSON value was read. Handlers use
    /// this to clear state instead of failing the run.
    pub fn indicates_absence(&self) -> bool {
        match self {
            Self::NotFound(_) => true,
            Self::Api { status, .. } => *status == 404 || *status == 204,
            Self::Serialization(err) => err.is_eof(),
            _ => false,
        }
    }

    /// Returns `true` for deadline and cancellation errors.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::DeadlineExceeded(_) | Self::Cancelled(_))
    }

    /// Convert this error into an error diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let diagnostic = Diagnostic::error(self.to_string());
        match self {
            Self::TaskFailed { task_id, .. } => {
                diagnostic.with_detail(format!("device task id: {task_id}"))
            }
            Self::Api { status, .. } => diagnostic.with_detail(format!("HTTP status {status}")),
            _ => diagnostic,
        }
    }
}
