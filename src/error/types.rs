//! Core error types.

use thiserror::Error;

/// Unified error type for all client operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Invalid client or provider configuration.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// A caller-supplied generation option is unknown or out of range.
    #[error("Invalid option: {0}")]
    InvalidOption(String),

    /// No credentials could be resolved for the provider.
    #[error("Missing credentials for provider '{0}'")]
    MissingCredentials(String),

    /// The provider does not support the requested operation.
    #[error("Provider '{provider}' does not support operation '{operation}'")]
    UnsupportedOperation { provider: String, operation: String },

    /// A different adapter is already registered under this provider id.
    #[error("Provider '{0}' is already registered with a different adapter")]
    AlreadyRegistered(String),

    /// Registry lookup failed.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The registry entry is metadata-only and cannot serve requests.
    #[error("Provider '{0}' has no adapter implementation")]
    NotImplemented(String),

    /// Generic HTTP failure (request could not be sent or read).
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// The request timed out.
    #[error("Request timed out: {0}")]
    TimeoutError(String),

    /// The connection could not be established.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The provider returned a non-2xx response. The raw body is preserved
    /// verbatim for diagnostics.
    #[error("API error (status {status}): {message}")]
    ApiError {
        status: u16,
        message: String,
        body: String,
    },

    /// A response body could not be interpreted.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// JSON serialization or deserialization failed.
    #[error("JSON error: {0}")]
    JsonError(String),

    /// An established stream failed.
    #[error("Stream error: {0}")]
    StreamError(String),

    /// Invariant violation inside the client itself.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Coarse classification of a [`ClientError`], useful for deciding whether a
/// failure is worth reporting to the user, retrying externally, or filing as
/// a bug.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Caller or deployment mistake; fails before any network I/O.
    Configuration,
    /// Network-level failure; an external retry policy may apply.
    Transport,
    /// The provider answered, but the answer was an error or unreadable.
    Decode,
    /// An established stream broke.
    Stream,
    /// A bug in this crate.
    Internal,
}

impl ClientError {
    /// Convenience constructor for an API error.
    pub fn api_error(status: u16, message: impl Into<String>, body: impl Into<String>) -> Self {
        Self::ApiError {
            status,
            message: message.into(),
            body: body.into(),
        }
    }

    /// Classify this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ConfigurationError(_)
            | Self::InvalidOption(_)
            | Self::MissingCredentials(_)
            | Self::UnsupportedOperation { .. }
            | Self::AlreadyRegistered(_)
            | Self::NotFound(_)
            | Self::NotImplemented(_) => ErrorCategory::Configuration,
            Self::HttpError(_) | Self::TimeoutError(_) | Self::ConnectionError(_) => {
                ErrorCategory::Transport
            }
            Self::ApiError { .. } | Self::ParseError(_) | Self::JsonError(_) => {
                ErrorCategory::Decode
            }
            Self::StreamError(_) => ErrorCategory::Stream,
            Self::InternalError(_) => ErrorCategory::Internal,
        }
    }

    /// Whether an external retry policy could plausibly succeed.
    ///
    /// Configuration errors never are; server-side 5xx and 429 are.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::TimeoutError(_) | Self::ConnectionError(_) => true,
            Self::ApiError { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}
