//! Flow transport error types

use thiserror::Error;

/// Transport failure with classification
#[derive(Debug, Error)]
#[error("{message}")]
pub struct FlowError {
    pub kind: FlowErrorKind,
    pub message: String,
}

impl FlowError {
    pub fn new(kind: FlowErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(FlowErrorKind::Network, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(FlowErrorKind::Timeout, message)
    }

    pub fn rate_limit(message: impl Into<String>) -> Self {
        Self::new(FlowErrorKind::RateLimit, message)
    }

    pub fn server_error(message: impl Into<String>) -> Self {
        Self::new(FlowErrorKind::ServerError, message)
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(FlowErrorKind::Auth, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(FlowErrorKind::InvalidRequest, message)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(FlowErrorKind::Malformed, message)
    }

    pub fn remote(message: impl Into<String>) -> Self {
        Self::new(FlowErrorKind::Remote, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(FlowErrorKind::Unknown, message)
    }

    /// Classify a non-200 response from the flow endpoint
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        match status {
            400 => Self::invalid_request(message),
            401 | 403 => Self::auth(message),
            429 => Self::rate_limit(message),
            500..=599 => Self::server_error(message),
            _ => Self::unknown(message),
        }
    }
}

/// Error classification, used for logging only. The controller never retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowErrorKind {
    /// Connection failures or a broken body stream
    Network,
    /// The request ran past its deadline
    Timeout,
    /// Rate limited (429)
    RateLimit,
    /// Server error (5xx)
    ServerError,
    /// Authentication failed (401, 403)
    Auth,
    /// Bad request (400)
    InvalidRequest,
    /// Undecodable frame or a stream that ended without a final result
    Malformed,
    /// The flow reported an error frame
    Remote,
    /// Unknown error
    Unknown,
}

impl FlowErrorKind {
    /// Whether resubmitting the same query could plausibly succeed
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            Self::Network | Self::Timeout | Self::RateLimit | Self::ServerError
        )
    }
}
