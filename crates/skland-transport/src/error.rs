//! Transport error types.

use thiserror::Error;

/// Error type for HTTP transport operations.
///
/// These are transport-layer failures only; business-level failures (non-zero
/// discriminators, rejected signatures) are surfaced as successful responses
/// and classified upstream.
#[derive(Error, Debug, Clone)]
pub enum TransportError {
    /// The request did not complete within the configured timeout.
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Connection-level failure (DNS, TLS, refused, reset).
    #[error("Request failed: {0}")]
    Request(String),

    /// The response body could not be read or was not valid JSON.
    #[error("Invalid response body: {0}")]
    InvalidBody(String),
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout(err.to_string())
        } else if err.is_decode() {
            TransportError::InvalidBody(err.to_string())
        } else {
            TransportError::Request(err.to_string())
        }
    }
}
