//! Classified auth errors.
//!
//! Everything above this layer sees classified errors only; raw HTTP status
//! codes and business discriminators stop here.

use skland_exchange::{ExchangeError, ExchangeErrorKind, ExchangeStage};
use thiserror::Error;

/// Coarse classification driving retry and session-destruction decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The session itself is bad. Never retried; forces logout when it
    /// happens to an established session.
    Auth,
    /// Transient transport or server misbehavior. Retried; never destroys
    /// session state.
    Network,
    /// Anything else. Not retried, not session-destructive.
    Unknown,
}

/// Error surfaced by the auth layer.
///
/// Cloneable so a single refresh outcome can be shared with every waiter.
#[derive(Error, Debug, Clone)]
pub enum AuthError {
    /// The identity proof was rejected (wrong password or SMS code).
    /// Terminal for the attempt; the user must retry proof entry.
    #[error("identity proof rejected: {message}")]
    ProofRejected { message: String },

    /// A previously valid token or credential is no longer accepted.
    #[error("session no longer accepted: {message}")]
    AuthExpired { message: String },

    /// Transport failure, timeout, or server error.
    #[error("network failure: {message}")]
    Network { message: String },

    /// Success status but missing expected fields. Retried like a network
    /// failure, logged distinctly.
    #[error("malformed service response: {message}")]
    Malformed { message: String },

    /// Durable storage failed outright (not corruption, which is handled
    /// silently).
    #[error("storage error: {0}")]
    Storage(String),

    /// An operation that needs a session was called without one.
    #[error("not logged in")]
    NotLoggedIn,

    /// Internal invariant failure (e.g. a refresh task vanished).
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type for auth operations.
pub type AuthResult<T> = Result<T, AuthError>;

impl AuthError {
    /// Classification for retry/session-destruction decisions.
    pub fn class(&self) -> ErrorClass {
        match self {
            AuthError::ProofRejected { .. } | AuthError::AuthExpired { .. } => ErrorClass::Auth,
            AuthError::Network { .. } | AuthError::Malformed { .. } => ErrorClass::Network,
            AuthError::Storage(_) | AuthError::NotLoggedIn | AuthError::Internal(_) => {
                ErrorClass::Unknown
            }
        }
    }

    /// Whether the retry policy may re-attempt after this error.
    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Network
    }

    /// Whether this error invalidates the whole session.
    pub fn forces_logout(&self) -> bool {
        matches!(self, AuthError::AuthExpired { .. })
    }
}

impl From<ExchangeError> for AuthError {
    fn from(err: ExchangeError) -> Self {
        let ExchangeError { stage, kind } = err;
        match kind {
            ExchangeErrorKind::Transport(e) => AuthError::Network {
                message: format!("{stage}: {e}"),
            },
            ExchangeErrorKind::Http { status } => match status {
                401 | 403 => auth_or_proof(stage, format!("HTTP {status}")),
                _ => AuthError::Network {
                    message: format!("{stage}: HTTP {status}"),
                },
            },
            ExchangeErrorKind::Business { code, message } => {
                auth_or_proof(stage, format!("code {code}: {message}"))
            }
            ExchangeErrorKind::Malformed(message) => AuthError::Malformed {
                message: format!("{stage}: {message}"),
            },
        }
    }
}

/// A rejection during proof verification means the proof was wrong; the same
/// rejection later in the chain means an established token or credential has
/// expired.
fn auth_or_proof(stage: ExchangeStage, message: String) -> AuthError {
    match stage {
        ExchangeStage::ProveIdentity | ExchangeStage::SendSmsCode => {
            AuthError::ProofRejected { message }
        }
        _ => AuthError::AuthExpired {
            message: format!("{stage}: {message}"),
        },
    }
}
