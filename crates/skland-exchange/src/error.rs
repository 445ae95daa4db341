//! Typed errors for the exchange chain.

use skland_transport::TransportError;
use thiserror::Error;

/// Which step of the chain failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeStage {
    ProveIdentity,
    SendSmsCode,
    RequestGrant,
    RedeemGrant,
    BindingLookup,
    CredCheck,
}

impl std::fmt::Display for ExchangeStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ExchangeStage::ProveIdentity => "prove_identity",
            ExchangeStage::SendSmsCode => "send_sms_code",
            ExchangeStage::RequestGrant => "request_grant",
            ExchangeStage::RedeemGrant => "redeem_grant",
            ExchangeStage::BindingLookup => "binding_lookup",
            ExchangeStage::CredCheck => "cred_check",
        };
        f.write_str(name)
    }
}

/// What went wrong within a step.
#[derive(Error, Debug, Clone)]
pub enum ExchangeErrorKind {
    /// Transport-layer failure (connect, timeout, unreadable body).
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),

    /// Non-2xx HTTP status.
    #[error("HTTP status {status}")]
    Http { status: u16 },

    /// 2xx HTTP status but a non-success business discriminator.
    #[error("service rejected request (code {code}): {message}")]
    Business { code: i64, message: String },

    /// 2xx HTTP status and success discriminator, but the expected fields
    /// were missing. Treated as transient for retry purposes, logged
    /// distinctly for diagnosis.
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// A failed exchange step.
#[derive(Error, Debug, Clone)]
#[error("{stage} failed: {kind}")]
pub struct ExchangeError {
    pub stage: ExchangeStage,
    pub kind: ExchangeErrorKind,
}

impl ExchangeError {
    pub fn new(stage: ExchangeStage, kind: impl Into<ExchangeErrorKind>) -> Self {
        Self {
            stage,
            kind: kind.into(),
        }
    }
}

/// Result type for exchange operations.
pub type ExchangeResult<T> = Result<T, ExchangeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_names_stage() {
        let err = ExchangeError::new(
            ExchangeStage::RequestGrant,
            ExchangeErrorKind::Http { status: 500 },
        );
        assert_eq!(err.to_string(), "request_grant failed: HTTP status 500");
    }

    #[test]
    fn test_transport_error_converts() {
        let err = ExchangeError::new(
            ExchangeStage::ProveIdentity,
            TransportError::Timeout("deadline elapsed".to_string()),
        );
        assert!(matches!(err.kind, ExchangeErrorKind::Transport(_)));
    }
}
