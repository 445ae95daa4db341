//! Token exchange chain against the Hypergryph identity service and the
//! Skland API.
//!
//! The chain converts an identity proof (phone+password or phone+SMS code)
//! into a long-lived platform token, then into a short-lived session
//! credential pair:
//!
//! ```text
//! proof ──▶ prove_identity ──▶ platform token
//!                 │
//!                 ▼
//!           request_grant ──▶ one-time grant code
//!                 │
//!                 ▼
//!           redeem_grant ──▶ { cred, sign_token, account_id }
//!                 │
//!                 ▼
//!          binding_lookup ──▶ bound game accounts
//! ```
//!
//! Each step is a single HTTP round trip and fails with a typed
//! [`ExchangeError`] naming the stage. No step retries internally; the retry
//! policy belongs to the orchestrator so one configurable backoff governs the
//! whole chain. Grant codes are single-use — re-running a half-finished chain
//! is always cheaper than trying to resume one.

mod chain;
mod error;
mod types;

pub use chain::{ExchangeConfig, TokenExchangeChain};
pub use error::{ExchangeError, ExchangeErrorKind, ExchangeResult, ExchangeStage};
pub use types::{
    BindingCharacter, CredentialParts, IdentityProof, SuccessPredicate, ARKNIGHTS_APP_CODE,
};
