//! Credential lifecycle management for the Skland companion.
//!
//! This crate owns the session state machine. It ties the token exchange
//! chain, the credential cache, and the durable session store together behind
//! a small surface:
//!
//! - [`AuthOrchestrator::login_with_password`] / [`AuthOrchestrator::login_with_sms_code`]
//! - [`AuthOrchestrator::restore`] — resume a persisted session on startup
//! - [`AuthOrchestrator::ensure_credential`] — "give me a usable credential",
//!   transparently rederiving a stale one
//! - [`AuthOrchestrator::logout`]
//!
//! Key invariants:
//!
//! - At most one exchange chain is in flight at a time, however many callers
//!   ask for a credential simultaneously ([`CredentialCache`] single-flight).
//! - Session credentials are short-lived and never persisted; only the
//!   long-lived platform token survives restarts.
//! - Only the orchestrator decides session-destructive action: an
//!   `Auth`-classified failure forces logout and clears the store, while a
//!   `Network`-classified failure leaves every piece of state untouched.

mod credential_cache;
mod error;
mod orchestrator;
mod state;

#[cfg(test)]
mod tests;

pub use credential_cache::{CredentialCache, RefreshAttemptState, SessionCredential};
pub use error::{AuthError, AuthResult, ErrorClass};
pub use orchestrator::{AuthOrchestrator, AuthPolicy};
pub use state::{AuthState, CredentialState};
