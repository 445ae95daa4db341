//! Session and credential lifecycle states.

/// High-level session state, as reported to callers and the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    /// No session. The initial state, and where every logout lands.
    LoggedOut,
    /// A persisted session is being validated on startup.
    Restoring,
    /// A login attempt is running the exchange chain.
    LoggingIn,
    /// A session is established; credentials can be derived on demand.
    LoggedIn,
}

impl AuthState {
    pub fn is_logged_in(&self) -> bool {
        matches!(self, AuthState::LoggedIn)
    }
}

impl std::fmt::Display for AuthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AuthState::LoggedOut => "logged_out",
            AuthState::Restoring => "restoring",
            AuthState::LoggingIn => "logging_in",
            AuthState::LoggedIn => "logged_in",
        };
        f.write_str(name)
    }
}

/// Where the cached credential sits relative to the freshness window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialState {
    /// Usable as-is.
    Fresh,
    /// Present but outside the freshness window; next use rederives.
    Stale,
    /// A rederivation is in flight.
    Refreshing,
    /// No credential cached.
    Absent,
}

impl std::fmt::Display for CredentialState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CredentialState::Fresh => "fresh",
            CredentialState::Stale => "stale",
            CredentialState::Refreshing => "refreshing",
            CredentialState::Absent => "absent",
        };
        f.write_str(name)
    }
}
