//! In-memory credential cache with single-flight refresh.
//!
//! However many tasks ask for a credential at once, at most one exchange
//! chain runs; everyone else waits on the same outcome. The refresh task runs
//! to completion even if every waiter gives up, so the expensive chain is
//! never wasted mid-flight.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use skland_exchange::CredentialParts;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{AuthError, AuthResult};

/// A usable session credential plus the secret that signs requests made
/// under it.
///
/// Held in memory only. The whole point of the derivation chain is that this
/// can always be rebuilt from the platform token, so it is never persisted.
#[derive(Debug, Clone)]
pub struct SessionCredential {
    /// Value of the `cred` header.
    pub cred: String,
    /// HMAC key for request signing.
    pub sign_token: String,
    /// Skland account id this credential belongs to.
    pub account_id: String,
    /// When the credential was derived, for freshness checks.
    pub acquired_at: Instant,
}

impl SessionCredential {
    /// Wrap freshly redeemed credential parts, stamping the acquisition time.
    pub fn from_parts(parts: CredentialParts) -> Self {
        Self {
            cred: parts.cred,
            sign_token: parts.sign_token,
            account_id: parts.account_id,
            acquired_at: Instant::now(),
        }
    }

    /// Whether the credential is young enough to use without rederiving.
    pub fn is_fresh(&self, window: Duration) -> bool {
        self.acquired_at.elapsed() < window
    }
}

/// Snapshot of the most recent refresh outcome, for status reporting.
#[derive(Debug, Clone, Default)]
pub struct RefreshAttemptState {
    /// Completed refresh attempts since the last successful install.
    pub attempt_count: u32,
    /// The error from the most recent failed attempt, if any.
    pub last_error: Option<AuthError>,
}

struct CacheState {
    current: Option<SessionCredential>,
    attempts: RefreshAttemptState,
    /// Present while a refresh is in flight; waiters subscribe to it.
    in_flight: Option<broadcast::Sender<AuthResult<SessionCredential>>>,
    /// Bumped on `clear` so a refresh started before the clear cannot
    /// resurrect a logged-out session when it lands.
    epoch: u64,
}

/// Shared credential cache.
///
/// Cheap to clone; all clones see the same state. The inner mutex is a plain
/// `std` mutex and is never held across an await point.
#[derive(Clone)]
pub struct CredentialCache {
    state: Arc<Mutex<CacheState>>,
    freshness_window: Duration,
}

impl CredentialCache {
    pub fn new(freshness_window: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(CacheState {
                current: None,
                attempts: RefreshAttemptState::default(),
                in_flight: None,
                epoch: 0,
            })),
            freshness_window,
        }
    }

    /// The cached credential, fresh or not.
    pub fn current(&self) -> Option<SessionCredential> {
        self.state.lock().unwrap().current.clone()
    }

    /// The cached credential only if it is still inside the freshness window.
    pub fn fresh(&self) -> Option<SessionCredential> {
        let state = self.state.lock().unwrap();
        state
            .current
            .as_ref()
            .filter(|c| c.is_fresh(self.freshness_window))
            .cloned()
    }

    /// Whether a refresh is currently in flight.
    pub fn is_refreshing(&self) -> bool {
        self.state.lock().unwrap().in_flight.is_some()
    }

    pub fn attempt_state(&self) -> RefreshAttemptState {
        self.state.lock().unwrap().attempts.clone()
    }

    /// Install a credential derived outside of `ensure` (login path).
    /// Resets the attempt counter.
    pub fn install(&self, credential: SessionCredential) {
        let mut state = self.state.lock().unwrap();
        state.current = Some(credential);
        state.attempts = RefreshAttemptState::default();
    }

    /// Drop the cached credential but keep the epoch, so an in-flight
    /// refresh may still land. Used when a downstream consumer reports the
    /// credential rejected.
    pub fn invalidate(&self) {
        self.state.lock().unwrap().current = None;
    }

    /// Drop everything and bump the epoch. Any refresh already in flight
    /// will complete but its result is discarded.
    pub fn clear(&self) {
        let mut state = self.state.lock().unwrap();
        state.current = None;
        state.attempts = RefreshAttemptState::default();
        state.epoch += 1;
        // Detach the in-flight refresh, if any; its waiters still get the
        // result but a post-clear `ensure` starts over.
        state.in_flight = None;
    }

    /// Return a fresh credential, running `refresh` at most once no matter
    /// how many tasks call this concurrently.
    ///
    /// The refresh future is spawned onto the runtime so it finishes even if
    /// the caller is cancelled; later callers then benefit from the result.
    pub async fn ensure<F, Fut>(&self, refresh: F) -> AuthResult<SessionCredential>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = AuthResult<SessionCredential>> + Send + 'static,
    {
        let mut rx = {
            let mut state = self.state.lock().unwrap();
            if let Some(credential) = state
                .current
                .as_ref()
                .filter(|c| c.is_fresh(self.freshness_window))
            {
                return Ok(credential.clone());
            }
            if let Some(tx) = &state.in_flight {
                debug!("credential refresh already in flight, waiting");
                tx.subscribe()
            } else {
                let (tx, rx) = broadcast::channel(1);
                state.in_flight = Some(tx.clone());
                let epoch = state.epoch;
                let future = refresh();
                drop(state);

                let cache = self.clone();
                tokio::spawn(async move {
                    let result = future.await;
                    cache.finish_refresh(epoch, tx, result);
                });
                rx
            }
        };

        match rx.recv().await {
            Ok(result) => result,
            // The sender is dropped only after broadcasting, so this means
            // the refresh task was torn down with the runtime.
            Err(_) => Err(AuthError::Internal(
                "credential refresh task went away".to_string(),
            )),
        }
    }

    fn finish_refresh(
        &self,
        epoch: u64,
        tx: broadcast::Sender<AuthResult<SessionCredential>>,
        result: AuthResult<SessionCredential>,
    ) {
        {
            let mut state = self.state.lock().unwrap();
            if state.epoch == epoch {
                match &result {
                    Ok(credential) => {
                        state.current = Some(credential.clone());
                        state.attempts = RefreshAttemptState::default();
                    }
                    Err(err) => {
                        state.attempts.attempt_count += 1;
                        state.attempts.last_error = Some(err.clone());
                        warn!(error = %err, "credential refresh failed");
                    }
                }
                state.in_flight = None;
            } else {
                // `clear` already detached this refresh; leave any newer
                // in-flight sender alone.
                debug!("discarding refresh result from a previous session epoch");
            }
        }
        // Waiters may all have gone away; that is fine.
        let _ = tx.send(result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credential(tag: &str) -> SessionCredential {
        SessionCredential {
            cred: format!("cred-{tag}"),
            sign_token: format!("sign-{tag}"),
            account_id: "id1".to_string(),
            acquired_at: Instant::now(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fresh_respects_window() {
        let cache = CredentialCache::new(Duration::from_secs(480));
        cache.install(credential("a"));
        assert!(cache.fresh().is_some());

        tokio::time::advance(Duration::from_secs(479)).await;
        assert!(cache.fresh().is_some());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(cache.fresh().is_none());
        // Still present, just stale.
        assert!(cache.current().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ensure_returns_cached_without_refreshing() {
        let cache = CredentialCache::new(Duration::from_secs(480));
        cache.install(credential("a"));
        let got = cache
            .ensure(|| async { panic!("refresh must not run for a fresh credential") })
            .await
            .unwrap();
        assert_eq!(got.cred, "cred-a");
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_discards_in_flight_result() {
        let cache = CredentialCache::new(Duration::from_secs(480));
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();

        let pending = {
            let cache = cache.clone();
            tokio::spawn(async move {
                cache
                    .ensure(move || async move {
                        let _ = release_rx.await;
                        Ok(credential("stale-epoch"))
                    })
                    .await
            })
        };
        tokio::task::yield_now().await;
        assert!(cache.is_refreshing());

        cache.clear();
        release_tx.send(()).unwrap();

        // The waiter still gets its result back.
        let got = pending.await.unwrap().unwrap();
        assert_eq!(got.cred, "cred-stale-epoch");
        // But the cache stayed empty.
        assert!(cache.current().is_none());
        assert!(!cache.is_refreshing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_refresh_records_attempt() {
        let cache = CredentialCache::new(Duration::from_secs(480));
        let err = cache
            .ensure(|| async {
                Err(AuthError::Network {
                    message: "connection reset".to_string(),
                })
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Network { .. }));

        let attempts = cache.attempt_state();
        assert_eq!(attempts.attempt_count, 1);
        assert!(attempts.last_error.is_some());
        assert!(!cache.is_refreshing());
    }
}
