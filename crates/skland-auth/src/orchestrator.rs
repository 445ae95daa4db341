//! The auth orchestrator: session state machine over the exchange chain,
//! credential cache, and session store.

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use skland_config_and_utils::Config;
use skland_exchange::{BindingCharacter, ExchangeResult, IdentityProof, TokenExchangeChain};
use skland_session_store::{SessionStore, StoredSession};
use tracing::{debug, info, warn};

use crate::credential_cache::{CredentialCache, RefreshAttemptState, SessionCredential};
use crate::error::{AuthError, AuthResult};
use crate::state::{AuthState, CredentialState};

/// Retry and freshness tuning for the orchestrator.
#[derive(Debug, Clone)]
pub struct AuthPolicy {
    /// Extra attempts after a network-classified failure.
    pub network_retries: u32,
    /// Fixed delay between attempts.
    pub retry_delay: Duration,
    /// Cap on restore attempts per process.
    pub max_restore_attempts: u32,
    /// Age under which a cached credential is reused without rederiving.
    pub freshness_window: Duration,
}

impl Default for AuthPolicy {
    fn default() -> Self {
        Self {
            network_retries: 2,
            retry_delay: Duration::from_secs(1),
            max_restore_attempts: 3,
            freshness_window: Duration::from_secs(480),
        }
    }
}

impl From<&Config> for AuthPolicy {
    fn from(config: &Config) -> Self {
        Self {
            network_retries: config.network_retries,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
            max_restore_attempts: config.max_restore_attempts,
            freshness_window: Duration::from_secs(config.freshness_window_secs),
        }
    }
}

struct OrchestratorInner {
    chain: TokenExchangeChain,
    cache: CredentialCache,
    store: SessionStore,
    policy: AuthPolicy,
    state: Mutex<AuthState>,
    platform_token: Mutex<Option<String>>,
    account_id: Mutex<Option<String>>,
    bindings: Mutex<Vec<BindingCharacter>>,
    restore_attempts: AtomicU32,
    /// Serializes restore calls; tokio mutex because restore awaits while
    /// holding it.
    restore_gate: tokio::sync::Mutex<()>,
}

/// Owns the session lifecycle. Cheap to clone; all clones share state.
///
/// This is the only component that takes session-destructive action: an
/// `Auth`-classified failure during credential derivation forces a full
/// logout, while `Network`-classified failures leave every piece of state
/// untouched for a later retry.
#[derive(Clone)]
pub struct AuthOrchestrator {
    inner: Arc<OrchestratorInner>,
}

impl AuthOrchestrator {
    pub fn new(chain: TokenExchangeChain, store: SessionStore, policy: AuthPolicy) -> Self {
        let cache = CredentialCache::new(policy.freshness_window);
        Self {
            inner: Arc::new(OrchestratorInner {
                chain,
                cache,
                store,
                policy,
                state: Mutex::new(AuthState::LoggedOut),
                platform_token: Mutex::new(None),
                account_id: Mutex::new(None),
                bindings: Mutex::new(Vec::new()),
                restore_attempts: AtomicU32::new(0),
                restore_gate: tokio::sync::Mutex::new(()),
            }),
        }
    }

    /// Current session state.
    pub fn state(&self) -> AuthState {
        *self.inner.state.lock().unwrap()
    }

    /// Where the cached credential sits relative to the freshness window.
    pub fn credential_state(&self) -> CredentialState {
        if self.inner.cache.is_refreshing() {
            CredentialState::Refreshing
        } else if self.inner.cache.fresh().is_some() {
            CredentialState::Fresh
        } else if self.inner.cache.current().is_some() {
            CredentialState::Stale
        } else {
            CredentialState::Absent
        }
    }

    /// Skland account id of the active session, if any.
    pub fn account_id(&self) -> Option<String> {
        self.inner.account_id.lock().unwrap().clone()
    }

    /// Last-known game account bindings.
    pub fn bindings(&self) -> Vec<BindingCharacter> {
        self.inner.bindings.lock().unwrap().clone()
    }

    /// Outcome of the most recent credential refresh attempts.
    pub fn refresh_attempts(&self) -> RefreshAttemptState {
        self.inner.cache.attempt_state()
    }

    /// Log in with phone number and password.
    pub async fn login_with_password(&self, phone: &str, password: &str) -> AuthResult<Vec<BindingCharacter>> {
        self.login(IdentityProof::PhonePassword {
            phone: phone.to_string(),
            password: password.to_string(),
        })
        .await
    }

    /// Log in with phone number and an SMS verification code.
    pub async fn login_with_sms_code(&self, phone: &str, code: &str) -> AuthResult<Vec<BindingCharacter>> {
        self.login(IdentityProof::SmsCode {
            phone: phone.to_string(),
            code: code.to_string(),
        })
        .await
    }

    /// Request an SMS verification code for the given phone number.
    pub async fn send_sms_code(&self, phone: &str) -> AuthResult<()> {
        let policy = &self.inner.policy;
        with_retry(policy.network_retries, policy.retry_delay, || {
            self.inner.chain.send_sms_code(phone)
        })
        .await
    }

    /// Run the full exchange chain from an identity proof and establish a
    /// session.
    ///
    /// On success the platform token is persisted and the derived credential
    /// cached. On any failure the orchestrator returns to `LoggedOut` with no
    /// partial state left behind; a previously persisted session is untouched.
    pub async fn login(&self, proof: IdentityProof) -> AuthResult<Vec<BindingCharacter>> {
        self.set_state(AuthState::LoggingIn);
        // Any refresh belonging to the previous session is now moot.
        self.inner.cache.clear();

        match self.login_inner(&proof).await {
            Ok(bindings) => {
                self.inner.restore_attempts.store(0, Ordering::SeqCst);
                self.set_state(AuthState::LoggedIn);
                info!(phone = %proof.phone(), "login succeeded");
                Ok(bindings)
            }
            Err(err) => {
                self.set_state(AuthState::LoggedOut);
                *self.inner.platform_token.lock().unwrap() = None;
                *self.inner.account_id.lock().unwrap() = None;
                self.inner.bindings.lock().unwrap().clear();
                self.inner.cache.clear();
                warn!(error = %err, "login failed");
                Err(err)
            }
        }
    }

    async fn login_inner(&self, proof: &IdentityProof) -> AuthResult<Vec<BindingCharacter>> {
        let policy = self.inner.policy.clone();

        let platform_token = with_retry(policy.network_retries, policy.retry_delay, || {
            self.inner.chain.prove_identity(proof)
        })
        .await?;

        let credential = derive_credential(
            self.inner.chain.clone(),
            policy.clone(),
            platform_token.clone(),
        )
        .await?;

        let bindings = with_retry(policy.network_retries, policy.retry_delay, || {
            self.inner
                .chain
                .binding_lookup(&credential.cred, &credential.sign_token)
        })
        .await?;

        let account_id = credential.account_id.clone();
        self.inner.cache.install(credential);
        *self.inner.platform_token.lock().unwrap() = Some(platform_token.clone());
        *self.inner.account_id.lock().unwrap() = Some(account_id.clone());
        *self.inner.bindings.lock().unwrap() = bindings.clone();

        self.persist_session(platform_token, account_id, &bindings)
            .await;

        Ok(bindings)
    }

    /// Return a usable session credential, rederiving if the cached one is
    /// stale or absent. Concurrent callers share one derivation.
    ///
    /// An `Auth`-classified failure here means the platform token itself is
    /// no longer accepted, so the whole session is torn down.
    pub async fn ensure_credential(&self) -> AuthResult<SessionCredential> {
        let platform_token = self
            .inner
            .platform_token
            .lock()
            .unwrap()
            .clone()
            .ok_or(AuthError::NotLoggedIn)?;

        let chain = self.inner.chain.clone();
        let policy = self.inner.policy.clone();
        let result = self
            .inner
            .cache
            .ensure(move || derive_credential(chain, policy, platform_token))
            .await;

        if let Err(err) = &result {
            if err.forces_logout() {
                warn!(error = %err, "session no longer accepted, logging out");
                self.force_logout();
            }
        }
        result
    }

    /// Build the signed header set for a session-scoped request, deriving a
    /// fresh credential first if needed.
    pub async fn signed_request_headers(
        &self,
        method: &str,
        url: &str,
        body: Option<&Value>,
    ) -> AuthResult<Vec<(String, String)>> {
        let credential = self.ensure_credential().await?;
        let config = self.inner.chain.config();
        skland_signing::signed_headers(
            &credential.cred,
            &credential.sign_token,
            method,
            url,
            body,
            &config.platform,
            &config.client_version,
        )
        .map_err(|e| AuthError::Internal(e.to_string()))
    }

    /// Probe whether the active credential is still accepted by the service.
    /// A definitive rejection tears the session down; transport failures
    /// surface as errors without touching state.
    pub async fn verify_session(&self) -> AuthResult<bool> {
        let credential = self.ensure_credential().await?;
        let valid = self
            .inner
            .chain
            .check_cred(&credential.cred)
            .await
            .map_err(AuthError::from)?;
        if !valid {
            warn!("credential check came back rejected, logging out");
            self.force_logout();
        }
        Ok(valid)
    }

    /// Resume a persisted session, if one exists and is still valid.
    ///
    /// Returns `Ok(true)` when a session was restored. Restoration is
    /// optimistic: the stored platform token is trusted immediately and a
    /// credential derivation is kicked off in the background, so callers get
    /// a responsive `LoggedIn` state while validity is confirmed. A bad token
    /// is caught by the background derivation, which forces logout.
    pub async fn restore(&self) -> AuthResult<bool> {
        let _gate = self.inner.restore_gate.lock().await;

        if self.state() == AuthState::LoggedIn {
            return Ok(true);
        }

        let attempts = self.inner.restore_attempts.fetch_add(1, Ordering::SeqCst);
        if attempts >= self.inner.policy.max_restore_attempts {
            warn!(attempts, "restore attempt cap reached, staying logged out");
            return Ok(false);
        }

        self.set_state(AuthState::Restoring);

        let record = match self.inner.store.load() {
            Ok(record) => record,
            Err(e) => {
                self.set_state(AuthState::LoggedOut);
                return Err(AuthError::Storage(e.to_string()));
            }
        };

        let record = match record {
            Some(record) => record,
            None => {
                debug!("no restorable session");
                self.set_state(AuthState::LoggedOut);
                return Ok(false);
            }
        };

        *self.inner.platform_token.lock().unwrap() = Some(record.platform_token.clone());
        *self.inner.account_id.lock().unwrap() = Some(record.account_id.clone());
        if let Some(snapshot) = record.profile_snapshot {
            if let Ok(bindings) = serde_json::from_value::<Vec<BindingCharacter>>(snapshot) {
                *self.inner.bindings.lock().unwrap() = bindings;
            }
        }
        self.set_state(AuthState::LoggedIn);
        info!(account_id = %record.account_id, "session restored, validating in background");

        let orchestrator = self.clone();
        tokio::spawn(async move {
            orchestrator.background_revalidate().await;
        });

        Ok(true)
    }

    /// Post-restore validation: derive a credential, refresh bindings, and
    /// re-stamp the stored record. Failures are logged; an auth rejection has
    /// already forced logout inside `ensure_credential`.
    async fn background_revalidate(&self) {
        let credential = match self.ensure_credential().await {
            Ok(credential) => credential,
            Err(err) => {
                warn!(error = %err, "post-restore credential derivation failed");
                return;
            }
        };

        let policy = &self.inner.policy;
        let bindings = match with_retry(policy.network_retries, policy.retry_delay, || {
            self.inner
                .chain
                .binding_lookup(&credential.cred, &credential.sign_token)
        })
        .await
        {
            Ok(bindings) => bindings,
            Err(err) => {
                warn!(error = %err, "post-restore binding refresh failed");
                return;
            }
        };

        *self.inner.bindings.lock().unwrap() = bindings.clone();
        *self.inner.account_id.lock().unwrap() = Some(credential.account_id.clone());

        let token = self.inner.platform_token.lock().unwrap().clone();
        if let Some(token) = token {
            self.persist_session(token, credential.account_id, &bindings)
                .await;
        }
    }

    /// Tear the session down and remove it from durable storage.
    pub async fn logout(&self) -> AuthResult<()> {
        self.force_logout();
        info!("logged out");
        Ok(())
    }

    /// Clear all session state. Persistence failure is logged, not surfaced:
    /// the in-memory session is gone either way.
    fn force_logout(&self) {
        self.inner.cache.clear();
        *self.inner.platform_token.lock().unwrap() = None;
        *self.inner.account_id.lock().unwrap() = None;
        self.inner.bindings.lock().unwrap().clear();
        self.set_state(AuthState::LoggedOut);
        if let Err(e) = self.inner.store.clear() {
            warn!(error = %e, "failed to clear stored session");
        }
    }

    /// Persist the session record, stamped now. A write failure never fails
    /// the session; the next save will try again.
    async fn persist_session(
        &self,
        platform_token: String,
        account_id: String,
        bindings: &[BindingCharacter],
    ) {
        let snapshot = serde_json::to_value(bindings).ok();
        let record = StoredSession::new(platform_token, account_id, snapshot);
        if let Err(e) = self.inner.store.save(record).await {
            warn!(error = %e, "failed to persist session");
        }
    }

    fn set_state(&self, state: AuthState) {
        let mut current = self.inner.state.lock().unwrap();
        if *current != state {
            debug!(from = %current, to = %state, "auth state transition");
            *current = state;
        }
    }
}

/// Derive a session credential from the platform token.
///
/// Grant codes are single-use, so a transient failure during redeem cannot
/// retry the redeem alone; each attempt requests a fresh grant.
async fn derive_credential(
    chain: TokenExchangeChain,
    policy: AuthPolicy,
    platform_token: String,
) -> AuthResult<SessionCredential> {
    with_retry(policy.network_retries, policy.retry_delay, || {
        let chain = chain.clone();
        let token = platform_token.clone();
        async move {
            let grant = chain.request_grant(&token).await?;
            chain.redeem_grant(&grant).await
        }
    })
    .await
    .map(SessionCredential::from_parts)
}

/// Run `op`, retrying network-classified failures up to `retries` extra
/// times with a fixed delay. Auth-classified failures return immediately.
async fn with_retry<T, F, Fut>(retries: u32, delay: Duration, op: F) -> AuthResult<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = ExchangeResult<T>>,
{
    let mut attempt: u32 = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                let err = AuthError::from(e);
                if err.is_retryable() && attempt < retries {
                    attempt += 1;
                    debug!(attempt, error = %err, "retrying after transient failure");
                    tokio::time::sleep(delay).await;
                    continue;
                }
                return Err(err);
            }
        }
    }
}
