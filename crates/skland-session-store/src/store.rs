//! Debounced, validated session store.

use crate::{PersistResult, Persistence, StoredSession};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// The single persistence key holding the serialized session record.
pub const AUTH_STATE_KEY: &str = "authState";

/// Error type for session store operations.
///
/// Cloneable so one flush outcome can be fanned out to every coalesced saver.
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    /// The persistence backend failed.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// The record could not be serialized.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type for session store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Tuning for the session store.
#[derive(Debug, Clone)]
pub struct SessionStoreConfig {
    /// Age after which a stored record is deleted on load. Conservative
    /// policy, not a server contract.
    pub expiry: Duration,
    /// Window for coalescing rapid saves.
    pub debounce: Duration,
}

impl Default for SessionStoreConfig {
    fn default() -> Self {
        Self {
            expiry: Duration::from_secs(30 * 24 * 60 * 60),
            debounce: Duration::from_millis(300),
        }
    }
}

/// Durable store for the [`StoredSession`] record.
///
/// Cheap to clone; clones share the same pending-write state.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<Inner>,
}

struct Inner {
    persistence: Arc<dyn Persistence>,
    config: SessionStoreConfig,
    pending: Mutex<PendingState>,
}

#[derive(Default)]
struct PendingState {
    /// Latest record queued for write. Replaced by newer saves in the window.
    record: Option<StoredSession>,
    /// Callers awaiting the next flush.
    waiters: Vec<oneshot::Sender<StoreResult<()>>>,
    /// Whether a flusher task is alive.
    flusher_active: bool,
}

impl SessionStore {
    /// Create a store over the given persistence backend.
    pub fn new(persistence: Arc<dyn Persistence>, config: SessionStoreConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                persistence,
                config,
                pending: Mutex::new(PendingState::default()),
            }),
        }
    }

    /// Queue a save and wait for it to reach durable storage.
    ///
    /// Saves within the debounce window are coalesced: only the newest record
    /// is written, and every caller in the window observes that write's
    /// outcome. A save superseded by [`SessionStore::clear`] before flushing
    /// resolves Ok without writing.
    pub async fn save(&self, record: StoredSession) -> StoreResult<()> {
        let rx = {
            let mut pending = self.inner.pending.lock().unwrap();
            pending.record = Some(record);
            let (tx, rx) = oneshot::channel();
            pending.waiters.push(tx);

            if !pending.flusher_active {
                pending.flusher_active = true;
                let inner = self.inner.clone();
                tokio::spawn(async move {
                    flush_loop(inner).await;
                });
            }
            rx
        };

        match rx.await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Persistence("flusher dropped".to_string())),
        }
    }

    /// Load and validate the stored session.
    ///
    /// Returns `None` (after deleting the record) when it is missing, fails
    /// to parse, is schema-incomplete, or has passed its expiry. Partial
    /// state is treated the same as no state.
    pub fn load(&self) -> StoreResult<Option<StoredSession>> {
        self.load_at(chrono::Utc::now().timestamp_millis())
    }

    fn load_at(&self, now_ms: i64) -> StoreResult<Option<StoredSession>> {
        let raw = match self.inner.persistence.get(AUTH_STATE_KEY).to_store()? {
            Some(raw) => raw,
            None => {
                debug!("no stored session");
                return Ok(None);
            }
        };

        let record: StoredSession = match serde_json::from_str(&raw) {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, "stored session failed to parse, deleting");
                self.inner.persistence.remove(AUTH_STATE_KEY).to_store()?;
                return Ok(None);
            }
        };

        if !record.is_complete() {
            warn!("stored session is incomplete, deleting");
            self.inner.persistence.remove(AUTH_STATE_KEY).to_store()?;
            return Ok(None);
        }

        let expiry_ms = self.inner.config.expiry.as_millis() as i64;
        if record.saved_at.saturating_add(expiry_ms) <= now_ms {
            info!("stored session expired, deleting");
            self.inner.persistence.remove(AUTH_STATE_KEY).to_store()?;
            return Ok(None);
        }

        Ok(Some(record))
    }

    /// Remove the stored session and discard any pending save.
    pub fn clear(&self) -> StoreResult<()> {
        let waiters = {
            let mut pending = self.inner.pending.lock().unwrap();
            pending.record = None;
            std::mem::take(&mut pending.waiters)
        };
        // Superseded saves resolve Ok: their data was intentionally discarded.
        for waiter in waiters {
            let _ = waiter.send(Ok(()));
        }

        self.inner.persistence.remove(AUTH_STATE_KEY).to_store()?;
        debug!("stored session cleared");
        Ok(())
    }
}

async fn flush_loop(inner: Arc<Inner>) {
    loop {
        tokio::time::sleep(inner.config.debounce).await;

        let (record, waiters) = {
            let mut pending = inner.pending.lock().unwrap();
            (pending.record.take(), std::mem::take(&mut pending.waiters))
        };

        if let Some(record) = record {
            let result = write_record(&inner, &record);
            if let Err(e) = &result {
                warn!(error = %e, "session flush failed");
            } else {
                debug!("session flushed to durable storage");
            }
            for waiter in waiters {
                let _ = waiter.send(result.clone());
            }
        }

        let mut pending = inner.pending.lock().unwrap();
        if pending.record.is_none() {
            pending.flusher_active = false;
            return;
        }
        // A save landed while we were writing; run another window.
    }
}

fn write_record(inner: &Inner, record: &StoredSession) -> StoreResult<()> {
    let json =
        serde_json::to_string(record).map_err(|e| StoreError::Serialization(e.to_string()))?;
    inner.persistence.set(AUTH_STATE_KEY, &json).to_store()
}

trait ToStoreResult<T> {
    fn to_store(self) -> StoreResult<T>;
}

impl<T> ToStoreResult<T> for PersistResult<T> {
    fn to_store(self) -> StoreResult<T> {
        self.map_err(|e| StoreError::Persistence(e.to_string()))
    }
}
