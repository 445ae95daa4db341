//! Durable session persistence for the Skland companion.
//!
//! This crate owns the one piece of state that survives process restarts: the
//! [`StoredSession`] record holding the long-lived platform token and minimal
//! account identity. Short-lived session credentials are deliberately never
//! persisted — they are cheap to rederive and stale copies are worse than
//! none.
//!
//! Writes go through [`SessionStore::save`], which coalesces bursts within a
//! debounce window so rapid state changes do not thrash durable storage; the
//! last write always wins and every caller in the window can await the flush.
//! Loads validate schema completeness and expiry, deleting anything invalid
//! rather than returning partially-valid state.

mod persistence;
mod record;
mod store;

pub use persistence::{FilePersistence, MemoryPersistence, PersistError, PersistResult, Persistence};
pub use record::{StoredSession, SESSION_FORMAT_VERSION};
pub use store::{SessionStore, SessionStoreConfig, StoreError, StoreResult, AUTH_STATE_KEY};
