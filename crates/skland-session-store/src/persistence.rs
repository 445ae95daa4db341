//! Durable key-value persistence trait and implementations.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use thiserror::Error;

/// Error type for persistence backends.
#[derive(Error, Debug)]
pub enum PersistError {
    /// Backend-specific failure (I/O, serialization of the backing file).
    #[error("Persistence error: {0}")]
    Backend(String),
}

/// Result type for persistence operations.
pub type PersistResult<T> = Result<T, PersistError>;

/// Trait for durable key-value storage backends.
pub trait Persistence: Send + Sync {
    /// Store a value.
    fn set(&self, key: &str, value: &str) -> PersistResult<()>;

    /// Retrieve a value.
    fn get(&self, key: &str) -> PersistResult<Option<String>>;

    /// Delete a value. Returns true if the key existed.
    fn remove(&self, key: &str) -> PersistResult<bool>;
}

/// In-memory persistence. Used in tests and as a fallback backend.
pub struct MemoryPersistence {
    data: Mutex<HashMap<String, String>>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self {
            data: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemoryPersistence {
    fn default() -> Self {
        Self::new()
    }
}

impl Persistence for MemoryPersistence {
    fn set(&self, key: &str, value: &str) -> PersistResult<()> {
        let mut data = self.data.lock().unwrap();
        data.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn get(&self, key: &str) -> PersistResult<Option<String>> {
        let data = self.data.lock().unwrap();
        Ok(data.get(key).cloned())
    }

    fn remove(&self, key: &str) -> PersistResult<bool> {
        let mut data = self.data.lock().unwrap();
        Ok(data.remove(key).is_some())
    }
}

/// File-backed persistence: a single JSON object mapping keys to values.
pub struct FilePersistence {
    path: PathBuf,
    // Serializes read-modify-write cycles on the backing file.
    lock: Mutex<()>,
}

impl FilePersistence {
    /// Create a file-backed store at the given path. Parent directories are
    /// created on first write.
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    fn read_map(&self) -> PersistResult<HashMap<String, String>> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        let content = std::fs::read_to_string(&self.path)
            .map_err(|e| PersistError::Backend(e.to_string()))?;
        serde_json::from_str(&content).map_err(|e| PersistError::Backend(e.to_string()))
    }

    fn write_map(&self, map: &HashMap<String, String>) -> PersistResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| PersistError::Backend(e.to_string()))?;
        }
        let content =
            serde_json::to_string_pretty(map).map_err(|e| PersistError::Backend(e.to_string()))?;
        std::fs::write(&self.path, content).map_err(|e| PersistError::Backend(e.to_string()))
    }
}

impl Persistence for FilePersistence {
    fn set(&self, key: &str, value: &str) -> PersistResult<()> {
        let _guard = self.lock.lock().unwrap();
        let mut map = self.read_map()?;
        map.insert(key.to_string(), value.to_string());
        self.write_map(&map)
    }

    fn get(&self, key: &str) -> PersistResult<Option<String>> {
        let _guard = self.lock.lock().unwrap();
        Ok(self.read_map()?.get(key).cloned())
    }

    fn remove(&self, key: &str) -> PersistResult<bool> {
        let _guard = self.lock.lock().unwrap();
        let mut map = self.read_map()?;
        let existed = map.remove(key).is_some();
        if existed {
            self.write_map(&map)?;
        }
        Ok(existed)
    }
}
