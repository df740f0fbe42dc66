//! Backing Storage Module
//!
//! Optional second tier behind the in-memory store. Entries are exchanged as
//! serialized bytes so a backend never needs to know the cached type.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::StorageError;

// == Storage Backend ==
/// A byte-oriented key-value tier the store writes through to.
pub trait StorageBackend: Send + Sync {
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    fn store(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError>;

    fn remove(&self, key: &str) -> Result<(), StorageError>;

    fn clear(&self) -> Result<(), StorageError>;
}

// == Memory Backend ==
/// Process-local backend with an optional byte quota.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    items: Mutex<HashMap<String, Vec<u8>>>,
    quota_bytes: Option<usize>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend that rejects writes pushing total size past `quota_bytes`.
    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            items: Mutex::new(HashMap::new()),
            quota_bytes: Some(quota_bytes),
        }
    }

    pub fn used_bytes(&self) -> usize {
        self.items
            .lock()
            .map(|items| items.values().map(Vec::len).sum())
            .unwrap_or(0)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.items
            .lock()
            .map(|items| items.contains_key(key))
            .unwrap_or(false)
    }

    /// Overwrites a key with raw bytes, bypassing the quota.
    pub fn put_raw(&self, key: &str, bytes: Vec<u8>) {
        if let Ok(mut items) = self.items.lock() {
            items.insert(key.to_string(), bytes);
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Vec<u8>>>, StorageError> {
        self.items
            .lock()
            .map_err(|_| StorageError::OperationFailed("memory backend lock poisoned".into()))
    }
}

impl StorageBackend for MemoryBackend {
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn store(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let mut items = self.lock()?;
        if let Some(quota) = self.quota_bytes {
            let others: usize = items
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(_, v)| v.len())
                .sum();
            if others + bytes.len() > quota {
                return Err(StorageError::QuotaExceeded(format!(
                    "{} bytes would exceed quota of {}",
                    others + bytes.len(),
                    quota
                )));
            }
        }
        items.insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.lock()?.remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.lock()?.clear();
        Ok(())
    }
}

// == Unavailable Backend ==
/// Backend that reports every operation as unavailable.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableBackend;

impl StorageBackend for UnavailableBackend {
    fn load(&self, _key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Err(StorageError::Unavailable("no backing storage".into()))
    }

    fn store(&self, _key: &str, _bytes: &[u8]) -> Result<(), StorageError> {
        Err(StorageError::Unavailable("no backing storage".into()))
    }

    fn remove(&self, _key: &str) -> Result<(), StorageError> {
        Err(StorageError::Unavailable("no backing storage".into()))
    }

    fn clear(&self) -> Result<(), StorageError> {
        Err(StorageError::Unavailable("no backing storage".into()))
    }
}
