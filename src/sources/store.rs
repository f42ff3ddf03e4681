//! Key-value persistence trait and the in-memory implementation.

use crate::error::Result;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Trait for the preference/storage collaborator that holds cached blobs.
///
/// Implementations must make `set_string` atomic with respect to
/// `get_string`: a reader sees either the previous value or the new one, never
/// a partial write.
pub trait PreferenceStore: Send + Sync {
    /// Read the value stored under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage cannot be read.
    fn get_string(&self, key: &str) -> Result<Option<String>>;

    /// Overwrite the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the value could not be durably written.
    fn set_string(&self, key: &str, value: &str) -> Result<()>;

    /// Remove the value stored under `key`. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<()>;

    /// Get a human-readable name for this store (for logging/debugging).
    fn name(&self) -> String;
}

/// Process-local store backed by a hash map.
///
/// Useful for tests and for SDKs that do not want anything on disk.
///
/// # Examples
///
/// ```rust
/// use server_config::sources::{MemoryStore, PreferenceStore};
///
/// let store = MemoryStore::new();
/// store.set_string("slot", "value").unwrap();
/// assert_eq!(store.get_string("slot").unwrap().as_deref(), Some("value"));
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with one entry.
    pub fn with_entry(key: impl Into<String>, value: impl Into<String>) -> Self {
        let store = Self::new();
        store.values.write().insert(key.into(), value.into());
        store
    }
}

impl PreferenceStore for MemoryStore {
    fn get_string(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.read().get(key).cloned())
    }

    fn set_string(&self, key: &str, value: &str) -> Result<()> {
        self.values.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.values.write().remove(key);
        Ok(())
    }

    fn name(&self) -> String {
        "memory".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_missing() {
        let store = MemoryStore::new();
        assert_eq!(store.get_string("missing").unwrap(), None);
    }

    #[test]
    fn test_overwrite_and_remove() {
        let store = MemoryStore::with_entry("slot", "old");
        store.set_string("slot", "new").unwrap();
        assert_eq!(store.get_string("slot").unwrap().as_deref(), Some("new"));

        store.remove("slot").unwrap();
        assert_eq!(store.get_string("slot").unwrap(), None);
        store.remove("slot").unwrap();
    }
}
