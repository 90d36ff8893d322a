use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use super::{KeyValueStore, StorageWrite};
use crate::error::Result;

/// In-process store; counts batches so tests can assert on write traffic.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
    batches: AtomicUsize,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a value without counting it as a write.
    pub fn seed(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
    }

    #[must_use]
    pub fn batches_written(&self) -> usize {
        self.batches.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned())
    }

    fn write_batch(&self, batch: &[StorageWrite]) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        for write in batch {
            match write {
                StorageWrite::Put { key, value } => {
                    entries.insert(key.clone(), value.clone());
                }
                StorageWrite::Delete { key } => {
                    entries.remove(key);
                }
            }
        }
        self.batches.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_batch_applies_puts_and_deletes() -> Result<()> {
        let store = MemoryStore::new();
        store.seed("stale", "1");
        store.write_batch(&[
            StorageWrite::put("a", "x"),
            StorageWrite::put("b", "y"),
            StorageWrite::delete("stale"),
        ])?;

        assert_eq!(store.get("a")?, Some("x".to_string()));
        assert_eq!(store.get("b")?, Some("y".to_string()));
        assert_eq!(store.get("stale")?, None);
        assert_eq!(store.batches_written(), 1);
        Ok(())
    }
}
