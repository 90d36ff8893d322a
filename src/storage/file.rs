//! JSON file backed store used by the command-line client.
//!
//! The whole map is rewritten to a sibling temp file and renamed into place, so
//! a batch either lands completely or not at all. An unreadable file is
//! reported as `Error::Storage`; the token manager decides how to fail closed.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use tracing::debug;

use super::{KeyValueStore, StorageWrite};
use crate::error::{Error, Result};

#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> Result<BTreeMap<String, String>> {
        match fs::read_to_string(&self.path) {
            Ok(contents) if contents.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(contents) => serde_json::from_str(&contents).map_err(|err| {
                Error::Storage(format!("invalid state file {}: {err}", self.path.display()))
            }),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(err) => Err(Error::Storage(format!(
                "failed to read {}: {err}",
                self.path.display()
            ))),
        }
    }

    fn write_map(&self, map: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|err| {
                Error::Storage(format!("failed to create {}: {err}", parent.display()))
            })?;
        }

        let payload = serde_json::to_string_pretty(map)
            .map_err(|err| Error::Storage(format!("failed to encode state: {err}")))?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, payload)
            .map_err(|err| Error::Storage(format!("failed to write {}: {err}", tmp.display())))?;
        fs::rename(&tmp, &self.path).map_err(|err| {
            Error::Storage(format!("failed to replace {}: {err}", self.path.display()))
        })?;

        debug!(path = %self.path.display(), keys = map.len(), "state file written");
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self.read_map()?.get(key).cloned())
    }

    fn write_batch(&self, batch: &[StorageWrite]) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        // A damaged file is replaced rather than blocking a clear.
        let mut map = self.read_map().unwrap_or_default();
        for write in batch {
            match write {
                StorageWrite::Put { key, value } => {
                    map.insert(key.clone(), value.clone());
                }
                StorageWrite::Delete { key } => {
                    map.remove(key);
                }
            }
        }
        self.write_map(&map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn missing_file_reads_as_empty() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let store = FileStore::new(dir.path().join("session.json"));
        assert_eq!(store.get("anything")?, None);
        Ok(())
    }

    #[test]
    fn batches_persist_across_instances() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("nested").join("session.json");

        FileStore::new(&path).write_batch(&[
            StorageWrite::put("token", "abc"),
            StorageWrite::put("user", "{}"),
        ])?;

        let reopened = FileStore::new(&path);
        assert_eq!(reopened.get("token")?, Some("abc".to_string()));

        reopened.write_batch(&[StorageWrite::delete("token"), StorageWrite::delete("user")])?;
        assert_eq!(FileStore::new(&path).get("user")?, None);
        Ok(())
    }

    #[test]
    fn damaged_file_is_reported_and_overwritten_by_writes() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("session.json");
        fs::write(&path, "{not json")?;

        let store = FileStore::new(&path);
        assert!(store.get("token").is_err());

        store.write_batch(&[StorageWrite::delete("token")])?;
        assert_eq!(store.get("token")?, None);
        Ok(())
    }
}
