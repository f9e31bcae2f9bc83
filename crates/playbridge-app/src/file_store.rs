// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Local key/value store persisted as one JSON object on disk.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use playbridge_bridge::host::LocalStore;
use playbridge_core::error::Result;
use tracing::{debug, warn};

/// Return the default store location, creating the parent directory.
///
/// Uses `$XDG_DATA_HOME`, then `~/.local/share`, then `/tmp`.
pub fn default_path() -> PathBuf {
    let base = std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .or_else(|_| std::env::var("HOME").map(|h| PathBuf::from(h).join(".local").join("share")))
        .unwrap_or_else(|_| PathBuf::from("/tmp"));
    let dir = base.join("playbridge");
    if let Err(e) = std::fs::create_dir_all(&dir) {
        warn!(error = %e, dir = %dir.display(), "could not create data directory");
    }
    dir.join("local-storage.json")
}

pub struct JsonFileStore {
    path: PathBuf,
    items: Mutex<BTreeMap<String, String>>,
}

impl JsonFileStore {
    /// Open the store at `path`. A missing file is an empty store.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let items = match std::fs::read_to_string(&path) {
            Ok(raw) if raw.trim().is_empty() => BTreeMap::new(),
            Ok(raw) => serde_json::from_str(&raw)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        debug!(path = %path.display(), keys = items.len(), "local store opened");
        Ok(Self {
            path,
            items: Mutex::new(items),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // Sibling temp file plus rename; readers never see a partial document.
    fn flush(&self, items: &BTreeMap<String, String>) -> Result<()> {
        let raw = serde_json::to_string_pretty(items)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, raw)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl LocalStore for JsonFileStore {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        let items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let mut items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        items.insert(key.to_string(), value.to_string());
        self.flush(&items)
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        let mut items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        if items.remove(key).is_some() {
            self.flush(&items)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use playbridge_core::error::BridgeError;

    use super::*;

    #[test]
    fn values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        let store = JsonFileStore::open(&path).unwrap();
        store.set_item("level", "7").unwrap();
        store.set_item("coins", "120").unwrap();
        store.remove_item("coins").unwrap();
        drop(store);

        let reopened = JsonFileStore::open(&path).unwrap();
        assert_eq!(reopened.get_item("level").unwrap().as_deref(), Some("7"));
        assert_eq!(reopened.get_item("coins").unwrap(), None);
    }

    #[test]
    fn missing_file_is_empty_and_not_created_on_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");
        let store = JsonFileStore::open(&path).unwrap();
        assert_eq!(store.get_item("anything").unwrap(), None);
        store.remove_item("anything").unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn corrupt_file_is_a_serialization_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            JsonFileStore::open(&path),
            Err(BridgeError::Serialization(_))
        ));
    }
}
