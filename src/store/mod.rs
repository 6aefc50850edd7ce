//! Key-Value Store Adapter
//!
//! Persists JSON values under string keys, one file per key inside a data
//! directory. Mirrors the semantics of a browser-origin local store:
//! - writes that would exceed the configured byte budget fail with
//!   `QuotaExceeded` and are dropped, not retried;
//! - a value that no longer parses (crash or partial write) is deleted and
//!   read back as absent, favoring availability over strict surfacing;
//! - a store that cannot be opened at startup is `Unavailable`, which is
//!   fatal to every persistence feature and surfaced once.
//!
//! Handles are cheap clones sharing one broadcast channel of [`StoreEvent`]s
//! so interested parties can observe key changes made through other handles
//! (the typed interpretation lives in [`keys::session_event`]).

pub mod keys;

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::errors::StorageError;

/// Probe key written and removed at startup to verify the store works.
const AVAILABILITY_PROBE_KEY: &str = "quizforge_storage_test";

/// Raw change notification for a single key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    Set { key: String },
    Removed { key: String },
}

/// A handle to the persistent key-value store.
#[derive(Debug, Clone)]
pub struct Store {
    root: PathBuf,
    quota_bytes: Option<u64>,
    events: broadcast::Sender<StoreEvent>,
}

impl Store {
    /// Open (creating if needed) the store rooted at `root`.
    ///
    /// Verifies availability with a probe write; failure here means no
    /// persistence feature can work and is reported as `Unavailable`.
    pub fn open(root: impl Into<PathBuf>, quota_bytes: Option<u64>) -> Result<Self, StorageError> {
        let root = root.into();
        fs::create_dir_all(&root)
            .map_err(|e| StorageError::Unavailable(format!("cannot create {:?}: {}", root, e)))?;

        let (events, _) = broadcast::channel(64);
        let store = Self {
            root,
            quota_bytes,
            events,
        };
        store.check_availability()?;
        Ok(store)
    }

    fn check_availability(&self) -> Result<(), StorageError> {
        let probe = self.key_path(AVAILABILITY_PROBE_KEY);
        fs::write(&probe, b"\"probe\"")
            .and_then(|_| fs::remove_file(&probe))
            .map_err(|e| StorageError::Unavailable(format!("probe write failed: {}", e)))
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.json", key))
    }

    /// Serialize `value` and write it under `key`.
    ///
    /// Fails with `QuotaExceeded` when the write would push total usage past
    /// the configured budget; the attempted write is simply dropped.
    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let serialized =
            serde_json::to_vec(value).map_err(|e| StorageError::Serialization {
                key: key.to_string(),
                message: e.to_string(),
            })?;

        if let Some(limit) = self.quota_bytes {
            let existing = fs::metadata(self.key_path(key)).map(|m| m.len()).unwrap_or(0);
            let used = self.total_bytes()? - existing + serialized.len() as u64;
            if used > limit {
                return Err(StorageError::QuotaExceeded { used, limit });
            }
        }

        fs::write(self.key_path(key), serialized)?;
        let _ = self.events.send(StoreEvent::Set {
            key: key.to_string(),
        });
        Ok(())
    }

    /// Read and deserialize the value under `key`.
    ///
    /// An unset key is `Ok(None)`, not an error. A value that fails to
    /// parse is deleted and also reported as `Ok(None)`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        let path = self.key_path(key);
        let raw = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_slice(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!(key, error = %e, "discarding corrupt stored value");
                let _ = fs::remove_file(&path);
                Ok(None)
            }
        }
    }

    /// Remove the value under `key`. Removing an unset key succeeds.
    pub fn remove(&self, key: &str) -> Result<(), StorageError> {
        let path = self.key_path(key);
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(key, "removed stored value");
                let _ = self.events.send(StoreEvent::Removed {
                    key: key.to_string(),
                });
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Whether any value is stored under `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.key_path(key).exists()
    }

    /// Total bytes currently stored across all keys.
    pub fn total_bytes(&self) -> Result<u64, StorageError> {
        let mut total = 0;
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.path().extension().and_then(|s| s.to_str()) == Some("json") {
                total += entry.metadata()?.len();
            }
        }
        Ok(total)
    }

    /// All keys currently stored with the application prefix.
    pub fn keys(&self) -> Result<Vec<String>, StorageError> {
        let mut found = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if stem.starts_with(keys::APP_PREFIX) {
                    found.push(stem.to_string());
                }
            }
        }
        found.sort();
        Ok(found)
    }

    /// Subscribe to raw key-change notifications from this store.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    /// The directory backing this store.
    pub fn root(&self) -> &Path {
        &self.root
    }
}
