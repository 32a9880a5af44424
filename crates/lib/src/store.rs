//! Local key-value state (the browser-storage equivalent).
//!
//! `FileStore` keeps a flat JSON object on disk (e.g. `~/.ipeth/state.json`); `MemoryStore`
//! is the in-process variant for tests and ephemeral sessions.

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("state io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("state file {path} could not be encoded: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("state store lock poisoned")]
    Poisoned,
}

/// Minimal persistence boundary: string keys to string values.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn clear(&self, key: &str) -> Result<(), StoreError>;
}

/// JSON-file backed store. Each operation reads the file and writes it back whole.
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the state object. A file that is not a JSON object is treated as empty and
    /// replaced on the next write.
    fn read_map(&self) -> Result<Map<String, Value>, StoreError> {
        let s = match std::fs::read_to_string(&self.path) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source: e,
                })
            }
        };
        if s.trim().is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str::<Value>(&s) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => {
                log::warn!("state file {} is not a JSON object, ignoring it", self.path.display());
                Ok(Map::new())
            }
            Err(e) => {
                log::warn!("state file {} is invalid, ignoring it: {}", self.path.display(), e);
                Ok(Map::new())
            }
        }
    }

    /// Write the whole object to a sibling temp file, then rename it over the state file.
    fn write_map(&self, map: &Map<String, Value>) -> Result<(), StoreError> {
        let io_err = |e| StoreError::Io {
            path: self.path.clone(),
            source: e,
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let s = serde_json::to_string_pretty(map).map_err(|e| StoreError::Encode {
            path: self.path.clone(),
            source: e,
        })?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        std::fs::write(&tmp, s).map_err(io_err)?;
        std::fs::rename(&tmp, &self.path).map_err(io_err)
    }
}

impl KeyValueStore for FileStore {
    /// Entries that are not strings read as absent.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let _g = self.lock.lock().map_err(|_| StoreError::Poisoned)?;
        match self.read_map()?.remove(key) {
            Some(Value::String(v)) => Ok(Some(v)),
            Some(other) => {
                log::warn!("state entry {} is not a string: {}", key, other);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let _g = self.lock.lock().map_err(|_| StoreError::Poisoned)?;
        let mut map = self.read_map()?;
        map.insert(key.to_string(), Value::String(value.to_string()));
        self.write_map(&map)
    }

    fn clear(&self, key: &str) -> Result<(), StoreError> {
        let _g = self.lock.lock().map_err(|_| StoreError::Poisoned)?;
        let mut map = self.read_map()?;
        if map.remove(key).is_some() {
            self.write_map(&map)?;
        }
        Ok(())
    }
}

/// In-memory store; contents are lost when dropped.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let g = self.inner.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(g.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut g = self.inner.lock().map_err(|_| StoreError::Poisoned)?;
        g.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn clear(&self, key: &str) -> Result<(), StoreError> {
        let mut g = self.inner.lock().map_err(|_| StoreError::Poisoned)?;
        g.remove(key);
        Ok(())
    }
}
