use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::services::atomic_file::atomic_write;

pub type Attributes = serde_json::Map<String, Value>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("invalid record key '{0}'")]
    InvalidKey(String),
    #[error("no record stored under '{0}'")]
    NotFound(String),
    #[error("attribute '{0}' is not set")]
    UnsetAttribute(String),
    #[error("attribute '{name}' has an unexpected shape: {source}")]
    InvalidAttribute {
        name: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Live,
    /// The backing file was removed; writes are dropped.
    Deleted,
}

#[derive(Debug)]
struct RecordState {
    attrs: Attributes,
    lifecycle: Lifecycle,
}

/// In-memory view of one stored document.
#[derive(Debug)]
pub struct Record {
    key: String,
    path: PathBuf,
    state: Mutex<RecordState>,
}

impl Record {
    /// Load from `path`; a missing or unparsable file yields an empty record.
    fn load(key: &str, path: PathBuf) -> Self {
        let attrs = fs::read_to_string(&path)
            .ok()
            .and_then(|text| match serde_json::from_str::<Attributes>(&text) {
                Ok(attrs) => Some(attrs),
                Err(e) => {
                    debug!("Record {key}: ignoring unparsable file: {e}");
                    None
                }
            })
            .unwrap_or_default();

        Self {
            key: key.to_string(),
            path,
            state: Mutex::new(RecordState {
                attrs,
                lifecycle: Lifecycle::Live,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RecordState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lock().lifecycle
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lock().attrs.contains_key(name)
    }

    /// Raw value of an attribute.
    pub fn get(&self, name: &str) -> Result<Value, StoreError> {
        self.lock()
            .attrs
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::UnsetAttribute(name.to_string()))
    }

    /// Attribute decoded into `T`.
    pub fn get_as<T: DeserializeOwned>(&self, name: &str) -> Result<T, StoreError> {
        serde_json::from_value(self.get(name)?).map_err(|source| StoreError::InvalidAttribute {
            name: name.to_string(),
            source,
        })
    }

    /// Set one attribute and persist the whole document.
    pub fn set<T: Serialize>(&self, name: &str, value: T) -> Result<(), StoreError> {
        let value = serde_json::to_value(value).map_err(|source| StoreError::InvalidAttribute {
            name: name.to_string(),
            source,
        })?;
        let mut state = self.lock();
        if state.lifecycle == Lifecycle::Deleted {
            return Ok(());
        }
        state.attrs.insert(name.to_string(), value);
        self.persist(&state.attrs)
    }

    pub fn attributes(&self) -> Attributes {
        self.lock().attrs.clone()
    }

    /// Replace the attribute set wholesale and persist it.
    pub fn replace(&self, attrs: Attributes) -> Result<(), StoreError> {
        let mut state = self.lock();
        if state.lifecycle == Lifecycle::Deleted {
            return Ok(());
        }
        state.attrs = attrs;
        self.persist(&state.attrs)
    }

    fn mark_deleted(&self) {
        self.lock().lifecycle = Lifecycle::Deleted;
    }

    // Called with the state lock held, so writers to one record never interleave.
    fn persist(&self, attrs: &Attributes) -> Result<(), StoreError> {
        let body = serde_json::to_vec(attrs).map_err(|source| StoreError::InvalidAttribute {
            name: self.key.clone(),
            source,
        })?;
        atomic_write(&self.path, &body)?;
        Ok(())
    }
}

// Dot-prefixed names are reserved for temp files.
fn valid_key(key: &str) -> bool {
    !key.is_empty() && !key.starts_with('.') && !key.contains(['/', '\\'])
}

struct StoreInner {
    root: PathBuf,
    live: Mutex<HashMap<String, Weak<Record>>>,
}

/// Keyed collection of records, one JSON file per key under one directory.
///
/// Records are held weakly: a record stays shared while anyone holds it and is
/// reloaded from disk once the last handle is dropped.
#[derive(Clone)]
pub struct RecordStore {
    inner: Arc<StoreInner>,
}

impl RecordStore {
    /// Open (and create if needed) the store directory.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self {
            inner: Arc::new(StoreInner {
                root,
                live: Mutex::new(HashMap::new()),
            }),
        })
    }

    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        if !valid_key(key) {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.inner.root.join(key))
    }

    fn live(&self) -> MutexGuard<'_, HashMap<String, Weak<Record>>> {
        self.inner.live.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The live record for `key`, or a fresh one loaded from disk.
    pub fn get(&self, key: &str) -> Result<Arc<Record>, StoreError> {
        let path = self.path_for(key)?;
        let mut live = self.live();
        if let Some(record) = live.get(key).and_then(Weak::upgrade) {
            return Ok(record);
        }
        live.retain(|_, weak| weak.strong_count() > 0);
        let record = Arc::new(Record::load(key, path));
        live.insert(key.to_string(), Arc::downgrade(&record));
        Ok(record)
    }

    /// Replace the stored attributes of `key` with those of `record`.
    pub fn set(&self, key: &str, record: &Record) -> Result<(), StoreError> {
        let target = self.get(key)?;
        target.replace(record.attributes())
    }

    /// Remove the backing file; a live handle becomes write-dead.
    pub fn delete(&self, key: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        // Hold the map lock until the file is gone so no `get` reloads it meanwhile.
        let mut live = self.live();
        if let Some(record) = live.remove(key).and_then(|w| w.upgrade()) {
            record.mark_deleted();
        }
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.path_for(key).map(|p| p.is_file()).unwrap_or(false)
    }

    /// Keys of all stored records, in directory order.
    pub fn iter_keys(&self) -> Result<impl Iterator<Item = String>, StoreError> {
        let entries = fs::read_dir(&self.inner.root)?;
        Ok(entries.filter_map(|entry| {
            let entry = entry.ok()?;
            if !entry.file_type().ok()?.is_file() {
                return None;
            }
            let name = entry.file_name().into_string().ok()?;
            valid_key(&name).then_some(name)
        }))
    }

    /// Sorted keys of all stored records.
    pub fn keys(&self) -> Result<Vec<String>, StoreError> {
        let mut keys: Vec<String> = self.iter_keys()?.collect();
        keys.sort();
        Ok(keys)
    }
}
