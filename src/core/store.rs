//! Key-value document storage.
//!
//! Backends only move bytes; [`JsonStore`] layers the typed `get_json` /
//! `set_json` calls on top of any of them. No backend offers transactions,
//! so callers that touch two documents must handle a failed second write.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

/// Read-modify-write callback for [`KvStore::update`]: receives the current
/// value and returns the new one, `None` deleting the key.
pub type Change<'a> = &'a mut dyn FnMut(Option<Vec<u8>>) -> anyhow::Result<Option<Vec<u8>>>;

pub trait KvStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>>;
    fn set(&self, key: &str, value: &[u8]) -> anyhow::Result<()>;
    fn delete(&self, key: &str) -> anyhow::Result<()>;

    /// Applies `change` to one key. Backends that can hold a lock across the
    /// read and the write override this so concurrent updates of the same
    /// key never lose each other; the default is a plain get then set.
    fn update(&self, key: &str, change: Change<'_>) -> anyhow::Result<()> {
        match change(self.get(key)?)? {
            Some(value) => self.set(key, &value),
            None => self.delete(key),
        }
    }
}

pub trait JsonStore {
    fn get_json<T: DeserializeOwned>(&self, key: &str) -> anyhow::Result<Option<T>>;
    fn set_json<T: Serialize>(&self, key: &str, value: &T) -> anyhow::Result<()>;

    /// Typed [`KvStore::update`]. `change` sees the decoded document and
    /// returns the document to store (or `None` to delete) plus a result
    /// handed back to the caller.
    fn update_json<T, R>(&self, key: &str, change: impl FnOnce(Option<T>) -> (Option<T>, R)) -> anyhow::Result<R>
    where
        T: Serialize + DeserializeOwned;
}

impl<S: KvStore + ?Sized> JsonStore for S {
    fn get_json<T: DeserializeOwned>(&self, key: &str) -> anyhow::Result<Option<T>> {
        match self.get(key)? {
            Some(bytes) => {
                let value = serde_json::from_slice(&bytes)
                    .with_context(|| format!("corrupt document at {key}"))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    fn set_json<T: Serialize>(&self, key: &str, value: &T) -> anyhow::Result<()> {
        self.set(key, &serde_json::to_vec(value)?)
    }

    fn update_json<T, R>(&self, key: &str, change: impl FnOnce(Option<T>) -> (Option<T>, R)) -> anyhow::Result<R>
    where
        T: Serialize + DeserializeOwned,
    {
        let mut change = Some(change);
        let mut outcome = None;

        self.update(key, &mut |current| {
            let change = change
                .take()
                .ok_or_else(|| anyhow::anyhow!("update of {key} ran twice"))?;
            let current: Option<T> = match current {
                Some(bytes) => Some(
                    serde_json::from_slice(&bytes).with_context(|| format!("corrupt document at {key}"))?,
                ),
                None => None,
            };
            let (next, result) = change(current);
            outcome = Some(result);
            Ok(match next {
                Some(value) => Some(serde_json::to_vec(&value)?),
                None => None,
            })
        })?;

        outcome.ok_or_else(|| anyhow::anyhow!("update of {key} did not run"))
    }
}

/// Process-local store. Clones share the same map.
#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> anyhow::Result<()> {
        self.entries.write().insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> anyhow::Result<()> {
        self.entries.write().remove(key);
        Ok(())
    }

    fn update(&self, key: &str, change: Change<'_>) -> anyhow::Result<()> {
        let mut entries = self.entries.write();
        match change(entries.get(key).cloned())? {
            Some(value) => {
                entries.insert(key.to_string(), value);
            }
            None => {
                entries.remove(key);
            }
        }
        Ok(())
    }
}

/// One file per document under a root directory. Writes go through a
/// uniquely named temp file and a rename, so readers never see half a
/// document. [`KvStore::update`] is serialised across clones of one store,
/// not across processes sharing the directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
    update_lock: Arc<Mutex<()>>,
}

impl FileStore {
    pub fn open(root: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .with_context(|| format!("failed to create data dir {}", root.display()))?;
        Ok(Self {
            root,
            update_lock: Arc::new(Mutex::new(())),
        })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.json", urlencoding::encode(key)))
    }
}

impl KvStore for FileStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        match fs::read(self.path_for(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err).with_context(|| format!("failed to read {key}")),
        }
    }

    fn set(&self, key: &str, value: &[u8]) -> anyhow::Result<()> {
        let path = self.path_for(key);
        let tmp = self
            .root
            .join(format!("{}.{}.tmp", urlencoding::encode(key), Uuid::new_v4()));
        fs::write(&tmp, value).with_context(|| format!("failed to write {key}"))?;
        fs::rename(&tmp, &path).with_context(|| format!("failed to commit {key}"))?;
        Ok(())
    }

    fn delete(&self, key: &str) -> anyhow::Result<()> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err).with_context(|| format!("failed to delete {key}")),
        }
    }

    fn update(&self, key: &str, change: Change<'_>) -> anyhow::Result<()> {
        let _guard = self.update_lock.lock();
        match change(self.get(key)?)? {
            Some(value) => self.set(key, &value),
            None => self.delete(key),
        }
    }
}

/// The Spin runtime's default key-value store. It has no compare-and-swap,
/// so `update` keeps the default get-then-set.
#[cfg(target_arch = "wasm32")]
pub struct SpinStore(spin_sdk::key_value::Store);

#[cfg(target_arch = "wasm32")]
impl SpinStore {
    pub fn open_default() -> anyhow::Result<Self> {
        Ok(Self(spin_sdk::key_value::Store::open_default()?))
    }
}

#[cfg(target_arch = "wasm32")]
impl KvStore for SpinStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        Ok(self.0.get(key)?)
    }

    fn set(&self, key: &str, value: &[u8]) -> anyhow::Result<()> {
        Ok(self.0.set(key, value)?)
    }

    fn delete(&self, key: &str) -> anyhow::Result<()> {
        Ok(self.0.delete(key)?)
    }
}
