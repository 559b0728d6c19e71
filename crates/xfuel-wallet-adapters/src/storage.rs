use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::warn;

use xfuel_wallet_core::{PortError, StoragePort};

#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    entries: Arc<Mutex<BTreeMap<String, String>>>,
}

impl MemoryStorage {
    fn entries(&self) -> Result<MutexGuard<'_, BTreeMap<String, String>>, PortError> {
        self.entries
            .lock()
            .map_err(|e| PortError::Transport(format!("storage lock poisoned: {e}")))
    }

    pub fn len(&self) -> Result<usize, PortError> {
        Ok(self.entries()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, PortError> {
        Ok(self.entries()?.is_empty())
    }
}

#[async_trait(?Send)]
impl StoragePort for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, PortError> {
        Ok(self.entries()?.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), PortError> {
        self.entries()?.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), PortError> {
        self.entries()?.remove(key);
        Ok(())
    }
}

/// Key-value storage persisted as one flat JSON object, rewritten on every change.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
    entries: Arc<Mutex<BTreeMap<String, String>>>,
}

impl FileStorage {
    /// Opens `path`, starting empty when the file is missing. A corrupt file is
    /// treated as empty and replaced on the next write.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, PortError> {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "corrupt storage file, starting empty");
                BTreeMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                return Err(PortError::Transport(format!(
                    "read {} failed: {e}",
                    path.display()
                )))
            }
        };
        Ok(Self {
            path,
            entries: Arc::new(Mutex::new(entries)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn entries(&self) -> Result<MutexGuard<'_, BTreeMap<String, String>>, PortError> {
        self.entries
            .lock()
            .map_err(|e| PortError::Transport(format!("storage lock poisoned: {e}")))
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> Result<(), PortError> {
        let raw = serde_json::to_vec_pretty(entries)
            .map_err(|e| PortError::Validation(format!("storage encode failed: {e}")))?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                PortError::Transport(format!("create {} failed: {e}", parent.display()))
            })?;
        }
        // Readers only ever see the old file or the complete new one.
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, raw)
            .map_err(|e| PortError::Transport(format!("write {} failed: {e}", tmp.display())))?;
        fs::rename(&tmp, &self.path).map_err(|e| {
            PortError::Transport(format!("rename to {} failed: {e}", self.path.display()))
        })
    }
}

#[async_trait(?Send)]
impl StoragePort for FileStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, PortError> {
        Ok(self.entries()?.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), PortError> {
        let mut g = self.entries()?;
        let previous = g.insert(key.to_owned(), value.to_owned());
        if let Err(e) = self.persist(&g) {
            match previous {
                Some(old) => g.insert(key.to_owned(), old),
                None => g.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), PortError> {
        let mut g = self.entries()?;
        if g.remove(key).is_none() {
            return Ok(());
        }
        self.persist(&g)
    }
}
