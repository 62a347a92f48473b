//! Snapshot backing stores.
//!
//! A snapshot is a single JSON document. The kernel writes it whole on
//! every save; there is no partial update.

use std::cell::{Cell, RefCell};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use crate::error::KernelError;
use crate::persistence::SystemSnapshot;

/// Where the system snapshot lives.
#[async_trait(?Send)]
pub trait SnapshotStore {
    /// Load the last saved snapshot, `None` if nothing was saved yet.
    async fn load(&self) -> Result<Option<SystemSnapshot>, KernelError>;

    /// Replace the stored snapshot.
    async fn save(&self, snapshot: &SystemSnapshot) -> Result<(), KernelError>;

    /// Forget the stored snapshot.
    async fn clear(&self) -> Result<(), KernelError>;
}

/// In-memory store, with failure injection for tests.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    json: RefCell<Option<String>>,
    fail_writes: Cell<bool>,
    saves: Cell<u64>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `save` fail with a storage error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.set(fail);
    }

    /// Number of successful saves
    pub fn saves(&self) -> u64 {
        self.saves.get()
    }

    /// Raw stored document
    pub fn raw(&self) -> Option<String> {
        self.json.borrow().clone()
    }

    /// Overwrite the stored document (corruption tests)
    pub fn set_raw(&self, json: impl Into<String>) {
        *self.json.borrow_mut() = Some(json.into());
    }
}

#[async_trait(?Send)]
impl SnapshotStore for MemorySnapshotStore {
    async fn load(&self) -> Result<Option<SystemSnapshot>, KernelError> {
        match self.json.borrow().as_deref() {
            Some(json) => Ok(Some(serde_json::from_str(json)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, snapshot: &SystemSnapshot) -> Result<(), KernelError> {
        if self.fail_writes.get() {
            return Err(KernelError::StorageFailure(
                "snapshot store unavailable".to_string(),
            ));
        }
        let json = serde_json::to_string(snapshot)?;
        *self.json.borrow_mut() = Some(json);
        self.saves.set(self.saves.get() + 1);
        Ok(())
    }

    async fn clear(&self) -> Result<(), KernelError> {
        *self.json.borrow_mut() = None;
        Ok(())
    }
}

/// Snapshot kept in a single JSON file.
///
/// Writes go to `<file>.tmp` first and are renamed over the target, so a
/// crash mid-write leaves the previous snapshot intact.
#[derive(Clone, Debug)]
pub struct FileSnapshotStore {
    path: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }
}

#[async_trait(?Send)]
impl SnapshotStore for FileSnapshotStore {
    async fn load(&self) -> Result<Option<SystemSnapshot>, KernelError> {
        let text = match fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&text)?))
    }

    async fn save(&self, snapshot: &SystemSnapshot) -> Result<(), KernelError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_vec_pretty(snapshot)?;
        let tmp = self.temp_path();
        fs::write(&tmp, json).await?;
        fs::rename(&tmp, &self.path).await?;
        log::debug!(target: "kernel", "snapshot written to {}", self.path.display());
        Ok(())
    }

    async fn clear(&self) -> Result<(), KernelError> {
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
