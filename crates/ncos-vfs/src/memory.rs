//! In-memory backing store.
//!
//! Provides a BTreeMap-based store that doesn't persist data. Used by tests
//! and by sessions started without a state directory.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::error::{StorageErrorKind, VfsError};
use crate::store::{ContentStore, MetadataStore};
use crate::types::Node;

/// In-memory metadata and content store.
#[derive(Default)]
pub struct MemoryStore {
    /// Node storage (id -> node)
    nodes: RefCell<BTreeMap<String, Node>>,
    /// Content storage (id -> bytes)
    blobs: RefCell<BTreeMap<String, Vec<u8>>>,
    /// When set, every write fails with `Unavailable`
    fail_writes: Cell<bool>,
}

impl MemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail (for exercising degraded mode).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.set(fail);
    }

    /// Number of stored node records.
    pub fn node_count(&self) -> usize {
        self.nodes.borrow().len()
    }

    /// Whether a blob is stored under `id`.
    pub fn has_blob(&self, id: &str) -> bool {
        self.blobs.borrow().contains_key(id)
    }

    /// Drop a blob without going through the trait (simulates a partial write).
    pub fn corrupt_blob(&self, id: &str) {
        self.blobs.borrow_mut().remove(id);
    }

    fn check_writable(&self) -> Result<(), VfsError> {
        if self.fail_writes.get() {
            Err(VfsError::storage(StorageErrorKind::Unavailable))
        } else {
            Ok(())
        }
    }
}

#[async_trait(?Send)]
impl MetadataStore for MemoryStore {
    async fn load_all(&self) -> Result<Vec<Node>, VfsError> {
        Ok(self.nodes.borrow().values().cloned().collect())
    }

    async fn put(&self, node: &Node) -> Result<(), VfsError> {
        self.check_writable()?;
        self.nodes
            .borrow_mut()
            .insert(node.id.clone(), node.clone());
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), VfsError> {
        self.check_writable()?;
        self.nodes.borrow_mut().remove(id);
        Ok(())
    }

    async fn clear(&self) -> Result<(), VfsError> {
        self.nodes.borrow_mut().clear();
        Ok(())
    }
}

#[async_trait(?Send)]
impl ContentStore for MemoryStore {
    async fn read(&self, id: &str) -> Result<Vec<u8>, VfsError> {
        self.blobs
            .borrow()
            .get(id)
            .cloned()
            .ok_or_else(|| VfsError::storage_with_context(StorageErrorKind::KeyNotFound, id))
    }

    async fn write(&self, id: &str, content: &[u8]) -> Result<(), VfsError> {
        self.check_writable()?;
        self.blobs
            .borrow_mut()
            .insert(id.to_string(), content.to_vec());
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), VfsError> {
        self.check_writable()?;
        self.blobs.borrow_mut().remove(id);
        Ok(())
    }

    async fn clear(&self) -> Result<(), VfsError> {
        self.blobs.borrow_mut().clear();
        Ok(())
    }
}
