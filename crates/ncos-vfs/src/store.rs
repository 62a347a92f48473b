//! Backing store traits.
//!
//! The VFS keeps two independent stores keyed by node id: one for node
//! metadata, one for file bytes. Both are asynchronous and single-threaded
//! (`?Send`), matching the cooperative event loop the kernel runs on.

use async_trait::async_trait;

use crate::error::VfsError;
use crate::types::Node;

/// Persistent node metadata.
#[async_trait(?Send)]
pub trait MetadataStore {
    /// Load every stored node.
    async fn load_all(&self) -> Result<Vec<Node>, VfsError>;

    /// Insert or replace a node record.
    async fn put(&self, node: &Node) -> Result<(), VfsError>;

    /// Remove a node record. Removing a missing id is not an error.
    async fn delete(&self, id: &str) -> Result<(), VfsError>;

    /// Remove every record.
    async fn clear(&self) -> Result<(), VfsError>;
}

/// Persistent file content.
#[async_trait(?Send)]
pub trait ContentStore {
    /// Read a blob.
    ///
    /// Returns a `KeyNotFound` storage error if nothing is stored under `id`.
    async fn read(&self, id: &str) -> Result<Vec<u8>, VfsError>;

    /// Write (or overwrite) a blob.
    async fn write(&self, id: &str, content: &[u8]) -> Result<(), VfsError>;

    /// Remove a blob. Removing a missing id is not an error.
    async fn delete(&self, id: &str) -> Result<(), VfsError>;

    /// Remove every blob.
    async fn clear(&self) -> Result<(), VfsError>;
}
