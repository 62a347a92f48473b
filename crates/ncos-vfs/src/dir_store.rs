//! On-disk backing store.
//!
//! Layout under the store root:
//!
//! ```text
//! <root>/
//!   nodes/<id>.json   one JSON record per node
//!   blobs/<id>        raw file bytes
//! ```
//!
//! Ids are validated before they are turned into paths.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use crate::error::{StorageErrorKind, VfsError};
use crate::store::{ContentStore, MetadataStore};
use crate::types::{validate_id, Node};

const NODES_DIR: &str = "nodes";
const BLOBS_DIR: &str = "blobs";

/// Directory-backed metadata and content store.
#[derive(Clone, Debug)]
pub struct DirStore {
    root: PathBuf,
}

impl DirStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, VfsError> {
        let store = Self { root: root.into() };
        fs::create_dir_all(store.nodes_dir()).await?;
        fs::create_dir_all(store.blobs_dir()).await?;
        log::debug!(target: "vfs", "opened dir store at {}", store.root.display());
        Ok(store)
    }

    /// Store root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn nodes_dir(&self) -> PathBuf {
        self.root.join(NODES_DIR)
    }

    fn blobs_dir(&self) -> PathBuf {
        self.root.join(BLOBS_DIR)
    }

    fn node_path(&self, id: &str) -> Result<PathBuf, VfsError> {
        validate_id(id)?;
        Ok(self.nodes_dir().join(format!("{}.json", id)))
    }

    fn blob_path(&self, id: &str) -> Result<PathBuf, VfsError> {
        validate_id(id)?;
        Ok(self.blobs_dir().join(id))
    }
}

async fn remove_if_exists(path: &Path) -> Result<(), VfsError> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

async fn clear_dir(dir: &Path) -> Result<(), VfsError> {
    match fs::remove_dir_all(dir).await {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    fs::create_dir_all(dir).await?;
    Ok(())
}

#[async_trait(?Send)]
impl MetadataStore for DirStore {
    async fn load_all(&self) -> Result<Vec<Node>, VfsError> {
        let mut nodes = Vec::new();
        let mut entries = fs::read_dir(self.nodes_dir()).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let bytes = fs::read(&path).await?;
            match serde_json::from_slice::<Node>(&bytes) {
                Ok(node) => nodes.push(node),
                Err(e) => {
                    log::warn!(target: "vfs", "skipping unreadable record {}: {}", path.display(), e);
                }
            }
        }
        nodes.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(nodes)
    }

    async fn put(&self, node: &Node) -> Result<(), VfsError> {
        let path = self.node_path(&node.id)?;
        let json = serde_json::to_vec(node)?;
        fs::write(path, json).await?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), VfsError> {
        let path = self.node_path(id)?;
        remove_if_exists(&path).await
    }

    async fn clear(&self) -> Result<(), VfsError> {
        clear_dir(&self.nodes_dir()).await
    }
}

#[async_trait(?Send)]
impl ContentStore for DirStore {
    async fn read(&self, id: &str) -> Result<Vec<u8>, VfsError> {
        let path = self.blob_path(id)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(VfsError::storage_with_context(
                StorageErrorKind::KeyNotFound,
                id,
            )),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, id: &str, content: &[u8]) -> Result<(), VfsError> {
        let path = self.blob_path(id)?;
        fs::write(path, content).await?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), VfsError> {
        let path = self.blob_path(id)?;
        remove_if_exists(&path).await
    }

    async fn clear(&self) -> Result<(), VfsError> {
        clear_dir(&self.blobs_dir()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ROOT_ID;

    #[tokio::test]
    async fn test_open_creates_layout() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirStore::open(dir.path().join("state")).await.unwrap();

        assert!(store.root().join("nodes").is_dir());
        assert!(store.root().join("blobs").is_dir());
    }

    #[tokio::test]
    async fn test_node_records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = DirStore::open(dir.path()).await.unwrap();
            MetadataStore::put(&store, &Node::root(1000)).await.unwrap();
            let file = Node::file("f1".into(), ROOT_ID.into(), "a.txt".into(), 3, 1000);
            MetadataStore::put(&store, &file).await.unwrap();
        }

        let store = DirStore::open(dir.path()).await.unwrap();
        let nodes = store.load_all().await.unwrap();
        let ids: Vec<_> = nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["f1", "root"]);
    }

    #[tokio::test]
    async fn test_blob_roundtrip_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirStore::open(dir.path()).await.unwrap();

        store.write("f1", b"hello").await.unwrap();
        assert_eq!(store.read("f1").await.unwrap(), b"hello");

        ContentStore::delete(&store, "f1").await.unwrap();
        assert!(store.read("f1").await.unwrap_err().is_not_found());

        // Deleting again is fine
        ContentStore::delete(&store, "f1").await.unwrap();
    }

    #[tokio::test]
    async fn test_rejects_path_like_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirStore::open(dir.path()).await.unwrap();

        let err = store.write("../escape", b"x").await.unwrap_err();
        assert!(matches!(err, VfsError::InvalidId(_)));
    }

    #[tokio::test]
    async fn test_corrupt_record_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirStore::open(dir.path()).await.unwrap();
        MetadataStore::put(&store, &Node::root(1)).await.unwrap();
        std::fs::write(dir.path().join("nodes").join("bad.json"), b"{not json").unwrap();

        let nodes = store.load_all().await.unwrap();
        assert_eq!(nodes.len(), 1);
    }

    #[tokio::test]
    async fn test_clear_empties_both_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirStore::open(dir.path()).await.unwrap();
        MetadataStore::put(&store, &Node::root(1)).await.unwrap();
        store.write("root", b"x").await.unwrap();

        MetadataStore::clear(&store).await.unwrap();
        ContentStore::clear(&store).await.unwrap();

        assert!(store.load_all().await.unwrap().is_empty());
        assert!(store.read("root").await.is_err());
    }
}
