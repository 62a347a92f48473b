//! Core types for the VFS layer.
//!
//! Defines the node tree entries and name/id validation.

use serde::{Deserialize, Serialize};

use crate::error::VfsError;

/// Node identifier (primary key in both stores).
pub type NodeId = String;

/// Id of the single root folder.
pub const ROOT_ID: &str = "root";

/// Kind of node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    File,
    Folder,
    Mount,
}

/// Opaque reference to external storage behind a mount.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalHandle {
    /// Display name of the external location
    pub name: String,
    /// Host-side location the handle resolves to
    pub location: String,
}

impl ExternalHandle {
    pub fn new(name: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            location: location.into(),
        }
    }
}

/// An entry in the metadata tree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Unique id
    pub id: NodeId,

    /// Parent folder id (None only for root)
    pub parent_id: Option<NodeId>,

    /// Display name (not unique among siblings)
    pub name: String,

    /// Type of node
    pub kind: NodeKind,

    /// Content type (files only)
    #[serde(default)]
    pub mime: Option<String>,

    /// Content size in bytes (0 for folders and mounts)
    #[serde(default)]
    pub size: u64,

    /// Creation timestamp (ms since epoch)
    pub created: i64,

    /// Last modification timestamp
    pub modified: i64,

    /// External reference (mounts only)
    #[serde(default)]
    pub mount: Option<ExternalHandle>,
}

impl Node {
    /// The root folder.
    pub fn root(now: i64) -> Self {
        Self::folder(ROOT_ID.to_string(), None, "root".to_string(), now)
    }

    /// Create a folder node.
    pub fn folder(id: NodeId, parent_id: Option<NodeId>, name: String, now: i64) -> Self {
        Self {
            id,
            parent_id,
            name,
            kind: NodeKind::Folder,
            mime: None,
            size: 0,
            created: now,
            modified: now,
            mount: None,
        }
    }

    /// Create a file node.
    pub fn file(id: NodeId, parent_id: NodeId, name: String, size: u64, now: i64) -> Self {
        let mime = guess_mime(&name).to_string();
        Self {
            id,
            parent_id: Some(parent_id),
            name,
            kind: NodeKind::File,
            mime: Some(mime),
            size,
            created: now,
            modified: now,
            mount: None,
        }
    }

    /// Create a mount node under root.
    pub fn mount(id: NodeId, handle: ExternalHandle, now: i64) -> Self {
        Self {
            id,
            parent_id: Some(ROOT_ID.to_string()),
            name: handle.name.clone(),
            kind: NodeKind::Mount,
            mime: None,
            size: 0,
            created: now,
            modified: now,
            mount: Some(handle),
        }
    }

    pub fn is_file(&self) -> bool {
        self.kind == NodeKind::File
    }

    pub fn is_folder(&self) -> bool {
        self.kind == NodeKind::Folder
    }

    pub fn is_mount(&self) -> bool {
        self.kind == NodeKind::Mount
    }

    pub fn is_root(&self) -> bool {
        self.id == ROOT_ID
    }
}

/// Result of reading a node: metadata plus content for files.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileEntry {
    pub node: Node,
    /// File bytes; None for folders and mounts
    pub content: Option<Vec<u8>>,
}

impl FileEntry {
    /// Content as UTF-8 text (lossy), empty for non-files.
    pub fn text(&self) -> String {
        self.content
            .as_deref()
            .map(|c| String::from_utf8_lossy(c).into_owned())
            .unwrap_or_default()
    }
}

/// Maximum node name length in characters.
pub const MAX_NAME_CHARS: usize = 255;

/// Validate a node name.
pub fn validate_name(name: &str) -> Result<(), VfsError> {
    if name.trim().is_empty() {
        return Err(VfsError::InvalidName("name is empty".to_string()));
    }
    if name.chars().count() > MAX_NAME_CHARS {
        return Err(VfsError::InvalidName(format!(
            "name longer than {} characters",
            MAX_NAME_CHARS
        )));
    }
    if name.contains('/') || name.contains('\0') {
        return Err(VfsError::InvalidName(format!("{:?} contains a separator", name)));
    }
    Ok(())
}

/// Validate that a node id is safe to use as a store key on disk.
pub fn validate_id(id: &str) -> Result<(), VfsError> {
    let ok = !id.is_empty()
        && id.len() <= 128
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if ok {
        Ok(())
    } else {
        Err(VfsError::InvalidId(id.to_string()))
    }
}

/// Guess a content type from a file name's extension.
pub fn guess_mime(name: &str) -> &'static str {
    let ext = match name.rsplit_once('.') {
        Some((_, ext)) => ext.to_ascii_lowercase(),
        None => return "application/octet-stream",
    };
    match ext.as_str() {
        "txt" | "log" => "text/plain",
        "md" => "text/markdown",
        "json" => "application/json",
        "js" => "text/javascript",
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "csv" => "text/csv",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "mp3" => "audio/mpeg",
        "mp4" => "video/mp4",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_has_no_parent() {
        let root = Node::root(1000);
        assert!(root.is_root());
        assert!(root.is_folder());
        assert!(root.parent_id.is_none());
    }

    #[test]
    fn test_file_node_gets_mime() {
        let node = Node::file("f1".into(), ROOT_ID.into(), "notes.md".into(), 12, 1000);
        assert_eq!(node.mime.as_deref(), Some("text/markdown"));
        assert_eq!(node.size, 12);
    }

    #[test]
    fn test_mount_node_references_handle() {
        let node = Node::mount("mount-1".into(), ExternalHandle::new("usb", "/media/usb"), 1000);
        assert!(node.is_mount());
        assert_eq!(node.name, "usb");
        assert_eq!(node.parent_id.as_deref(), Some(ROOT_ID));
        assert_eq!(node.mount.unwrap().location, "/media/usb");
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("report.txt").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("   ").is_err());
        assert!(validate_name("a/b").is_err());
        assert!(validate_name(&"x".repeat(256)).is_err());
    }

    #[test]
    fn test_validate_id() {
        assert!(validate_id("root").is_ok());
        assert!(validate_id("mount-3f2a_9").is_ok());
        assert!(validate_id("../etc").is_err());
        assert!(validate_id("").is_err());
    }

    #[test]
    fn test_guess_mime() {
        assert_eq!(guess_mime("photo.JPG"), "image/jpeg");
        assert_eq!(guess_mime("README"), "application/octet-stream");
        assert_eq!(guess_mime("data.json"), "application/json");
    }

    #[test]
    fn test_node_serde_defaults() {
        let json = r#"{"id":"a","parent_id":"root","name":"a","kind":"folder","created":1,"modified":1}"#;
        let node: Node = serde_json::from_str(json).unwrap();
        assert_eq!(node.size, 0);
        assert!(node.mime.is_none());
        assert!(node.mount.is_none());
    }
}
