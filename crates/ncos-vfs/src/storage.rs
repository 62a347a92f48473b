//! Storage usage accounting.

use serde::{Deserialize, Serialize};

use crate::types::{Node, NodeKind};

/// Storage usage statistics.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageUsage {
    /// Total content bytes
    pub used_bytes: u64,

    /// Number of files
    pub file_count: u64,

    /// Number of folders (root included)
    pub folder_count: u64,

    /// Number of mounts
    pub mount_count: u64,
}

impl StorageUsage {
    /// Create new empty usage stats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Tally a set of nodes.
    pub fn from_nodes<'a>(nodes: impl IntoIterator<Item = &'a Node>) -> Self {
        let mut usage = Self::new();
        for node in nodes {
            usage.add(node);
        }
        usage
    }

    /// Add a node to the usage stats.
    pub fn add(&mut self, node: &Node) {
        match node.kind {
            NodeKind::File => {
                self.file_count += 1;
                self.used_bytes += node.size;
            }
            NodeKind::Folder => self.folder_count += 1,
            NodeKind::Mount => self.mount_count += 1,
        }
    }

    /// Total node count.
    pub fn node_count(&self) -> u64 {
        self.file_count + self.folder_count + self.mount_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ExternalHandle, ROOT_ID};

    #[test]
    fn test_from_nodes() {
        let nodes = vec![
            Node::root(1),
            Node::file("a".into(), ROOT_ID.into(), "a.txt".into(), 10, 1),
            Node::file("b".into(), ROOT_ID.into(), "b.txt".into(), 5, 1),
            Node::mount("m".into(), ExternalHandle::new("usb", "/mnt/usb"), 1),
        ];

        let usage = StorageUsage::from_nodes(&nodes);
        assert_eq!(usage.file_count, 2);
        assert_eq!(usage.folder_count, 1);
        assert_eq!(usage.mount_count, 1);
        assert_eq!(usage.used_bytes, 15);
        assert_eq!(usage.node_count(), 4);
    }
}
