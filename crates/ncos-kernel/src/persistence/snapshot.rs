//! System snapshot: everything the kernel persists between sessions.

use std::collections::BTreeMap;

use ncos_desktop::{DesktopSnapshot, Space, SpaceId, Window, WindowId};
use ncos_perm::GrantTable;
use ncos_vfs::{Node, NodeId};
use serde::{Deserialize, Serialize};

use crate::storage::AppStorage;

/// Persisted kernel state
///
/// ```text
/// {
///   "version": 2,
///   "windows": [...], "spaces": [...], "current_space": 1,
///   "active_window": "textpad-…",
///   "permissions": { "<app>": { "<capability>": "granted" } },
///   "fs_nodes": { "<node id>": { ... } },
///   "app_storage": { "app:<id>:<key>": "<value>" },
///   "saved_at": 1700000000000
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemSnapshot {
    /// Version of the desktop part, for migration
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub windows: Vec<Window>,
    #[serde(default)]
    pub spaces: Vec<Space>,
    #[serde(default)]
    pub current_space: SpaceId,
    #[serde(default)]
    pub active_window: Option<WindowId>,
    #[serde(default)]
    pub permissions: GrantTable,
    #[serde(default)]
    pub fs_nodes: BTreeMap<NodeId, Node>,
    #[serde(default)]
    pub app_storage: AppStorage,
    /// When the snapshot was written (ms since epoch)
    #[serde(default)]
    pub saved_at: i64,
}

impl SystemSnapshot {
    /// Assemble a snapshot from the kernel slices.
    pub fn assemble(
        desktop: DesktopSnapshot,
        permissions: GrantTable,
        nodes: Vec<Node>,
        app_storage: AppStorage,
        saved_at: i64,
    ) -> Self {
        Self {
            version: desktop.version,
            windows: desktop.windows,
            spaces: desktop.spaces,
            current_space: desktop.current_space,
            active_window: desktop.active_window,
            permissions,
            fs_nodes: nodes.into_iter().map(|n| (n.id.clone(), n)).collect(),
            app_storage,
            saved_at,
        }
    }

    /// The window and space slice
    pub fn desktop_snapshot(&self) -> DesktopSnapshot {
        DesktopSnapshot {
            version: self.version,
            windows: self.windows.clone(),
            spaces: self.spaces.clone(),
            current_space: self.current_space,
            active_window: self.active_window.clone(),
        }
    }

    pub fn nodes(&self) -> Vec<Node> {
        self.fs_nodes.values().cloned().collect()
    }
}
