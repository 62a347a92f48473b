//! Typed kernel events and well-known channel names.

use serde::{Deserialize, Serialize};

use crate::audit::AuditEntry;

/// Well-known channel names.
///
/// Channels prefixed with `sys:` or `err:` are mirrored to the process log.
pub mod channels {
    pub const SYS_BOOT: &str = "sys:boot";
    pub const SYS_SHUTDOWN: &str = "sys:shutdown";
    pub const SYS_RESTART: &str = "sys:restart";
    pub const SYS_ERROR: &str = "sys:error";
    pub const SYS_AUDIT: &str = "sys:audit";
    pub const SYS_PERMISSION_REQUEST: &str = "sys:permission_request";
    pub const SYS_PERMISSION_RESOLVED: &str = "sys:permission_resolved";

    pub const WIN_OPEN: &str = "win:open";
    pub const WIN_CLOSE: &str = "win:close";
    pub const WIN_FOCUS: &str = "win:focus";
    pub const WIN_MINIMIZE: &str = "win:minimize";
    pub const WIN_MAXIMIZE: &str = "win:maximize";
    pub const WIN_UPDATE: &str = "win:update";
    pub const SPACE_CHANGE: &str = "space:change";

    pub const FS_CHANGE: &str = "fs:change";

    pub const ERR_STORAGE: &str = "err:storage";
    pub const ERR_APP: &str = "err:app";
    pub const ERR_KERNEL: &str = "err:kernel";

    /// Pattern matching every error channel.
    pub const ERR_ANY: &str = "err:*";

    /// Whether publishing on `channel` is mirrored to the log.
    #[inline]
    pub fn is_logged(channel: &str) -> bool {
        channel.starts_with("sys:") || is_error(channel)
    }

    /// Whether `channel` is an error channel.
    #[inline]
    pub fn is_error(channel: &str) -> bool {
        channel.starts_with("err:")
    }
}

/// Kind of filesystem mutation carried by `fs:change`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FsChange {
    Created,
    Updated,
    Deleted,
    Moved,
    Renamed,
    Mounted,
    Unmounted,
    Wiped,
}

/// A failure surfaced through an error channel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ErrorReport {
    /// Subsystem or app id that raised the error
    pub source: String,
    /// Human-readable description
    pub message: String,
    /// Whether the crash boundary should offer recovery
    pub fatal: bool,
}

impl ErrorReport {
    /// A non-fatal report (logged, surfaced, no recovery prompt).
    pub fn new(source: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            message: message.into(),
            fatal: false,
        }
    }

    /// A fatal report; the crash boundary offers restart or reset.
    pub fn fatal(source: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            message: message.into(),
            fatal: true,
        }
    }
}

/// Payload of a bus event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KernelEvent {
    Boot,
    Shutdown,
    Restart,
    WindowOpened { window_id: String, kind: String },
    WindowClosed { window_id: String },
    WindowFocused { window_id: String },
    WindowMinimized { window_id: String, minimized: bool },
    WindowMaximized { window_id: String, maximized: bool },
    WindowUpdated { window_id: String },
    SpaceChanged { space_id: u32 },
    FsChanged { change: FsChange, ids: Vec<String> },
    PermissionRequested {
        app_id: String,
        capability: String,
        correlation_id: String,
    },
    PermissionResolved {
        app_id: String,
        capability: String,
        correlation_id: String,
        decision: String,
    },
    Audit(AuditEntry),
    Error(ErrorReport),
    /// Free-form payload for hosted applications
    Custom(serde_json::Value),
}

/// A published event as delivered to subscribers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Channel the event was published on
    pub channel: String,
    /// Typed payload
    pub payload: KernelEvent,
    /// Publish time (ms since epoch)
    pub timestamp: i64,
}
