//! Kernel configuration.
//!
//! Every field has a default, so an empty TOML document is a valid
//! configuration:
//!
//! ```toml
//! snap_threshold = 24
//! permission_timeout_ms = 30000   # 0 waits forever
//! state_dir = "/var/lib/ncos"
//!
//! [viewport]
//! width = 1920
//! height = 1080
//!
//! [import]
//! max_nodes = 500
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use ncos_bus::{BusLimits, DEFAULT_AUDIT_CAPACITY};
use ncos_desktop::{Size, SnapLayout, DEFAULT_SNAP_THRESHOLD, DEFAULT_TASKBAR_HEIGHT};
use serde::{Deserialize, Serialize};

use crate::error::KernelError;
use crate::registry::FACTORY_APP_IDS;

/// Viewport size in pixels
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ViewportConfig {
    pub width: f32,
    pub height: f32,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            width: 1280.0,
            height: 720.0,
        }
    }
}

/// Bounds enforced on imported snapshot bundles
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportLimits {
    pub max_nodes: usize,
    /// Maximum JSON nesting depth
    pub max_depth: usize,
    /// Maximum characters in any string
    pub max_string_len: usize,
    /// Maximum payload size in bytes
    pub max_bytes: usize,
}

impl Default for ImportLimits {
    fn default() -> Self {
        Self {
            max_nodes: 1_000,
            max_depth: 10,
            max_string_len: 100_000,
            max_bytes: 5 * 1024 * 1024,
        }
    }
}

/// Kernel configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    pub viewport: ViewportConfig,
    pub snap_threshold: f32,
    pub taskbar_height: f32,
    pub audit_capacity: usize,
    pub bus_max_subscribers: usize,
    pub bus_history: usize,
    /// How long a capability prompt may stay unanswered (None or 0 = forever)
    pub permission_timeout_ms: Option<u64>,
    /// Quiet period after the last change before a snapshot is written
    pub autosave_debounce_ms: u64,
    pub import: ImportLimits,
    /// Where snapshots and blobs live; in memory when unset
    pub state_dir: Option<PathBuf>,
    /// Apps that may be registered
    pub allowed_apps: Vec<String>,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            viewport: ViewportConfig::default(),
            snap_threshold: DEFAULT_SNAP_THRESHOLD,
            taskbar_height: DEFAULT_TASKBAR_HEIGHT,
            audit_capacity: DEFAULT_AUDIT_CAPACITY,
            bus_max_subscribers: 50,
            bus_history: 20,
            permission_timeout_ms: Some(60_000),
            autosave_debounce_ms: 500,
            import: ImportLimits::default(),
            state_dir: None,
            allowed_apps: FACTORY_APP_IDS.iter().map(|id| id.to_string()).collect(),
        }
    }
}

impl KernelConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, KernelError> {
        toml::from_str(text)
            .map_err(|e| KernelError::ValidationFailure(format!("invalid config: {}", e)))
    }

    /// Read and parse a TOML file. A relative `state_dir` is resolved
    /// against the file's directory.
    pub fn load(path: &Path) -> Result<Self, KernelError> {
        let text = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&text)?;
        if let Some(dir) = config.state_dir.as_mut() {
            if dir.is_relative() {
                let base = path.parent().unwrap_or_else(|| Path::new("."));
                *dir = base.join(&*dir);
            }
        }
        log::info!(target: "kernel", "loaded config from {}", path.display());
        Ok(config)
    }

    /// Snap geometry for the window manager
    pub fn layout(&self) -> SnapLayout {
        SnapLayout {
            viewport: Size::new(self.viewport.width, self.viewport.height),
            threshold: self.snap_threshold,
            taskbar_height: self.taskbar_height,
        }
    }

    pub fn bus_limits(&self) -> BusLimits {
        BusLimits {
            max_subscribers: self.bus_max_subscribers,
            history: self.bus_history,
            audit_capacity: self.audit_capacity,
        }
    }

    pub fn permission_timeout(&self) -> Option<Duration> {
        match self.permission_timeout_ms {
            Some(0) | None => None,
            Some(ms) => Some(Duration::from_millis(ms)),
        }
    }

    pub fn autosave_debounce(&self) -> Duration {
        Duration::from_millis(self.autosave_debounce_ms)
    }
}
