//! Snapshot serialization for desktop state

use serde::{Deserialize, Serialize};

use crate::error::DesktopError;
use crate::invariants::check_invariants;
use crate::snap::SnapLayout;
use crate::space::{Space, SpaceId};
use crate::state::{DesktopState, Z_ORDER_LIMIT};
use crate::window::{Window, WindowId};

/// Durable subset of the desktop state
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DesktopSnapshot {
    /// Version for migration support
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
}

impl DesktopSnapshot {
    /// Current snapshot version.
    ///
    /// Version 1 snapshots predate spaces: windows carry no space id.
    pub const CURRENT_VERSION: u32 = 2;

    /// Check if snapshot needs migration
    pub fn needs_migration(&self) -> bool {
        self.version < Self::CURRENT_VERSION
    }

    /// Migrate snapshot to current version
    pub fn migrate(&mut self) {
        if self.version < 2 {
            if self.spaces.is_empty() {
                self.spaces.push(Space::numbered(1));
            }
            let first = self.spaces[0].id;
            for window in &mut self.windows {
                if window.space == 0 {
                    window.space = first;
                }
            }
            if self.current_space == 0 {
                self.current_space = first;
            }
        }
        self.version = Self::CURRENT_VERSION;
    }
}

impl DesktopState {
    /// Export the durable part of the state
    pub fn to_snapshot(&self) -> DesktopSnapshot {
        DesktopSnapshot {
            version: DesktopSnapshot::CURRENT_VERSION,
            windows: self.windows.clone(),
            spaces: self.spaces.clone(),
            current_space: self.current_space,
            active_window: self.active_window.clone(),
        }
    }

    /// Rebuild state from a snapshot, migrating older versions first.
    ///
    /// A dangling active window is dropped; any other invariant violation
    /// rejects the snapshot. A stack whose z-orders reach
    /// [`Z_ORDER_LIMIT`] is renumbered.
    pub fn from_snapshot(
        mut snapshot: DesktopSnapshot,
        layout: SnapLayout,
    ) -> Result<Self, DesktopError> {
        if snapshot.version > DesktopSnapshot::CURRENT_VERSION {
            return Err(DesktopError::InvalidSnapshot(format!(
                "unsupported version {}",
                snapshot.version
            )));
        }
        if snapshot.needs_migration() {
            log::info!(
                target: "desktop",
                "migrating desktop snapshot v{} -> v{}",
                snapshot.version,
                DesktopSnapshot::CURRENT_VERSION
            );
            snapshot.migrate();
        }

        let mut state = DesktopState {
            windows: snapshot.windows,
            spaces: snapshot.spaces,
            current_space: snapshot.current_space,
            active_window: snapshot.active_window,
            layout,
        };
        if let Some(active) = state.active_window.as_deref() {
            if state.window(active).is_none() {
                state.active_window = None;
            }
        }

        let violations = check_invariants(&state);
        if !violations.is_empty() {
            let reasons: Vec<String> = violations.into_iter().map(|v| v.description).collect();
            return Err(DesktopError::InvalidSnapshot(reasons.join("; ")));
        }
        if state.windows.iter().any(|w| w.z_order >= Z_ORDER_LIMIT) {
            log::warn!(target: "desktop", "z-order range exhausted, renumbering stack");
            state.compact_z_order();
        }
        Ok(state)
    }
}
