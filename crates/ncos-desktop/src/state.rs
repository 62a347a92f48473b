//! Desktop state
//!
//! The in-memory model the reducer operates on. All fields are public so
//! the kernel can build read-only views; mutation goes through `step`.

use serde::{Deserialize, Serialize};

use crate::math::Vec2;
use crate::snap::SnapLayout;
use crate::space::{Space, SpaceId};
use crate::window::{Window, WindowId};

/// Z-order handed out when no window exists
pub const Z_ORDER_BASE: u64 = 100;

/// Restored stacks at or above this z-order are renumbered from the base
pub const Z_ORDER_LIMIT: u64 = 1 << 53;

/// Offset between successive default window positions
const CASCADE_STEP: f32 = 30.0;
const CASCADE_ORIGIN: f32 = 100.0;
const CASCADE_SLOTS: usize = 10;

/// Complete window and space state
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DesktopState {
    /// Open windows in open order
    pub windows: Vec<Window>,
    /// Spaces in creation order (the first one is the removal fallback)
    pub spaces: Vec<Space>,
    pub current_space: SpaceId,
    pub active_window: Option<WindowId>,
    /// Viewport geometry for snapping
    pub layout: SnapLayout,
}

impl Default for DesktopState {
    fn default() -> Self {
        Self::new(SnapLayout::default())
    }
}

impl DesktopState {
    /// Fresh state with a single space
    pub fn new(layout: SnapLayout) -> Self {
        Self {
            windows: Vec::new(),
            spaces: vec![Space::numbered(1)],
            current_space: 1,
            active_window: None,
            layout,
        }
    }

    pub fn window(&self, id: &str) -> Option<&Window> {
        self.windows.iter().find(|w| w.id == id)
    }

    pub fn window_mut(&mut self, id: &str) -> Option<&mut Window> {
        self.windows.iter_mut().find(|w| w.id == id)
    }

    pub fn space(&self, id: SpaceId) -> Option<&Space> {
        self.spaces.iter().find(|s| s.id == id)
    }

    pub fn has_space(&self, id: SpaceId) -> bool {
        self.space(id).is_some()
    }

    /// Next z-order: one above the current maximum, or the base
    pub fn next_z(&self) -> u64 {
        self.windows
            .iter()
            .map(|w| w.z_order)
            .max()
            .map_or(Z_ORDER_BASE, |z| z.saturating_add(1))
    }

    /// Renumber z-orders densely from [`Z_ORDER_BASE`], keeping the
    /// stacking order.
    pub fn compact_z_order(&mut self) {
        let mut order: Vec<usize> = (0..self.windows.len()).collect();
        order.sort_by_key(|&i| self.windows[i].z_order);
        for (rank, i) in order.into_iter().enumerate() {
            self.windows[i].z_order = Z_ORDER_BASE + rank as u64;
        }
    }

    /// Next unused space id
    pub fn next_space_id(&self) -> SpaceId {
        self.spaces.iter().map(|s| s.id).max().unwrap_or(0) + 1
    }

    /// Cascading position for a newly opened window
    pub fn cascade_position(&self) -> Vec2 {
        let slot = (self.windows.len() % CASCADE_SLOTS) as f32;
        let offset = CASCADE_ORIGIN + slot * CASCADE_STEP;
        Vec2::new(offset, offset)
    }

    /// Highest-z window in `space`, skipping `except`
    pub fn topmost_in_space(&self, space: SpaceId, except: Option<&str>) -> Option<&Window> {
        self.windows
            .iter()
            .filter(|w| w.space == space && Some(w.id.as_str()) != except)
            .max_by_key(|w| w.z_order)
    }

    /// Windows of the current space, back to front
    pub fn visible_windows(&self) -> Vec<&Window> {
        let mut windows: Vec<&Window> = self
            .windows
            .iter()
            .filter(|w| w.space == self.current_space && !w.minimized)
            .collect();
        windows.sort_by_key(|w| w.z_order);
        windows
    }

    /// Windows sorted by z-order (back to front)
    pub fn windows_by_z(&self) -> Vec<&Window> {
        let mut windows: Vec<&Window> = self.windows.iter().collect();
        windows.sort_by_key(|w| w.z_order);
        windows
    }
}
