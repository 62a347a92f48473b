//! Window record

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::math::{Rect, Size, Vec2};
use crate::space::SpaceId;
use super::WindowId;

/// Size given to windows opened without an explicit size
pub const DEFAULT_SIZE: Size = Size::new(800.0, 600.0);

/// Smallest size a resize gesture may produce
pub const MIN_SIZE: Size = Size::new(200.0, 150.0);

/// Docking position a window is locked to
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SnapState {
    #[default]
    None,
    Left,
    Right,
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
    Maximized,
}

impl SnapState {
    #[inline]
    pub fn is_snapped(self) -> bool {
        self != SnapState::None
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SnapState::None => "none",
            SnapState::Left => "left",
            SnapState::Right => "right",
            SnapState::TopLeft => "top-left",
            SnapState::TopRight => "top-right",
            SnapState::BottomLeft => "bottom-left",
            SnapState::BottomRight => "bottom-right",
            SnapState::Maximized => "maximized",
        }
    }
}

/// A window on the desktop
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Window {
    /// Unique identifier
    pub id: WindowId,
    /// Hosted application kind
    pub kind: String,
    /// Window title
    pub title: String,
    /// Stacking rank (higher = on top)
    pub z_order: u64,
    #[serde(default)]
    pub minimized: bool,
    #[serde(default)]
    pub maximized: bool,
    /// Position of the top-left corner
    pub position: Vec2,
    pub size: Size,
    /// Geometry to restore after unsnap / unmaximize
    #[serde(default)]
    pub pre_snap: Option<Rect>,
    #[serde(default)]
    pub snap: SnapState,
    /// Owning space
    #[serde(default)]
    pub space: SpaceId,
    /// Opaque launch payload
    #[serde(default)]
    pub payload: Value,
}

impl Window {
    /// Current geometry
    #[inline]
    pub fn rect(&self) -> Rect {
        Rect::from_pos_size(self.position, self.size)
    }

    /// Overwrite geometry
    #[inline]
    pub fn set_rect(&mut self, rect: Rect) {
        self.position = rect.position();
        self.size = rect.size();
    }

    /// Whether the window is docked or maximized
    #[inline]
    pub fn is_docked(&self) -> bool {
        self.maximized || self.snap.is_snapped()
    }
}
