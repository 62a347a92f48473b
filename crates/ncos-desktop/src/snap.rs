//! Snap zones
//!
//! While a window is dragged by its title bar the pointer is tested
//! against the viewport edges and corners. Each zone maps to a target
//! rectangle inside the work area (the viewport minus the taskbar strip).
//!
//! ```text
//!  ┌──────────┬───────────────────────┬──────────┐
//!  │ top-left │       maximized       │top-right │
//!  ├──────────┘                       └──────────┤
//!  │ left                                  right │
//!  ├──────────┐                       ┌──────────┤
//!  │bottom-lft│      (no zone)        │bottom-rgt│
//!  ├──────────┴───────────────────────┴──────────┤
//!  │              taskbar (no zone)              │
//!  └─────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};

use crate::math::{Rect, Size, Vec2};
use crate::window::SnapState;

/// Default pointer distance from an edge that activates a zone
pub const DEFAULT_SNAP_THRESHOLD: f32 = 20.0;

/// Default height of the reserved taskbar strip
pub const DEFAULT_TASKBAR_HEIGHT: f32 = 48.0;

/// Viewport geometry used for zone detection
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SnapLayout {
    /// Full viewport size
    pub viewport: Size,
    /// Edge proximity threshold in pixels
    pub threshold: f32,
    /// Reserved strip at the bottom of the viewport
    pub taskbar_height: f32,
}

impl Default for SnapLayout {
    fn default() -> Self {
        Self::new(Size::new(1280.0, 720.0))
    }
}

impl SnapLayout {
    /// Layout with default threshold and taskbar
    pub fn new(viewport: Size) -> Self {
        Self {
            viewport,
            threshold: DEFAULT_SNAP_THRESHOLD,
            taskbar_height: DEFAULT_TASKBAR_HEIGHT,
        }
    }

    /// Usable area: full width, height minus the taskbar
    pub fn work_area(&self) -> Rect {
        let height = (self.viewport.height - self.taskbar_height).max(0.0);
        Rect::new(0.0, 0.0, self.viewport.width, height)
    }

    /// Zone under the pointer, if any
    pub fn zone_at(&self, pointer: Vec2) -> Option<SnapState> {
        let work = self.work_area();
        if pointer.y >= work.bottom() {
            return None;
        }

        let t = self.threshold;
        let left = pointer.x <= t;
        let right = pointer.x >= work.right() - t;
        let top = pointer.y <= t;
        let bottom = pointer.y >= work.bottom() - t;

        match (left, right, top, bottom) {
            (true, _, true, _) => Some(SnapState::TopLeft),
            (_, true, true, _) => Some(SnapState::TopRight),
            (true, _, _, true) => Some(SnapState::BottomLeft),
            (_, true, _, true) => Some(SnapState::BottomRight),
            (true, _, _, _) => Some(SnapState::Left),
            (_, true, _, _) => Some(SnapState::Right),
            (_, _, true, _) => Some(SnapState::Maximized),
            _ => None,
        }
    }

    /// Target rectangle for a zone. `SnapState::None` has no target.
    pub fn zone_rect(&self, zone: SnapState) -> Option<Rect> {
        let work = self.work_area();
        let half_w = work.width / 2.0;
        let half_h = work.height / 2.0;

        let rect = match zone {
            SnapState::None => return None,
            SnapState::Left => Rect::new(work.x, work.y, half_w, work.height),
            SnapState::Right => Rect::new(work.x + half_w, work.y, half_w, work.height),
            SnapState::TopLeft => Rect::new(work.x, work.y, half_w, half_h),
            SnapState::TopRight => Rect::new(work.x + half_w, work.y, half_w, half_h),
            SnapState::BottomLeft => Rect::new(work.x, work.y + half_h, half_w, half_h),
            SnapState::BottomRight => Rect::new(work.x + half_w, work.y + half_h, half_w, half_h),
            SnapState::Maximized => work,
        };
        Some(rect)
    }

    /// Zone and its target for a pointer position
    pub fn preview(&self, pointer: Vec2) -> Option<(SnapState, Rect)> {
        let zone = self.zone_at(pointer)?;
        self.zone_rect(zone).map(|rect| (zone, rect))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> SnapLayout {
        SnapLayout::new(Size::new(1280.0, 720.0))
    }

    #[test]
    fn test_work_area_excludes_taskbar() {
        let work = layout().work_area();
        assert!(work.approx_eq(&Rect::new(0.0, 0.0, 1280.0, 672.0), 0.001));
    }

    #[test]
    fn test_edges() {
        let l = layout();
        assert_eq!(l.zone_at(Vec2::new(10.0, 300.0)), Some(SnapState::Left));
        assert_eq!(l.zone_at(Vec2::new(1275.0, 300.0)), Some(SnapState::Right));
        assert_eq!(l.zone_at(Vec2::new(640.0, 5.0)), Some(SnapState::Maximized));
        assert_eq!(l.zone_at(Vec2::new(640.0, 360.0)), None);
    }

    #[test]
    fn test_corners() {
        let l = layout();
        assert_eq!(l.zone_at(Vec2::new(0.0, 0.0)), Some(SnapState::TopLeft));
        assert_eq!(l.zone_at(Vec2::new(1279.0, 10.0)), Some(SnapState::TopRight));
        assert_eq!(l.zone_at(Vec2::new(5.0, 660.0)), Some(SnapState::BottomLeft));
        assert_eq!(l.zone_at(Vec2::new(1270.0, 660.0)), Some(SnapState::BottomRight));
    }

    #[test]
    fn test_bottom_edge_and_taskbar_match_nothing() {
        let l = layout();
        assert_eq!(l.zone_at(Vec2::new(640.0, 665.0)), None);
        assert_eq!(l.zone_at(Vec2::new(5.0, 700.0)), None);
    }

    #[test]
    fn test_zone_rects() {
        let l = layout();
        let left = l.zone_rect(SnapState::Left).unwrap();
        assert!(left.approx_eq(&Rect::new(0.0, 0.0, 640.0, 672.0), 0.001));

        let br = l.zone_rect(SnapState::BottomRight).unwrap();
        assert!(br.approx_eq(&Rect::new(640.0, 336.0, 640.0, 336.0), 0.001));

        let max = l.zone_rect(SnapState::Maximized).unwrap();
        assert!(max.approx_eq(&l.work_area(), 0.001));

        assert!(l.zone_rect(SnapState::None).is_none());
    }

    #[test]
    fn test_preview() {
        let (zone, rect) = layout().preview(Vec2::new(12.0, 400.0)).unwrap();
        assert_eq!(zone, SnapState::Left);
        assert!((rect.width - 640.0).abs() < 0.001);
    }
}
