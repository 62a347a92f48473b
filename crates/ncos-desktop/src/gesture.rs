//! Pointer drag gestures
//!
//! A gesture keeps its own local geometry while the pointer moves; the
//! desktop state is only touched once, on release, by the command the
//! gesture produces. Move gestures also track the snap zone under the
//! pointer so a host can draw the preview.
//!
//! ```text
//!   begin_move / begin_resize
//!            │
//!            ▼
//!       update(pointer) ──► local_rect(), preview()
//!            │
//!            ▼
//!        release() ──► Vec<DesktopCommand>
//! ```

use crate::math::{Rect, Size, Vec2};
use crate::snap::SnapLayout;
use crate::step::DesktopCommand;
use crate::window::{SnapState, Window, WindowId, MIN_SIZE};

/// Which edge or corner a resize grabs
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResizeEdge {
    N,
    S,
    E,
    W,
    NE,
    NW,
    SE,
    SW,
}

impl ResizeEdge {
    fn moves_left(self) -> bool {
        matches!(self, ResizeEdge::W | ResizeEdge::NW | ResizeEdge::SW)
    }

    fn moves_right(self) -> bool {
        matches!(self, ResizeEdge::E | ResizeEdge::NE | ResizeEdge::SE)
    }

    fn moves_top(self) -> bool {
        matches!(self, ResizeEdge::N | ResizeEdge::NE | ResizeEdge::NW)
    }

    fn moves_bottom(self) -> bool {
        matches!(self, ResizeEdge::S | ResizeEdge::SE | ResizeEdge::SW)
    }
}

/// An in-flight drag
#[derive(Clone, Debug, PartialEq)]
pub enum DragGesture {
    /// Title bar drag
    Move {
        window_id: WindowId,
        /// Offset from window origin to pointer
        grab_offset: Vec2,
        /// Geometry at gesture start
        origin: Rect,
        /// Local geometry
        current: Rect,
        layout: SnapLayout,
        /// Snap zone under the pointer
        zone: Option<SnapState>,
    },
    /// Edge or corner drag
    Resize {
        window_id: WindowId,
        edge: ResizeEdge,
        start_rect: Rect,
        start_pointer: Vec2,
        current: Rect,
    },
}

impl DragGesture {
    /// Start dragging a window by its title bar
    pub fn begin_move(window: &Window, pointer: Vec2, layout: SnapLayout) -> Self {
        let rect = window.rect();
        DragGesture::Move {
            window_id: window.id.clone(),
            grab_offset: pointer - rect.position(),
            origin: rect,
            current: rect,
            layout,
            zone: None,
        }
    }

    /// Start dragging a window edge
    pub fn begin_resize(window: &Window, edge: ResizeEdge, pointer: Vec2) -> Self {
        let rect = window.rect();
        DragGesture::Resize {
            window_id: window.id.clone(),
            edge,
            start_rect: rect,
            start_pointer: pointer,
            current: rect,
        }
    }

    #[inline]
    pub fn is_move(&self) -> bool {
        matches!(self, DragGesture::Move { .. })
    }

    #[inline]
    pub fn is_resize(&self) -> bool {
        matches!(self, DragGesture::Resize { .. })
    }

    pub fn window_id(&self) -> &str {
        match self {
            DragGesture::Move { window_id, .. } | DragGesture::Resize { window_id, .. } => {
                window_id
            }
        }
    }

    /// Feed a pointer position. Only the gesture's local geometry changes.
    pub fn update(&mut self, pointer: Vec2) {
        match self {
            DragGesture::Move {
                grab_offset,
                current,
                layout,
                zone,
                ..
            } => {
                *current = Rect::from_pos_size(pointer - *grab_offset, current.size());
                *zone = layout.zone_at(pointer);
            }
            DragGesture::Resize {
                edge,
                start_rect,
                start_pointer,
                current,
                ..
            } => {
                *current = resize_rect(*edge, *start_rect, pointer - *start_pointer);
            }
        }
    }

    /// Geometry to draw while dragging
    pub fn local_rect(&self) -> Rect {
        match self {
            DragGesture::Move { current, .. } | DragGesture::Resize { current, .. } => *current,
        }
    }

    /// Snap zone and target under the pointer, if any
    pub fn preview(&self) -> Option<(SnapState, Rect)> {
        match self {
            DragGesture::Move {
                layout,
                zone: Some(zone),
                ..
            } => layout.zone_rect(*zone).map(|rect| (*zone, rect)),
            _ => None,
        }
    }

    /// Finish the gesture, producing the commands to commit.
    ///
    /// A gesture that never moved produces nothing.
    pub fn release(self) -> Vec<DesktopCommand> {
        if let Some((snap, rect)) = self.preview() {
            return vec![DesktopCommand::Snap {
                id: self.window_id().to_string(),
                position: rect.position(),
                size: rect.size(),
                snap,
            }];
        }

        match self {
            DragGesture::Move {
                window_id,
                origin,
                current,
                ..
            } => {
                if current.approx_eq(&origin, f32::EPSILON) {
                    return Vec::new();
                }
                vec![DesktopCommand::Move {
                    id: window_id,
                    position: current.position(),
                }]
            }
            DragGesture::Resize {
                window_id,
                start_rect,
                current,
                ..
            } => {
                let mut commands = Vec::new();
                if !current.position().approx_eq(start_rect.position(), f32::EPSILON) {
                    commands.push(DesktopCommand::Move {
                        id: window_id.clone(),
                        position: current.position(),
                    });
                }
                if !current.size().approx_eq(start_rect.size(), f32::EPSILON) {
                    commands.push(DesktopCommand::Resize {
                        id: window_id,
                        size: current.size(),
                    });
                }
                commands
            }
        }
    }
}

/// Apply a pointer delta to a rectangle for the given edge, clamped to the
/// minimum window size. The opposite edge stays fixed.
pub fn resize_rect(edge: ResizeEdge, start: Rect, delta: Vec2) -> Rect {
    let mut left = start.x;
    let mut right = start.right();
    let mut top = start.y;
    let mut bottom = start.bottom();

    if edge.moves_left() {
        left = (start.x + delta.x).min(right - MIN_SIZE.width);
    }
    if edge.moves_right() {
        right = (start.right() + delta.x).max(left + MIN_SIZE.width);
    }
    if edge.moves_top() {
        top = (start.y + delta.y).min(bottom - MIN_SIZE.height);
    }
    if edge.moves_bottom() {
        bottom = (start.bottom() + delta.y).max(top + MIN_SIZE.height);
    }

    let size = Size::new(right - left, bottom - top).at_least(MIN_SIZE);
    Rect::new(left, top, size.width, size.height)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::DesktopState;
    use crate::step::step;
    use crate::window::WindowConfig;

    fn window_at(rect: Rect) -> Window {
        let mut state = DesktopState::default();
        step(
            &mut state,
            DesktopCommand::Open(
                WindowConfig::new("w", "app").with_geometry(rect.position(), rect.size()),
            ),
        );
        state.window("w").cloned().unwrap()
    }

    #[test]
    fn test_move_tracks_grab_offset() {
        let window = window_at(Rect::new(100.0, 100.0, 400.0, 300.0));
        let mut drag = DragGesture::begin_move(&window, Vec2::new(150.0, 110.0), SnapLayout::default());
        assert!(drag.is_move());
        assert_eq!(drag.window_id(), "w");

        drag.update(Vec2::new(350.0, 210.0));
        let rect = drag.local_rect();
        assert!(rect.approx_eq(&Rect::new(300.0, 200.0, 400.0, 300.0), 0.001));
        assert!(drag.preview().is_none());

        let commands = drag.release();
        assert_eq!(
            commands,
            vec![DesktopCommand::Move {
                id: "w".into(),
                position: Vec2::new(300.0, 200.0),
            }]
        );
    }

    #[test]
    fn test_move_into_zone_releases_snap() {
        let window = window_at(Rect::new(100.0, 100.0, 400.0, 300.0));
        let mut drag = DragGesture::begin_move(&window, Vec2::new(150.0, 110.0), SnapLayout::default());

        drag.update(Vec2::new(5.0, 300.0));
        let (zone, rect) = drag.preview().unwrap();
        assert_eq!(zone, SnapState::Left);
        assert!(rect.approx_eq(&Rect::new(0.0, 0.0, 640.0, 672.0), 0.001));

        let commands = drag.release();
        assert_eq!(commands.len(), 1);
        assert!(matches!(
            &commands[0],
            DesktopCommand::Snap { snap: SnapState::Left, .. }
        ));
    }

    #[test]
    fn test_leaving_zone_clears_preview() {
        let window = window_at(Rect::new(100.0, 100.0, 400.0, 300.0));
        let mut drag = DragGesture::begin_move(&window, Vec2::new(150.0, 110.0), SnapLayout::default());
        drag.update(Vec2::new(5.0, 300.0));
        drag.update(Vec2::new(500.0, 300.0));
        assert!(drag.preview().is_none());
    }

    #[test]
    fn test_click_without_motion_releases_nothing() {
        let window = window_at(Rect::new(100.0, 100.0, 400.0, 300.0));
        let drag = DragGesture::begin_move(&window, Vec2::new(150.0, 110.0), SnapLayout::default());
        assert!(drag.release().is_empty());
    }

    #[test]
    fn test_resize_se() {
        let window = window_at(Rect::new(100.0, 100.0, 400.0, 300.0));
        let mut drag = DragGesture::begin_resize(&window, ResizeEdge::SE, Vec2::new(500.0, 400.0));
        drag.update(Vec2::new(550.0, 420.0));

        let rect = drag.local_rect();
        assert!(rect.approx_eq(&Rect::new(100.0, 100.0, 450.0, 320.0), 0.001));
        assert_eq!(
            drag.release(),
            vec![DesktopCommand::Resize {
                id: "w".into(),
                size: Size::new(450.0, 320.0),
            }]
        );
    }

    #[test]
    fn test_resize_nw_moves_origin() {
        let window = window_at(Rect::new(100.0, 100.0, 400.0, 300.0));
        let mut drag = DragGesture::begin_resize(&window, ResizeEdge::NW, Vec2::new(100.0, 100.0));
        drag.update(Vec2::new(80.0, 90.0));

        let commands = drag.release();
        assert_eq!(commands.len(), 2);
        assert!(matches!(&commands[0], DesktopCommand::Move { .. }));
        assert!(matches!(&commands[1], DesktopCommand::Resize { .. }));
    }

    #[test]
    fn test_resize_clamps_to_min_size() {
        let start = Rect::new(100.0, 100.0, 400.0, 300.0);
        let rect = resize_rect(ResizeEdge::SE, start, Vec2::new(-1000.0, -1000.0));
        assert!((rect.width - MIN_SIZE.width).abs() < 0.001);
        assert!((rect.height - MIN_SIZE.height).abs() < 0.001);

        // West edge: right edge stays put
        let rect = resize_rect(ResizeEdge::W, start, Vec2::new(1000.0, 0.0));
        assert!((rect.right() - start.right()).abs() < 0.001);
        assert!((rect.width - MIN_SIZE.width).abs() < 0.001);
    }

    #[test]
    fn test_resize_gesture_ignores_zones() {
        let window = window_at(Rect::new(100.0, 100.0, 400.0, 300.0));
        let mut drag = DragGesture::begin_resize(&window, ResizeEdge::E, Vec2::new(500.0, 200.0));
        drag.update(Vec2::new(1279.0, 200.0));
        assert!(drag.is_resize());
        assert!(drag.preview().is_none());
    }
}
