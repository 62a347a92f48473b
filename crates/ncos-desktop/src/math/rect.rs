//! Axis-aligned rectangle

use serde::{Deserialize, Serialize};

use super::{Size, Vec2};

/// Axis-aligned rectangle in viewport pixels (origin top-left)
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    /// Create a new rectangle
    #[inline]
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Build from a position and a size
    #[inline]
    pub fn from_pos_size(pos: Vec2, size: Size) -> Self {
        Self::new(pos.x, pos.y, size.width, size.height)
    }

    #[inline]
    pub fn position(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    #[inline]
    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    #[inline]
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    #[inline]
    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    /// Check if a point is inside (right and bottom edges exclusive)
    #[inline]
    pub fn contains(&self, p: Vec2) -> bool {
        p.x >= self.x && p.x < self.right() && p.y >= self.y && p.y < self.bottom()
    }

    /// Approximate equality for tests and change detection
    pub fn approx_eq(&self, other: &Rect, epsilon: f32) -> bool {
        (self.x - other.x).abs() < epsilon
            && (self.y - other.y).abs() < epsilon
            && (self.width - other.width).abs() < epsilon
            && (self.height - other.height).abs() < epsilon
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_edges() {
        let r = Rect::new(10.0, 20.0, 100.0, 50.0);
        assert!((r.right() - 110.0).abs() < 0.001);
        assert!((r.bottom() - 70.0).abs() < 0.001);
    }

    #[test]
    fn test_rect_contains() {
        let r = Rect::new(0.0, 0.0, 100.0, 100.0);
        assert!(r.contains(Vec2::new(0.0, 0.0)));
        assert!(r.contains(Vec2::new(99.9, 50.0)));
        assert!(!r.contains(Vec2::new(100.0, 50.0)));
        assert!(!r.contains(Vec2::new(-1.0, 50.0)));
    }

    #[test]
    fn test_rect_from_pos_size() {
        let r = Rect::from_pos_size(Vec2::new(5.0, 6.0), Size::new(7.0, 8.0));
        assert!(r.approx_eq(&Rect::new(5.0, 6.0, 7.0, 8.0), 0.001));
        assert_eq!(r.position(), Vec2::new(5.0, 6.0));
        assert_eq!(r.size(), Size::new(7.0, 8.0));
    }
}
