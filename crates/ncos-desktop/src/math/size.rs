//! 2D size type for dimensions

use serde::{Deserialize, Serialize};

/// 2D size for width and height
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    /// Zero size
    pub const ZERO: Size = Size {
        width: 0.0,
        height: 0.0,
    };

    /// Create a new size
    #[inline]
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Check if size is zero or negative
    #[inline]
    pub fn is_empty(self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    /// Grow each dimension to at least `min`
    #[inline]
    pub fn at_least(self, min: Size) -> Self {
        Self::new(self.width.max(min.width), self.height.max(min.height))
    }

    /// Component-wise approximate equality
    #[inline]
    pub fn approx_eq(self, other: Size, epsilon: f32) -> bool {
        (self.width - other.width).abs() < epsilon && (self.height - other.height).abs() < epsilon
    }
}
