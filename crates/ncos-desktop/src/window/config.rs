//! Window configuration for open requests

use serde_json::Value;

use crate::math::{Size, Vec2};
use super::WindowId;

/// Request to open (or reactivate) a window
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WindowConfig {
    /// Window id; opening an existing id reactivates that window
    pub id: WindowId,
    /// Hosted application kind
    pub kind: String,
    /// Title (None = kind)
    pub title: Option<String>,
    /// Initial position (None = cascade)
    pub position: Option<Vec2>,
    /// Initial size (None = default size)
    pub size: Option<Size>,
    /// Opaque launch payload handed to the app
    pub payload: Value,
}

impl WindowConfig {
    /// Open request with default geometry and no payload.
    pub fn new(id: impl Into<WindowId>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            ..Default::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_geometry(mut self, position: Vec2, size: Size) -> Self {
        self.position = Some(position);
        self.size = Some(size);
        self
    }
}
