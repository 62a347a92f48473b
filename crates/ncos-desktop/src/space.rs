//! Spaces (virtual desktops)

use serde::{Deserialize, Serialize};

/// Space identifier
pub type SpaceId = u32;

/// A virtual desktop: a named partition of the window set
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Space {
    pub id: SpaceId,
    /// Display label
    pub label: String,
}

impl Space {
    pub fn new(id: SpaceId, label: impl Into<String>) -> Self {
        Self {
            id,
            label: label.into(),
        }
    }

    /// Space with the default "Space N" label
    pub fn numbered(id: SpaceId) -> Self {
        Self::new(id, format!("Space {}", id))
    }
}
