//! Kernel-local text clipboard.
//!
//! Not persisted; a restart starts with an empty clipboard.

/// Single-slot text clipboard shared by every hosted app
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Clipboard {
    text: Option<String>,
    /// App that last wrote the clipboard
    owner: Option<String>,
}

impl Clipboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn write(&mut self, app_id: &str, text: impl Into<String>) {
        self.text = Some(text.into());
        self.owner = Some(app_id.to_string());
    }

    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    pub fn clear(&mut self) {
        self.text = None;
        self.owner = None;
    }
}
