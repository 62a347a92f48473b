//! Window model
//!
//! Window records, their snap state and the open request.

#[allow(clippy::module_inception)]
mod window;
mod config;

pub use config::WindowConfig;
pub use window::{SnapState, Window, DEFAULT_SIZE, MIN_SIZE};

/// Unique window identifier (chosen by the opener)
pub type WindowId = String;
