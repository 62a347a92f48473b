//! Night City Window & Space Manager
//!
//! The desktop is a pure state machine. Every transition is a
//! [`DesktopCommand`] applied by [`step`] to a [`DesktopState`], producing a
//! [`StepResult`] with the outcome and the list of commits it made.
//!
//! - **Math**: `Vec2`, `Size`, `Rect` in viewport pixels
//! - **Window / Space**: records, snap state, open requests
//! - **Snap**: zone detection and target rectangles
//! - **Gesture**: move/resize drags with local geometry
//! - **Manager**: single-writer owner with a FIFO command queue
//! - **Persistence**: versioned `DesktopSnapshot`
//!
//! # Data flow
//!
//! ```text
//!  pointer ──► DragGesture ──release──┐
//!                                     ▼
//!  app host ──► DesktopCommand ──► DesktopManager ──► step() ──► StepResult
//!                                     │                              │
//!                                     ▼                              ▼
//!                               DesktopState                commits (events,
//!                                                             persistence)
//! ```
//!
//! No I/O happens in this crate; the kernel maps commits to bus events
//! and decides when to persist.

pub mod error;
pub mod gesture;
pub mod invariants;
pub mod manager;
pub mod math;
pub mod persistence;
pub mod snap;
pub mod space;
pub mod state;
pub mod step;
pub mod window;

pub use error::DesktopError;
pub use gesture::{resize_rect, DragGesture, ResizeEdge};
pub use invariants::{check_invariants, InvariantViolation};
pub use manager::DesktopManager;
pub use math::{Rect, Size, Vec2};
pub use persistence::DesktopSnapshot;
pub use snap::{SnapLayout, DEFAULT_SNAP_THRESHOLD, DEFAULT_TASKBAR_HEIGHT};
pub use space::{Space, SpaceId};
pub use state::{DesktopState, Z_ORDER_BASE, Z_ORDER_LIMIT};
pub use step::{step, Commit, DesktopCommand, StepOutcome, StepResult};
pub use window::{SnapState, Window, WindowConfig, WindowId, DEFAULT_SIZE, MIN_SIZE};
