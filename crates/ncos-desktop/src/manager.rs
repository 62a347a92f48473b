//! Single-writer desktop manager
//!
//! Owns the desktop state and a FIFO command queue. Commands are either
//! dispatched immediately or enqueued and drained in order; both paths go
//! through `step`, so there is exactly one writer.

use std::collections::VecDeque;

use crate::error::DesktopError;
use crate::gesture::{DragGesture, ResizeEdge};
use crate::math::Vec2;
use crate::persistence::DesktopSnapshot;
use crate::snap::SnapLayout;
use crate::state::DesktopState;
use crate::step::{step, DesktopCommand, StepResult};

/// Window and space manager
#[derive(Clone, Debug, Default)]
pub struct DesktopManager {
    state: DesktopState,
    queue: VecDeque<DesktopCommand>,
}

impl DesktopManager {
    pub fn new(state: DesktopState) -> Self {
        Self {
            state,
            queue: VecDeque::new(),
        }
    }

    /// Rebuild from a persisted snapshot
    pub fn from_snapshot(
        snapshot: DesktopSnapshot,
        layout: SnapLayout,
    ) -> Result<Self, DesktopError> {
        Ok(Self::new(DesktopState::from_snapshot(snapshot, layout)?))
    }

    /// Read-only view of the state
    #[inline]
    pub fn state(&self) -> &DesktopState {
        &self.state
    }

    pub fn snapshot(&self) -> DesktopSnapshot {
        self.state.to_snapshot()
    }

    /// Swap in a whole new state (restore, import). Queued commands are
    /// dropped since they were aimed at the old state.
    pub fn replace(&mut self, state: DesktopState) {
        self.queue.clear();
        self.state = state;
    }

    /// Apply a command now
    pub fn dispatch(&mut self, command: DesktopCommand) -> StepResult {
        let name = command.name();
        let result = step(&mut self.state, command);
        match &result.outcome {
            Ok(_) => log::debug!(target: "desktop", "{} -> {} commits", name, result.commits.len()),
            Err(e) => log::debug!(target: "desktop", "{} rejected: {}", name, e),
        }
        result
    }

    /// Queue a command for the next drain
    pub fn enqueue(&mut self, command: DesktopCommand) {
        self.queue.push_back(command);
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Apply every queued command in FIFO order
    pub fn drain(&mut self) -> Vec<StepResult> {
        let mut results = Vec::with_capacity(self.queue.len());
        while let Some(command) = self.queue.pop_front() {
            results.push(self.dispatch(command));
        }
        results
    }

    /// Start a title bar drag on a window
    pub fn begin_move(&self, id: &str, pointer: Vec2) -> Result<DragGesture, DesktopError> {
        let window = self
            .state
            .window(id)
            .ok_or_else(|| DesktopError::WindowNotFound(id.to_string()))?;
        Ok(DragGesture::begin_move(window, pointer, self.state.layout))
    }

    /// Start an edge drag on a window
    pub fn begin_resize(
        &self,
        id: &str,
        edge: ResizeEdge,
        pointer: Vec2,
    ) -> Result<DragGesture, DesktopError> {
        let window = self
            .state
            .window(id)
            .ok_or_else(|| DesktopError::WindowNotFound(id.to_string()))?;
        Ok(DragGesture::begin_resize(window, edge, pointer))
    }

    /// Commit a finished gesture
    pub fn finish_gesture(&mut self, gesture: DragGesture) -> Vec<StepResult> {
        gesture
            .release()
            .into_iter()
            .map(|command| self.dispatch(command))
            .collect()
    }
}
