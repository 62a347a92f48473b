//! Pure step function for the window and space manager
//!
//! `step(state, command)` applies one command to the desktop state and
//! returns the outcome plus the list of commits (state mutations) it made.
//! No I/O happens here; the kernel turns commits into bus events and
//! persistence.
//!
//! # Properties
//!
//! 1. **Deterministic**: same state + command always gives the same result
//! 2. **Single writer**: only the provided state is mutated
//! 3. **Failed commands change nothing** and produce no commits

use serde::{Deserialize, Serialize};

use crate::error::DesktopError;
use crate::math::{Rect, Size, Vec2};
use crate::space::{Space, SpaceId};
use crate::state::DesktopState;
use crate::window::{SnapState, Window, WindowConfig, WindowId, DEFAULT_SIZE};

// ============================================================================
// Commands
// ============================================================================

/// Every transition the window and space manager accepts
#[derive(Clone, Debug, PartialEq)]
pub enum DesktopCommand {
    /// Open a window, or reactivate it if the id exists
    Open(WindowConfig),
    Close { id: WindowId },
    Focus { id: WindowId },
    ToggleMinimize { id: WindowId },
    ToggleMaximize { id: WindowId },
    Move { id: WindowId, position: Vec2 },
    Resize { id: WindowId, size: Size },
    /// Commit a precomputed snap target
    Snap {
        id: WindowId,
        position: Vec2,
        size: Size,
        snap: SnapState,
    },
    /// Create a space and switch to it
    AddSpace { label: Option<String> },
    RemoveSpace { id: SpaceId },
    SetSpace { id: SpaceId },
    RenameSpace { id: SpaceId, label: String },
    AssignSpace { window_id: WindowId, space: SpaceId },
    /// Viewport resized by the host
    SetViewport { size: Size },
}

impl DesktopCommand {
    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            DesktopCommand::Open(_) => "open",
            DesktopCommand::Close { .. } => "close",
            DesktopCommand::Focus { .. } => "focus",
            DesktopCommand::ToggleMinimize { .. } => "minimize",
            DesktopCommand::ToggleMaximize { .. } => "maximize",
            DesktopCommand::Move { .. } => "move",
            DesktopCommand::Resize { .. } => "resize",
            DesktopCommand::Snap { .. } => "snap",
            DesktopCommand::AddSpace { .. } => "add_space",
            DesktopCommand::RemoveSpace { .. } => "remove_space",
            DesktopCommand::SetSpace { .. } => "set_space",
            DesktopCommand::RenameSpace { .. } => "rename_space",
            DesktopCommand::AssignSpace { .. } => "assign_space",
            DesktopCommand::SetViewport { .. } => "set_viewport",
        }
    }
}

// ============================================================================
// Results
// ============================================================================

/// What a successful command produced
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    /// State changed
    Applied,
    /// Accepted, nothing to change
    NoOp,
    /// Window opened or reactivated
    Window(WindowId),
    /// Space created
    Space(SpaceId),
}

/// A single state mutation, recorded for notifications and persistence
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Commit {
    WindowOpened {
        id: WindowId,
        kind: String,
        space: SpaceId,
    },
    WindowReactivated { id: WindowId },
    WindowClosed { id: WindowId },
    WindowFocused { id: WindowId, z_order: u64 },
    WindowMinimized { id: WindowId, minimized: bool },
    WindowMaximized { id: WindowId, maximized: bool },
    WindowMoved { id: WindowId },
    WindowResized { id: WindowId },
    WindowSnapped { id: WindowId, snap: SnapState },
    WindowAssigned { id: WindowId, space: SpaceId },
    ActiveChanged { id: Option<WindowId> },
    SpaceAdded { id: SpaceId },
    SpaceRemoved { id: SpaceId, fallback: SpaceId },
    SpaceRenamed { id: SpaceId },
    SpaceSwitched { id: SpaceId },
    ViewportChanged,
}

impl Commit {
    /// Whether the mutation touches durable state (everything but viewport)
    pub fn is_durable(&self) -> bool {
        !matches!(self, Commit::ViewportChanged)
    }
}

/// Result of a step: outcome and commits
#[derive(Clone, Debug, PartialEq)]
pub struct StepResult {
    pub outcome: Result<StepOutcome, DesktopError>,
    pub commits: Vec<Commit>,
}

impl StepResult {
    fn ok(outcome: StepOutcome, commits: Vec<Commit>) -> Self {
        Self {
            outcome: Ok(outcome),
            commits,
        }
    }

    fn noop() -> Self {
        Self::ok(StepOutcome::NoOp, Vec::new())
    }

    fn err(e: DesktopError) -> Self {
        Self {
            outcome: Err(e),
            commits: Vec::new(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }

    /// Whether any durable state changed
    pub fn is_dirty(&self) -> bool {
        self.commits.iter().any(Commit::is_durable)
    }
}

// ============================================================================
// The step function
// ============================================================================

/// Apply one command to the desktop state.
pub fn step(state: &mut DesktopState, command: DesktopCommand) -> StepResult {
    match command {
        DesktopCommand::Open(config) => step_open(state, config),
        DesktopCommand::Close { id } => step_close(state, &id),
        DesktopCommand::Focus { id } => step_focus(state, &id),
        DesktopCommand::ToggleMinimize { id } => step_toggle_minimize(state, &id),
        DesktopCommand::ToggleMaximize { id } => step_toggle_maximize(state, &id),
        DesktopCommand::Move { id, position } => step_move(state, &id, position),
        DesktopCommand::Resize { id, size } => step_resize(state, &id, size),
        DesktopCommand::Snap {
            id,
            position,
            size,
            snap,
        } => step_snap(state, &id, Rect::from_pos_size(position, size), snap),
        DesktopCommand::AddSpace { label } => step_add_space(state, label),
        DesktopCommand::RemoveSpace { id } => step_remove_space(state, id),
        DesktopCommand::SetSpace { id } => step_set_space(state, id),
        DesktopCommand::RenameSpace { id, label } => step_rename_space(state, id, label),
        DesktopCommand::AssignSpace { window_id, space } => {
            step_assign_space(state, &window_id, space)
        }
        DesktopCommand::SetViewport { size } => {
            state.layout.viewport = size;
            StepResult::ok(StepOutcome::Applied, vec![Commit::ViewportChanged])
        }
    }
}

/// Raise a window to the top, un-minimize it, follow it to its space and
/// make it active.
fn raise(state: &mut DesktopState, id: &str, commits: &mut Vec<Commit>) {
    let z = state.next_z();
    let Some(window) = state.window_mut(id) else {
        return;
    };
    window.z_order = z;
    let was_minimized = window.minimized;
    window.minimized = false;
    let space = window.space;

    commits.push(Commit::WindowFocused {
        id: id.to_string(),
        z_order: z,
    });
    if was_minimized {
        commits.push(Commit::WindowMinimized {
            id: id.to_string(),
            minimized: false,
        });
    }
    if space != state.current_space {
        state.current_space = space;
        commits.push(Commit::SpaceSwitched { id: space });
    }
    set_active(state, Some(id.to_string()), commits);
}

fn set_active(state: &mut DesktopState, id: Option<WindowId>, commits: &mut Vec<Commit>) {
    if state.active_window != id {
        state.active_window = id.clone();
        commits.push(Commit::ActiveChanged { id });
    }
}

fn step_open(state: &mut DesktopState, config: WindowConfig) -> StepResult {
    if config.id.trim().is_empty() {
        return StepResult::err(DesktopError::InvalidWindowId(config.id));
    }

    let mut commits = Vec::new();

    if state.window(&config.id).is_some() {
        commits.push(Commit::WindowReactivated {
            id: config.id.clone(),
        });
        raise(state, &config.id, &mut commits);
        return StepResult::ok(StepOutcome::Window(config.id), commits);
    }

    let position = config
        .position
        .unwrap_or_else(|| state.cascade_position());
    let size = config.size.unwrap_or(DEFAULT_SIZE);
    let window = Window {
        id: config.id.clone(),
        title: config.title.unwrap_or_else(|| config.kind.clone()),
        kind: config.kind,
        z_order: state.next_z(),
        minimized: false,
        maximized: false,
        position,
        size,
        pre_snap: None,
        snap: SnapState::None,
        space: state.current_space,
        payload: config.payload,
    };

    commits.push(Commit::WindowOpened {
        id: window.id.clone(),
        kind: window.kind.clone(),
        space: window.space,
    });
    state.windows.push(window);
    set_active(state, Some(config.id.clone()), &mut commits);

    StepResult::ok(StepOutcome::Window(config.id), commits)
}

fn step_close(state: &mut DesktopState, id: &str) -> StepResult {
    let Some(index) = state.windows.iter().position(|w| w.id == id) else {
        return StepResult::err(DesktopError::WindowNotFound(id.to_string()));
    };
    let closed = state.windows.remove(index);
    let mut commits = vec![Commit::WindowClosed {
        id: closed.id.clone(),
    }];

    if state.active_window.as_deref() == Some(id) {
        let next = state
            .topmost_in_space(closed.space, None)
            .map(|w| w.id.clone());
        set_active(state, next, &mut commits);
    }

    StepResult::ok(StepOutcome::Applied, commits)
}

fn step_focus(state: &mut DesktopState, id: &str) -> StepResult {
    if state.window(id).is_none() {
        return StepResult::err(DesktopError::WindowNotFound(id.to_string()));
    }
    if state.active_window.as_deref() == Some(id) {
        return StepResult::noop();
    }

    let mut commits = Vec::new();
    raise(state, id, &mut commits);
    StepResult::ok(StepOutcome::Applied, commits)
}

fn step_toggle_minimize(state: &mut DesktopState, id: &str) -> StepResult {
    let Some(window) = state.window_mut(id) else {
        return StepResult::err(DesktopError::WindowNotFound(id.to_string()));
    };
    window.minimized = !window.minimized;
    let minimized = window.minimized;

    let mut commits = vec![Commit::WindowMinimized {
        id: id.to_string(),
        minimized,
    }];
    if minimized && state.active_window.as_deref() == Some(id) {
        set_active(state, None, &mut commits);
    }
    StepResult::ok(StepOutcome::Applied, commits)
}

fn step_toggle_maximize(state: &mut DesktopState, id: &str) -> StepResult {
    let Some(window) = state.window_mut(id) else {
        return StepResult::err(DesktopError::WindowNotFound(id.to_string()));
    };

    if window.maximized {
        window.maximized = false;
        if let Some(rect) = window.pre_snap.take() {
            window.set_rect(rect);
        }
    } else {
        window.pre_snap = Some(window.rect());
        window.snap = SnapState::None;
        window.maximized = true;
    }

    let commits = vec![Commit::WindowMaximized {
        id: id.to_string(),
        maximized: window.maximized,
    }];
    StepResult::ok(StepOutcome::Applied, commits)
}

fn step_move(state: &mut DesktopState, id: &str, position: Vec2) -> StepResult {
    let Some(window) = state.window_mut(id) else {
        return StepResult::err(DesktopError::WindowNotFound(id.to_string()));
    };
    // Pre-snap is kept so a later unmaximize can still restore
    window.position = position;
    window.snap = SnapState::None;
    window.maximized = false;
    StepResult::ok(
        StepOutcome::Applied,
        vec![Commit::WindowMoved { id: id.to_string() }],
    )
}

fn step_resize(state: &mut DesktopState, id: &str, size: Size) -> StepResult {
    let Some(window) = state.window_mut(id) else {
        return StepResult::err(DesktopError::WindowNotFound(id.to_string()));
    };
    window.size = size;
    window.snap = SnapState::None;
    window.maximized = false;
    window.pre_snap = None;
    StepResult::ok(
        StepOutcome::Applied,
        vec![Commit::WindowResized { id: id.to_string() }],
    )
}

fn step_snap(state: &mut DesktopState, id: &str, target: Rect, snap: SnapState) -> StepResult {
    let Some(window) = state.window_mut(id) else {
        return StepResult::err(DesktopError::WindowNotFound(id.to_string()));
    };
    // Re-snapping keeps the original baseline
    if !window.is_docked() {
        window.pre_snap = Some(window.rect());
    }
    window.set_rect(target);
    window.snap = snap;
    window.maximized = false;
    StepResult::ok(
        StepOutcome::Applied,
        vec![Commit::WindowSnapped {
            id: id.to_string(),
            snap,
        }],
    )
}

fn step_add_space(state: &mut DesktopState, label: Option<String>) -> StepResult {
    let id = state.next_space_id();
    let space = match label {
        Some(label) if !label.trim().is_empty() => Space::new(id, label),
        Some(label) => return StepResult::err(DesktopError::InvalidLabel(label)),
        None => Space::numbered(id),
    };
    state.spaces.push(space);

    let mut commits = vec![Commit::SpaceAdded { id }];
    switch_space(state, id, &mut commits);
    StepResult::ok(StepOutcome::Space(id), commits)
}

fn step_remove_space(state: &mut DesktopState, id: SpaceId) -> StepResult {
    let Some(index) = state.spaces.iter().position(|s| s.id == id) else {
        return StepResult::err(DesktopError::SpaceNotFound(id));
    };
    if state.spaces.len() == 1 {
        return StepResult::noop();
    }

    state.spaces.remove(index);
    let fallback = state.spaces[0].id;
    let mut commits = vec![Commit::SpaceRemoved { id, fallback }];

    for window in state.windows.iter_mut().filter(|w| w.space == id) {
        window.space = fallback;
        commits.push(Commit::WindowAssigned {
            id: window.id.clone(),
            space: fallback,
        });
    }
    if state.current_space == id {
        state.current_space = fallback;
        commits.push(Commit::SpaceSwitched { id: fallback });
    }

    StepResult::ok(StepOutcome::Applied, commits)
}

/// Switch the current space; active moves to that space's top window.
fn switch_space(state: &mut DesktopState, id: SpaceId, commits: &mut Vec<Commit>) {
    state.current_space = id;
    commits.push(Commit::SpaceSwitched { id });

    let active_here = state
        .active_window
        .as_deref()
        .and_then(|a| state.window(a))
        .map_or(false, |w| w.space == id);
    if !active_here {
        let next = state
            .windows
            .iter()
            .filter(|w| w.space == id && !w.minimized)
            .max_by_key(|w| w.z_order)
            .map(|w| w.id.clone());
        set_active(state, next, commits);
    }
}

fn step_set_space(state: &mut DesktopState, id: SpaceId) -> StepResult {
    if !state.has_space(id) {
        return StepResult::err(DesktopError::SpaceNotFound(id));
    }
    if state.current_space == id {
        return StepResult::noop();
    }
    let mut commits = Vec::new();
    switch_space(state, id, &mut commits);
    StepResult::ok(StepOutcome::Applied, commits)
}

fn step_rename_space(state: &mut DesktopState, id: SpaceId, label: String) -> StepResult {
    if label.trim().is_empty() {
        return StepResult::err(DesktopError::InvalidLabel(label));
    }
    let Some(space) = state.spaces.iter_mut().find(|s| s.id == id) else {
        return StepResult::err(DesktopError::SpaceNotFound(id));
    };
    space.label = label;
    StepResult::ok(StepOutcome::Applied, vec![Commit::SpaceRenamed { id }])
}

fn step_assign_space(state: &mut DesktopState, window_id: &str, space: SpaceId) -> StepResult {
    if !state.has_space(space) {
        return StepResult::err(DesktopError::SpaceNotFound(space));
    }
    let current = state.current_space;
    let Some(window) = state.window_mut(window_id) else {
        return StepResult::err(DesktopError::WindowNotFound(window_id.to_string()));
    };
    if window.space == space {
        return StepResult::noop();
    }
    window.space = space;

    let mut commits = vec![Commit::WindowAssigned {
        id: window_id.to_string(),
        space,
    }];
    // A window sent away from the current space cannot stay active
    if space != current && state.active_window.as_deref() == Some(window_id) {
        set_active(state, None, &mut commits);
    }
    StepResult::ok(StepOutcome::Applied, commits)
}
