//! Runtime-checkable desktop invariants
//!
//! Used to validate restored snapshots and as assertions in tests.
//!
//! # Invariants
//!
//! 1. **Spaces exist**: there is at least one space
//! 2. **Current space**: the current space id names an existing space
//! 3. **Window ownership**: every window belongs to an existing space
//! 4. **Unique ids**: no two windows share an id, no two spaces share an id
//! 5. **Unique z-order**: no two open windows share a z-order value
//! 6. **Active window**: the active window, if any, is an open window

use std::collections::HashSet;

use crate::state::DesktopState;

/// An invariant violation with details
#[derive(Clone, Debug)]
pub struct InvariantViolation {
    /// Name of the violated invariant
    pub invariant: &'static str,
    /// Description of what went wrong
    pub description: String,
}

/// Check all desktop invariants.
///
/// Returns a list of violations (empty if all invariants hold).
pub fn check_invariants(state: &DesktopState) -> Vec<InvariantViolation> {
    let mut violations = Vec::new();

    violations.extend(check_spaces(state));
    violations.extend(check_window_ownership(state));
    violations.extend(check_unique_ids(state));
    violations.extend(check_unique_z_order(state));
    violations.extend(check_active_window(state));

    violations
}

/// Invariants 1 and 2
fn check_spaces(state: &DesktopState) -> Vec<InvariantViolation> {
    let mut violations = Vec::new();

    if state.spaces.is_empty() {
        violations.push(InvariantViolation {
            invariant: "spaces_exist",
            description: "Desktop has no spaces".to_string(),
        });
    }

    if !state.has_space(state.current_space) {
        violations.push(InvariantViolation {
            invariant: "current_space",
            description: format!("Current space {} does not exist", state.current_space),
        });
    }

    violations
}

/// Invariant 3
fn check_window_ownership(state: &DesktopState) -> Vec<InvariantViolation> {
    state
        .windows
        .iter()
        .filter(|w| !state.has_space(w.space))
        .map(|w| InvariantViolation {
            invariant: "window_ownership",
            description: format!("Window {} belongs to non-existent space {}", w.id, w.space),
        })
        .collect()
}

/// Invariant 4
fn check_unique_ids(state: &DesktopState) -> Vec<InvariantViolation> {
    let mut violations = Vec::new();

    let mut seen = HashSet::new();
    for window in &state.windows {
        if !seen.insert(window.id.as_str()) {
            violations.push(InvariantViolation {
                invariant: "unique_ids",
                description: format!("Duplicate window id {}", window.id),
            });
        }
    }

    let mut seen = HashSet::new();
    for space in &state.spaces {
        if !seen.insert(space.id) {
            violations.push(InvariantViolation {
                invariant: "unique_ids",
                description: format!("Duplicate space id {}", space.id),
            });
        }
    }

    violations
}

/// Invariant 5
fn check_unique_z_order(state: &DesktopState) -> Vec<InvariantViolation> {
    let mut violations = Vec::new();
    let mut seen = HashSet::new();

    for window in &state.windows {
        if !seen.insert(window.z_order) {
            violations.push(InvariantViolation {
                invariant: "unique_z_order",
                description: format!(
                    "Window {} reuses z-order {}",
                    window.id, window.z_order
                ),
            });
        }
    }

    violations
}

/// Invariant 6
fn check_active_window(state: &DesktopState) -> Vec<InvariantViolation> {
    match state.active_window.as_deref() {
        Some(id) if state.window(id).is_none() => vec![InvariantViolation {
            invariant: "active_window",
            description: format!("Active window {} is not open", id),
        }],
        _ => Vec::new(),
    }
}
