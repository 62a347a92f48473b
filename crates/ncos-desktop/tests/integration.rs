//! Integration tests for the window and space manager
//!
//! These tests drive the manager through full workflows:
//! - Window lifecycle (open, focus, minimize, maximize, close)
//! - Z-order monotonicity across many operations
//! - Space add/remove/switch with window migration
//! - Snap gestures followed by manual geometry changes
//! - Snapshot save and restore

use ncos_desktop::{
    check_invariants, Commit, DesktopCommand, DesktopManager, DesktopSnapshot, DesktopState,
    Rect, ResizeEdge, Size, SnapLayout, SnapState, StepOutcome, Vec2, WindowConfig,
};

fn open(manager: &mut DesktopManager, id: &str) {
    let result = manager.dispatch(DesktopCommand::Open(WindowConfig::new(id, "app")));
    assert!(result.is_ok());
}

fn assert_consistent(manager: &DesktopManager) {
    let violations = check_invariants(manager.state());
    assert!(violations.is_empty(), "invariant violations: {:?}", violations);
}

// =============================================================================
// Window Lifecycle Tests
// =============================================================================

#[test]
fn test_z_order_strictly_increases() {
    let mut manager = DesktopManager::default();
    open(&mut manager, "a");
    open(&mut manager, "b");
    open(&mut manager, "c");

    let mut last = 0;
    for id in ["b", "a", "c", "b"] {
        manager.dispatch(DesktopCommand::Focus { id: id.into() });
        let z = manager.state().window(id).unwrap().z_order;
        assert!(z > last, "{} got z {} after {}", id, z, last);
        last = z;
    }
    assert_consistent(&manager);
}

#[test]
fn test_reopen_does_not_duplicate() {
    let mut manager = DesktopManager::default();
    open(&mut manager, "calc");
    open(&mut manager, "notes");

    let result = manager.dispatch(DesktopCommand::Open(WindowConfig::new("calc", "calc")));
    assert_eq!(result.outcome, Ok(StepOutcome::Window("calc".into())));
    assert_eq!(manager.state().windows.len(), 2);
    assert_eq!(manager.state().active_window.as_deref(), Some("calc"));
}

#[test]
fn test_close_reassigns_focus_within_space() {
    let mut manager = DesktopManager::default();
    open(&mut manager, "low");
    open(&mut manager, "mid");
    open(&mut manager, "top");

    let result = manager.dispatch(DesktopCommand::Close { id: "top".into() });
    assert!(result
        .commits
        .contains(&Commit::ActiveChanged { id: Some("mid".into()) }));
    assert_eq!(manager.state().active_window.as_deref(), Some("mid"));
    assert_consistent(&manager);
}

#[test]
fn test_failed_command_changes_nothing() {
    let mut manager = DesktopManager::default();
    open(&mut manager, "a");
    let before = manager.state().clone();

    let result = manager.dispatch(DesktopCommand::Move {
        id: "missing".into(),
        position: Vec2::new(1.0, 1.0),
    });
    assert!(result.outcome.unwrap_err().is_not_found());
    assert!(result.commits.is_empty());
    assert_eq!(manager.state(), &before);
}

// =============================================================================
// Space Tests
// =============================================================================

#[test]
fn test_remove_space_moves_windows_to_first_space() {
    let mut manager = DesktopManager::default();
    open(&mut manager, "home");
    manager.dispatch(DesktopCommand::AddSpace { label: Some("Work".into()) });
    open(&mut manager, "w1");
    open(&mut manager, "w2");
    manager.dispatch(DesktopCommand::AddSpace { label: None });
    manager.dispatch(DesktopCommand::SetSpace { id: 2 });

    manager.dispatch(DesktopCommand::RemoveSpace { id: 2 });

    let state = manager.state();
    assert_eq!(state.current_space, 1);
    assert!(state.windows.iter().all(|w| w.space == 1));
    assert_eq!(state.spaces.len(), 2);
    assert_consistent(&manager);
}

#[test]
fn test_cannot_remove_last_space() {
    let mut manager = DesktopManager::default();
    open(&mut manager, "a");
    let result = manager.dispatch(DesktopCommand::RemoveSpace { id: 1 });
    assert_eq!(result.outcome, Ok(StepOutcome::NoOp));
    assert_eq!(manager.state().spaces.len(), 1);
}

#[test]
fn test_visible_windows_follow_current_space() {
    let mut manager = DesktopManager::default();
    open(&mut manager, "a");
    manager.dispatch(DesktopCommand::AddSpace { label: None });
    open(&mut manager, "b");

    let ids: Vec<_> = manager
        .state()
        .visible_windows()
        .iter()
        .map(|w| w.id.clone())
        .collect();
    assert_eq!(ids, vec!["b".to_string()]);

    manager.dispatch(DesktopCommand::SetSpace { id: 1 });
    let ids: Vec<_> = manager
        .state()
        .visible_windows()
        .iter()
        .map(|w| w.id.clone())
        .collect();
    assert_eq!(ids, vec!["a".to_string()]);
}

// =============================================================================
// Snap Tests
// =============================================================================

#[test]
fn test_snap_left_then_resize_clears_snap() {
    let mut manager = DesktopManager::new(DesktopState::new(SnapLayout::new(Size::new(
        1280.0, 720.0,
    ))));
    manager.dispatch(DesktopCommand::Open(
        WindowConfig::new("w", "app").with_geometry(Vec2::new(300.0, 200.0), Size::new(400.0, 300.0)),
    ));

    let mut drag = manager.begin_move("w", Vec2::new(400.0, 210.0)).unwrap();
    drag.update(Vec2::new(200.0, 300.0));
    assert!(drag.preview().is_none());
    drag.update(Vec2::new(12.0, 300.0));

    let (zone, preview) = drag.preview().unwrap();
    assert_eq!(zone, SnapState::Left);
    assert!(preview.approx_eq(&Rect::new(0.0, 0.0, 640.0, 672.0), 0.001));

    manager.finish_gesture(drag);
    let w = manager.state().window("w").unwrap();
    assert_eq!(w.snap, SnapState::Left);
    assert!(w.rect().approx_eq(&Rect::new(0.0, 0.0, 640.0, 672.0), 0.001));
    assert!(w
        .pre_snap
        .unwrap()
        .approx_eq(&Rect::new(300.0, 200.0, 400.0, 300.0), 0.001));

    let mut resize = manager
        .begin_resize("w", ResizeEdge::E, Vec2::new(640.0, 300.0))
        .unwrap();
    resize.update(Vec2::new(600.0, 300.0));
    manager.finish_gesture(resize);

    let w = manager.state().window("w").unwrap();
    assert_eq!(w.snap, SnapState::None);
    assert!((w.size.width - 600.0).abs() < 0.001);
}

#[test]
fn test_drop_outside_zone_moves() {
    let mut manager = DesktopManager::default();
    open(&mut manager, "w");
    let start = manager.state().window("w").unwrap().position;

    let mut drag = manager.begin_move("w", start + Vec2::new(10.0, 10.0)).unwrap();
    drag.update(Vec2::new(410.0, 310.0));
    let results = manager.finish_gesture(drag);

    assert_eq!(results.len(), 1);
    assert!(results[0]
        .commits
        .contains(&Commit::WindowMoved { id: "w".into() }));
    let w = manager.state().window("w").unwrap();
    assert!(w.position.approx_eq(Vec2::new(400.0, 300.0), 0.001));
    assert_eq!(w.snap, SnapState::None);
}

#[test]
fn test_top_edge_snaps_to_work_area() {
    let mut manager = DesktopManager::default();
    open(&mut manager, "w");

    let mut drag = manager.begin_move("w", Vec2::new(120.0, 110.0)).unwrap();
    drag.update(Vec2::new(640.0, 4.0));
    manager.finish_gesture(drag);

    let w = manager.state().window("w").unwrap();
    assert_eq!(w.snap, SnapState::Maximized);
    assert!(!w.maximized);
    assert!(w.rect().approx_eq(&manager.state().layout.work_area(), 0.001));
}

// =============================================================================
// Persistence Tests
// =============================================================================

#[test]
fn test_snapshot_restore_keeps_geometry_and_spaces() {
    let mut manager = DesktopManager::default();
    open(&mut manager, "a");
    manager.dispatch(DesktopCommand::ToggleMaximize { id: "a".into() });
    manager.dispatch(DesktopCommand::AddSpace { label: Some("Media".into()) });
    open(&mut manager, "b");
    manager.dispatch(DesktopCommand::ToggleMinimize { id: "b".into() });

    let json = serde_json::to_string(&manager.snapshot()).unwrap();
    let snapshot: DesktopSnapshot = serde_json::from_str(&json).unwrap();
    let restored = DesktopManager::from_snapshot(snapshot, SnapLayout::default()).unwrap();

    assert_eq!(restored.state(), manager.state());
    assert!(restored.state().window("a").unwrap().maximized);
    assert!(restored.state().window("b").unwrap().minimized);
    assert_eq!(restored.state().space(2).unwrap().label, "Media");
}
