//! Window management driven through the kernel

use std::cell::RefCell;
use std::rc::Rc;

use ncos_kernel::bus::{channels, KernelEvent};
use ncos_kernel::desktop::{DesktopCommand, Rect, ResizeEdge, Size, SnapState, Vec2, MIN_SIZE};
use ncos_kernel::{HostStatus, Kernel, KernelConfig};
use serde_json::Value;

async fn boot() -> Rc<Kernel> {
    let _ = env_logger::builder().is_test(true).try_init();
    Kernel::boot(KernelConfig::default()).await.unwrap()
}

#[tokio::test]
async fn test_drag_into_left_zone_snaps() {
    let kernel = boot().await;
    let host = kernel.launch("calc", Value::Null).unwrap();
    let id = host.window_id().to_string();

    let updates = Rc::new(RefCell::new(Vec::new()));
    let seen = Rc::clone(&updates);
    let _sub = kernel
        .bus()
        .subscribe(channels::WIN_UPDATE, move |event| {
            seen.borrow_mut().push(event.payload.clone())
        })
        .unwrap();

    let start = kernel.window(&id).unwrap().position;
    let mut gesture = kernel
        .begin_move(&id, Vec2::new(start.x + 40.0, start.y + 10.0))
        .unwrap();
    gesture.update(Vec2::new(300.0, 300.0));
    gesture.update(Vec2::new(5.0, 300.0));
    assert_eq!(gesture.preview().map(|(zone, _)| zone), Some(SnapState::Left));
    // Dragging alone touches nothing.
    assert_eq!(kernel.window(&id).unwrap().position, start);

    let results = kernel.finish_gesture(gesture);
    assert_eq!(results.len(), 1);
    assert!(results[0].is_ok());

    let window = kernel.window(&id).unwrap();
    assert_eq!(window.snap, SnapState::Left);
    assert_eq!(window.rect(), Rect::new(0.0, 0.0, 640.0, 672.0));
    assert_eq!(
        updates.borrow().as_slice(),
        &[KernelEvent::WindowUpdated { window_id: id.clone() }]
    );
    assert!(kernel.is_dirty());
}

#[tokio::test]
async fn test_resize_is_clamped() {
    let kernel = boot().await;
    let host = kernel.launch("textpad", Value::Null).unwrap();
    let id = host.window_id().to_string();
    let rect = kernel.window(&id).unwrap().rect();

    let grab = Vec2::new(rect.right(), rect.bottom());
    let mut gesture = kernel
        .begin_resize(&id, ResizeEdge::SE, grab)
        .unwrap();
    gesture.update(Vec2::new(rect.x, rect.y));
    for result in kernel.finish_gesture(gesture) {
        result.unwrap();
    }

    let window = kernel.window(&id).unwrap();
    assert_eq!(window.size, MIN_SIZE);
    assert_eq!(window.position, rect.position());
}

#[tokio::test]
async fn test_spaces_suspend_hosts() {
    let kernel = boot().await;
    let first = kernel.launch("calc", Value::Null).unwrap();

    kernel
        .dispatch(DesktopCommand::AddSpace { label: None })
        .unwrap();
    let second = kernel.launch("sysmon", Value::Null).unwrap();
    assert_eq!(first.status(), HostStatus::Suspended);
    assert_eq!(second.status(), HostStatus::Active);

    kernel.dispatch(DesktopCommand::SetSpace { id: 1 }).unwrap();
    assert_eq!(second.status(), HostStatus::Suspended);
    assert_ne!(first.status(), HostStatus::Suspended);

    let view = first.system_view();
    assert_eq!(view.spaces.len(), 2);
    assert_eq!(view.current_space, 1);
}

#[tokio::test]
async fn test_queued_commands_apply_in_order() {
    let kernel = boot().await;
    let host = kernel.launch("calc", Value::Null).unwrap();
    let id = host.window_id().to_string();

    kernel.enqueue(DesktopCommand::Move {
        id: id.clone(),
        position: Vec2::new(10.0, 10.0),
    });
    kernel.enqueue(DesktopCommand::Close { id: "missing".into() });
    kernel.enqueue(DesktopCommand::Resize {
        id: id.clone(),
        size: Size::new(400.0, 300.0),
    });

    let results = kernel.drain();
    assert_eq!(results.len(), 3);
    assert!(results[0].is_ok());
    assert!(results[1].as_ref().unwrap_err().is_not_found());
    assert!(results[2].is_ok());

    let window = kernel.window(&id).unwrap();
    assert_eq!(window.rect(), Rect::new(10.0, 10.0, 400.0, 300.0));
}

#[tokio::test]
async fn test_viewport_change_is_not_saved() {
    let kernel = boot().await;
    let host = kernel.launch("calc", Value::Null).unwrap();
    let id = host.window_id().to_string();
    kernel
        .dispatch(DesktopCommand::ToggleMaximize { id: id.clone() })
        .unwrap();
    kernel.flush().await.unwrap();

    kernel.set_viewport(Size::new(1000.0, 600.0)).unwrap();
    let state = kernel.desktop_state();
    assert_eq!(state.layout.viewport, Size::new(1000.0, 600.0));
    assert_eq!(state.layout.work_area(), Rect::new(0.0, 0.0, 1000.0, 552.0));
    assert!(state.window(&id).unwrap().maximized);
    assert!(!kernel.is_dirty());
}
