//! Snapshot persistence across kernel restarts

use std::rc::Rc;
use std::time::Duration;

use ncos_kernel::bus::{channels, AuditOutcome, EventBus};
use ncos_kernel::desktop::{DesktopCommand, WindowConfig};
use ncos_kernel::perm::{Capability, Decision, PermissionStatus};
use ncos_kernel::vfs::Vfs;
use ncos_kernel::{Kernel, KernelConfig, MemorySnapshotStore};
use serde_json::Value;

async fn boot_over(store: &Rc<MemorySnapshotStore>) -> Rc<Kernel> {
    let _ = env_logger::builder().is_test(true).try_init();
    let bus = EventBus::new();
    let vfs = Rc::new(Vfs::in_memory(bus.clone()).await);
    Kernel::boot_with(KernelConfig::default(), bus, vfs, store.clone())
        .await
        .unwrap()
}

fn open(kernel: &Kernel, id: &str) {
    kernel
        .dispatch(DesktopCommand::Open(WindowConfig::new(id, "calc")))
        .unwrap();
}

#[tokio::test]
async fn test_state_survives_restart() {
    let store = Rc::new(MemorySnapshotStore::new());

    let first = boot_over(&store).await;
    first.launch("textpad", Value::Null).unwrap();
    first
        .dispatch(DesktopCommand::AddSpace {
            label: Some("Work".into()),
        })
        .unwrap();
    first.set_permission("textpad", &Capability::FILES_WRITE, Decision::Granted);
    let calc = first.launch("calc", Value::Null).unwrap();
    calc.storage_set("memory", "42");
    let note = first.vfs().create_file("root", "a.txt", b"hi").await.unwrap();
    first.shutdown().await.unwrap();
    let before = first.desktop_state();

    let second = boot_over(&store).await;
    let after = second.desktop_state();
    assert_eq!(after.windows, before.windows);
    assert_eq!(after.spaces, before.spaces);
    assert_eq!(after.current_space, before.current_space);
    assert_eq!(after.active_window, before.active_window);
    assert_eq!(
        second.check_permission("textpad", &Capability::FILES_WRITE),
        PermissionStatus::Granted
    );

    // Node metadata is seeded into the empty filesystem.
    assert!(second.vfs().exists(&note.id));
    let host = second.attach(calc.window_id()).unwrap();
    assert_eq!(host.storage_get("memory").as_deref(), Some("42"));
    assert!(!second.is_dirty());
}

#[tokio::test(start_paused = true)]
async fn test_save_waits_for_debounce() {
    let store = Rc::new(MemorySnapshotStore::new());
    let kernel = boot_over(&store).await;

    open(&kernel, "w1");
    assert!(kernel.is_dirty());
    assert!(!kernel.persist_if_due().await);

    tokio::time::advance(Duration::from_millis(300)).await;
    // A second change restarts the window.
    open(&kernel, "w2");
    tokio::time::advance(Duration::from_millis(300)).await;
    assert!(!kernel.persist_if_due().await);

    tokio::time::advance(Duration::from_millis(200)).await;
    assert!(kernel.persist_if_due().await);
    assert_eq!(store.saves(), 1);
    assert!(!kernel.is_dirty());
    assert!(!kernel.persist_if_due().await);
}

#[tokio::test(start_paused = true)]
async fn test_autosave_flushes_after_changes() {
    let store = Rc::new(MemorySnapshotStore::new());
    let kernel = boot_over(&store).await;

    tokio::select! {
        _ = kernel.autosave() => unreachable!("autosave runs until shutdown"),
        _ = async {
            open(&kernel, "w1");
            tokio::time::sleep(Duration::from_millis(600)).await;
        } => {}
    }

    assert_eq!(kernel.save_count(), 1);
    assert!(!kernel.is_dirty());
}

#[tokio::test]
async fn test_failed_save_keeps_changes_pending() {
    let store = Rc::new(MemorySnapshotStore::new());
    let kernel = boot_over(&store).await;
    store.set_fail_writes(true);

    open(&kernel, "w1");
    let err = kernel.flush().await.unwrap_err();
    assert!(err.is_storage());
    assert!(kernel.is_dirty());
    assert_eq!(kernel.save_failures(), 1);

    assert!(kernel
        .bus()
        .history()
        .iter()
        .any(|e| e.channel == channels::ERR_STORAGE));
    let entry = kernel
        .audit_log(10)
        .into_iter()
        .find(|e| e.action == "kernel.persist")
        .unwrap();
    assert_eq!(entry.outcome, AuditOutcome::Error);
    // Storage failures are recoverable without user action.
    assert!(kernel.crash_boundary().pending_recovery().is_none());

    store.set_fail_writes(false);
    kernel.flush().await.unwrap();
    assert!(!kernel.is_dirty());
    assert_eq!(store.saves(), 1);
}

#[tokio::test]
async fn test_filesystem_changes_mark_dirty() {
    let store = Rc::new(MemorySnapshotStore::new());
    let kernel = boot_over(&store).await;
    assert!(!kernel.is_dirty());

    kernel.vfs().create_folder("root", "docs").await.unwrap();
    assert!(kernel.is_dirty());
}

#[tokio::test]
async fn test_revoking_nothing_stays_clean() {
    let store = Rc::new(MemorySnapshotStore::new());
    let kernel = boot_over(&store).await;

    assert!(!kernel.revoke_permission("calc", &Capability::SYSTEM_READ));
    assert!(!kernel.is_dirty());

    kernel.set_permission("calc", &Capability::SYSTEM_READ, Decision::Denied);
    assert!(kernel.is_dirty());
}
