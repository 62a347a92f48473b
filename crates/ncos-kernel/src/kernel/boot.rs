//! Kernel boot, snapshot restore and shutdown.
//!
//! Boot order:
//!
//! 1. Event bus with configured limits
//! 2. VFS and snapshot store (on disk under `state_dir`, else in memory)
//! 3. Crash boundary on `err:*`, dirty tracking on `fs:change`
//! 4. Restore desktop, grants and app storage from the last snapshot
//! 5. Publish `sys:boot`

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use ncos_bus::{channels, ErrorReport, EventBus, KernelEvent};
use ncos_desktop::{DesktopManager, DesktopState};
use ncos_perm::PermissionBroker;
use ncos_vfs::Vfs;

use super::{Kernel, PersistState};
use crate::clipboard::Clipboard;
use crate::config::KernelConfig;
use crate::error::KernelError;
use crate::persistence::{
    FileSnapshotStore, MemorySnapshotStore, SnapshotStore, SystemSnapshot,
};
use crate::recovery::CrashBoundary;
use crate::registry::AppRegistry;
use crate::storage::AppStorage;

/// Snapshot file name under `state_dir`
pub const SNAPSHOT_FILE: &str = "snapshot.json";

/// VFS store directory under `state_dir`
pub const VFS_DIR: &str = "vfs";

impl Kernel {
    /// Boot with the backends named by the config.
    pub async fn boot(config: KernelConfig) -> Result<Rc<Self>, KernelError> {
        let bus = EventBus::with_limits(config.bus_limits());

        let (vfs, snapshots): (Vfs, Rc<dyn SnapshotStore>) = match &config.state_dir {
            Some(dir) => {
                log::info!(target: "kernel", "state directory {}", dir.display());
                let vfs = Vfs::on_disk(dir.join(VFS_DIR), bus.clone()).await?;
                let store = FileSnapshotStore::new(dir.join(SNAPSHOT_FILE));
                (vfs, Rc::new(store))
            }
            None => {
                let vfs = Vfs::in_memory(bus.clone()).await;
                (vfs, Rc::new(MemorySnapshotStore::new()))
            }
        };

        Self::boot_with(config, bus, Rc::new(vfs), snapshots).await
    }

    /// Boot over explicit backends. `vfs` must publish on `bus`; the
    /// config's bus limits are not applied here.
    pub async fn boot_with(
        config: KernelConfig,
        bus: EventBus,
        vfs: Rc<Vfs>,
        snapshots: Rc<dyn SnapshotStore>,
    ) -> Result<Rc<Self>, KernelError> {
        let crash = CrashBoundary::install(&bus)?;

        let persist = Rc::new(PersistState::default());
        let watcher = Rc::clone(&persist);
        let fs_watch = bus.subscribe(channels::FS_CHANGE, move |_| watcher.touch())?;

        let registry = AppRegistry::with_factory_apps(&config.allowed_apps);
        let desktop = DesktopManager::new(DesktopState::new(config.layout()));

        let kernel = Rc::new(Self {
            broker: RefCell::new(PermissionBroker::new(bus.clone())),
            desktop: RefCell::new(desktop),
            registry: RefCell::new(registry),
            clipboard: RefCell::new(Clipboard::new()),
            storage: RefCell::new(AppStorage::new()),
            vfs,
            snapshots,
            persist,
            crash,
            fs_watch: Some(fs_watch),
            shut_down: Cell::new(false),
            bus,
            config,
        });

        kernel.restore().await;
        kernel.persist.mark_clean();

        log::info!(
            target: "kernel",
            "booted: {} windows, {} nodes, {} apps",
            kernel.desktop.borrow().state().windows.len(),
            kernel.vfs.nodes().len(),
            kernel.registry.borrow().apps().len()
        );
        kernel.bus.publish(channels::SYS_BOOT, KernelEvent::Boot);
        Ok(kernel)
    }

    /// Load the last snapshot into the desktop, broker and app storage.
    ///
    /// Nodes from the snapshot seed the VFS only when its own store came up
    /// empty (just root); otherwise the VFS store is authoritative. An
    /// unreadable snapshot is reported and the session starts fresh.
    pub(crate) async fn restore(&self) {
        let snapshot = match self.snapshots.load().await {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                log::info!(target: "kernel", "no snapshot, starting fresh");
                SystemSnapshot::default()
            }
            Err(e) => {
                self.report_storage_failure("kernel.restore", &e);
                SystemSnapshot::default()
            }
        };

        let state = DesktopState::from_snapshot(snapshot.desktop_snapshot(), self.config.layout())
            .unwrap_or_else(|e| {
                log::warn!(target: "kernel", "discarding desktop snapshot: {}", e);
                self.bus.publish(
                    channels::ERR_KERNEL,
                    KernelEvent::Error(ErrorReport::new("kernel", e.to_string())),
                );
                DesktopState::new(self.config.layout())
            });
        self.desktop.borrow_mut().replace(state);
        self.broker.borrow_mut().restore(snapshot.permissions.clone());
        *self.storage.borrow_mut() = snapshot.app_storage.clone();

        if self.vfs.nodes().len() <= 1 && snapshot.fs_nodes.len() > 1 {
            log::info!(
                target: "kernel",
                "seeding filesystem with {} nodes from snapshot",
                snapshot.fs_nodes.len()
            );
            self.vfs.replace_all(snapshot.nodes()).await;
        }
    }

    /// Flush pending changes and publish `sys:shutdown`. Idempotent.
    pub async fn shutdown(&self) -> Result<(), KernelError> {
        if self.shut_down.replace(true) {
            return Ok(());
        }
        let result = if self.is_dirty() {
            self.flush().await
        } else {
            Ok(())
        };
        log::info!(target: "kernel", "shutdown");
        self.bus.publish(channels::SYS_SHUTDOWN, KernelEvent::Shutdown);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ncos_desktop::{DesktopCommand, WindowConfig};

    #[tokio::test]
    async fn test_fresh_boot() {
        let kernel = Kernel::boot(KernelConfig::default()).await.unwrap();
        assert!(kernel.vfs().exists("root"));
        assert_eq!(kernel.desktop_state().spaces.len(), 1);
        assert!(!kernel.is_dirty());
        assert_eq!(kernel.bus().history()[0].channel, channels::SYS_BOOT);
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_starts_fresh() {
        let bus = EventBus::new();
        let vfs = Rc::new(Vfs::in_memory(bus.clone()).await);
        let store = Rc::new(MemorySnapshotStore::new());
        store.set_raw("{ broken");

        let kernel = Kernel::boot_with(KernelConfig::default(), bus, vfs, store)
            .await
            .unwrap();
        assert!(kernel.desktop_state().windows.is_empty());
        assert_eq!(kernel.crash_boundary().error_count(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_flushes_once() {
        let bus = EventBus::new();
        let vfs = Rc::new(Vfs::in_memory(bus.clone()).await);
        let store = Rc::new(MemorySnapshotStore::new());
        let kernel = Kernel::boot_with(KernelConfig::default(), bus, vfs, store.clone())
            .await
            .unwrap();

        kernel
            .dispatch(DesktopCommand::Open(WindowConfig::new("w", "calc")))
            .unwrap();
        kernel.shutdown().await.unwrap();
        kernel.shutdown().await.unwrap();

        assert_eq!(store.saves(), 1);
        assert!(kernel.is_shut_down());
        assert!(!kernel.is_dirty());
    }
}
