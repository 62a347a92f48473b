//! The kernel: owns every subsystem and is the only writer of their state.
//!
//! The kernel lives on a single cooperative event loop. Subsystems sit in
//! `RefCell`s; no borrow is held across an `.await` or while handlers run,
//! so bus handlers may call back into the kernel. Broker calls publish from
//! inside their borrow, so they run under a [`PublishHold`] that delivers
//! once the borrow is gone.
//!
//! [`PublishHold`]: ncos_bus::PublishHold
//!
//! The `impl Kernel` blocks are split by concern:
//!
//! - `mod.rs`: desktop dispatch, permissions, registry, read-only views
//! - `boot.rs`: boot, snapshot restore, shutdown
//! - `persist.rs`: dirty tracking, autosave, bundles, recovery

mod boot;
mod persist;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use ncos_bus::{AuditEntry, EventBus, Subscription};
use ncos_desktop::{
    Commit, DesktopCommand, DesktopManager, DesktopState, DragGesture, ResizeEdge, Size, Space,
    SpaceId, StepOutcome, StepResult, Vec2, Window, WindowConfig, WindowId,
};
use ncos_perm::{
    Capability, CorrelationId, Decision, GrantTable, PendingInfo, PermissionBroker,
    PermissionStatus, PermissionTicket, ResolvedRequest,
};
use ncos_vfs::Vfs;
use serde::Serialize;
use serde_json::Value;

use crate::clipboard::Clipboard;
use crate::config::KernelConfig;
use crate::error::KernelError;
use crate::events::commit_event;
use crate::host::AppHost;
use crate::persistence::SnapshotStore;
use crate::recovery::CrashBoundary;
use crate::registry::{AppManifest, AppRegistry};
use crate::storage::AppStorage;

pub use boot::{SNAPSHOT_FILE, VFS_DIR};
use persist::PersistState;

/// Read-only view handed to hosted applications
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SystemView {
    pub windows: Vec<Window>,
    pub spaces: Vec<Space>,
    pub current_space: SpaceId,
    pub active_window: Option<WindowId>,
    pub grants: GrantTable,
}

/// The desktop kernel
pub struct Kernel {
    config: KernelConfig,
    bus: EventBus,
    broker: RefCell<PermissionBroker>,
    vfs: Rc<Vfs>,
    desktop: RefCell<DesktopManager>,
    registry: RefCell<AppRegistry>,
    clipboard: RefCell<Clipboard>,
    storage: RefCell<AppStorage>,
    snapshots: Rc<dyn SnapshotStore>,
    persist: Rc<PersistState>,
    crash: CrashBoundary,
    /// `fs:change` listener feeding the dirty flag
    fs_watch: Option<Subscription>,
    shut_down: Cell<bool>,
}

impl Kernel {
    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn vfs(&self) -> &Vfs {
        &self.vfs
    }

    pub fn crash_boundary(&self) -> &CrashBoundary {
        &self.crash
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.get()
    }

    // ========================================================================
    // Window & space manager
    // ========================================================================

    /// Apply a desktop command now.
    pub fn dispatch(&self, command: DesktopCommand) -> Result<StepOutcome, KernelError> {
        let result = self.desktop.borrow_mut().dispatch(command);
        self.commit(result)
    }

    /// Queue a command for the next [`drain`](Self::drain).
    pub fn enqueue(&self, command: DesktopCommand) {
        self.desktop.borrow_mut().enqueue(command);
    }

    /// Apply queued commands in FIFO order.
    pub fn drain(&self) -> Vec<Result<StepOutcome, KernelError>> {
        let results = self.desktop.borrow_mut().drain();
        results.into_iter().map(|r| self.commit(r)).collect()
    }

    pub fn begin_move(&self, window_id: &str, pointer: Vec2) -> Result<DragGesture, KernelError> {
        Ok(self.desktop.borrow().begin_move(window_id, pointer)?)
    }

    pub fn begin_resize(
        &self,
        window_id: &str,
        edge: ResizeEdge,
        pointer: Vec2,
    ) -> Result<DragGesture, KernelError> {
        Ok(self.desktop.borrow().begin_resize(window_id, edge, pointer)?)
    }

    /// Commit the final geometry of a gesture.
    pub fn finish_gesture(&self, gesture: DragGesture) -> Vec<Result<StepOutcome, KernelError>> {
        let results = self.desktop.borrow_mut().finish_gesture(gesture);
        results.into_iter().map(|r| self.commit(r)).collect()
    }

    pub fn set_viewport(&self, size: Size) -> Result<StepOutcome, KernelError> {
        self.dispatch(DesktopCommand::SetViewport { size })
    }

    /// Copy of the window and space state
    pub fn desktop_state(&self) -> DesktopState {
        self.desktop.borrow().state().clone()
    }

    pub fn window(&self, window_id: &str) -> Option<Window> {
        self.desktop.borrow().state().window(window_id).cloned()
    }

    /// Announce commits and mark durable changes. Runs with the desktop
    /// borrow released.
    fn commit(&self, result: StepResult) -> Result<StepOutcome, KernelError> {
        if result.commits.iter().any(Commit::is_durable) {
            self.mark_dirty();
        }
        for commit in &result.commits {
            if let Some((channel, event)) = commit_event(commit) {
                self.bus.publish(channel, event);
            }
        }
        Ok(result.outcome?)
    }

    // ========================================================================
    // Permissions
    // ========================================================================

    pub fn check_permission(&self, app_id: &str, capability: &Capability) -> PermissionStatus {
        self.broker.borrow().check(app_id, capability)
    }

    /// Ask for a capability. The ticket completes once
    /// [`resolve_permission`](Self::resolve_permission) delivers a decision.
    ///
    /// A `sys:permission_request` handler may resolve the prompt right away.
    pub fn request_permission(&self, app_id: &str, capability: &Capability) -> PermissionTicket {
        let _hold = self.bus.hold();
        // The broker borrow must end before the hold releases.
        let ticket = self.broker.borrow_mut().request(app_id, capability);
        ticket
    }

    /// Deliver the user's decision for an outstanding prompt.
    pub fn resolve_permission(
        &self,
        correlation_id: &CorrelationId,
        decision: Decision,
    ) -> Result<ResolvedRequest, KernelError> {
        let _hold = self.bus.hold();
        let resolved = self.broker.borrow_mut().resolve(correlation_id, decision)?;
        self.mark_dirty();
        Ok(resolved)
    }

    pub fn cancel_permission(&self, correlation_id: &CorrelationId) -> Result<(), KernelError> {
        let _hold = self.bus.hold();
        let cancelled = self.broker.borrow_mut().cancel(correlation_id);
        Ok(cancelled?)
    }

    /// Drop waiters that gave up on a prompt. The prompt is cancelled once
    /// none remain; returns whether that happened.
    pub fn detach_permission(&self, correlation_id: &CorrelationId) -> Result<bool, KernelError> {
        let _hold = self.bus.hold();
        let cancelled = self.broker.borrow_mut().detach(correlation_id);
        Ok(cancelled?)
    }

    pub fn set_permission(&self, app_id: &str, capability: &Capability, decision: Decision) {
        let _hold = self.bus.hold();
        self.broker.borrow_mut().set(app_id, capability, decision);
        self.mark_dirty();
    }

    /// Forget a decision. Returns whether one was recorded.
    pub fn revoke_permission(&self, app_id: &str, capability: &Capability) -> bool {
        let _hold = self.bus.hold();
        let removed = self.broker.borrow_mut().revoke(app_id, capability);
        if removed {
            self.mark_dirty();
        }
        removed
    }

    pub fn pending_permissions(&self) -> Vec<PendingInfo> {
        self.broker.borrow().pending()
    }

    pub fn grants(&self) -> GrantTable {
        self.broker.borrow().grants().clone()
    }

    pub fn audit_log(&self, limit: usize) -> Vec<AuditEntry> {
        self.bus.audit_entries(limit)
    }

    // ========================================================================
    // Applications
    // ========================================================================

    pub fn register_app(&self, manifest: AppManifest) -> Result<(), KernelError> {
        Ok(self.registry.borrow_mut().register(manifest)?)
    }

    pub fn app(&self, app_id: &str) -> Option<AppManifest> {
        self.registry.borrow().get(app_id).cloned()
    }

    pub fn apps(&self) -> Vec<AppManifest> {
        self.registry.borrow().apps().to_vec()
    }

    pub fn resolve_file_handler(&self, name: &str, mime: Option<&str>) -> Option<String> {
        self.registry
            .borrow()
            .resolve_file_handler(name, mime)
            .map(str::to_string)
    }

    /// Open a new window for a registered app and return its host.
    pub fn launch(self: &Rc<Self>, app_id: &str, payload: Value) -> Result<AppHost, KernelError> {
        let manifest = self
            .app(app_id)
            .ok_or_else(|| KernelError::NotFound(format!("app {}", app_id)))?;
        let window_id = format!("{}-{}", manifest.id, uuid::Uuid::new_v4().simple());

        self.dispatch(DesktopCommand::Open(
            WindowConfig::new(window_id.clone(), manifest.id.clone())
                .with_title(manifest.name.clone())
                .with_payload(payload),
        ))?;
        log::info!(target: "kernel", "launched {} in {}", manifest.id, window_id);
        Ok(AppHost::new(Rc::clone(self), manifest.id, window_id))
    }

    /// Host for an existing window (after a restore, for instance).
    pub fn attach(self: &Rc<Self>, window_id: &str) -> Result<AppHost, KernelError> {
        let window = self
            .window(window_id)
            .ok_or_else(|| KernelError::NotFound(format!("window {}", window_id)))?;
        if self.app(&window.kind).is_none() {
            return Err(KernelError::NotFound(format!("app {}", window.kind)));
        }
        Ok(AppHost::new(Rc::clone(self), window.kind, window.id))
    }

    /// Launch the app registered for a file, passing the node id.
    pub fn open_file(self: &Rc<Self>, node_id: &str) -> Result<AppHost, KernelError> {
        let node = self.vfs.get_node(node_id)?;
        let app_id = self
            .resolve_file_handler(&node.name, node.mime.as_deref())
            .ok_or_else(|| KernelError::NotFound(format!("handler for {}", node.name)))?;
        self.launch(&app_id, serde_json::json!({ "node_id": node.id }))
    }

    // ========================================================================
    // Clipboard and app storage (ungated; the host applies capabilities)
    // ========================================================================

    pub(crate) fn clipboard_read(&self) -> Option<String> {
        self.clipboard.borrow().read().map(str::to_string)
    }

    pub(crate) fn clipboard_write(&self, app_id: &str, text: &str) {
        self.clipboard.borrow_mut().write(app_id, text);
    }

    pub(crate) fn storage_get(&self, app_id: &str, key: &str) -> Option<String> {
        self.storage.borrow().get(app_id, key).map(str::to_string)
    }

    pub(crate) fn storage_set(&self, app_id: &str, key: &str, value: &str) {
        self.storage.borrow_mut().set(app_id, key, value);
        self.mark_dirty();
    }

    pub(crate) fn storage_remove(&self, app_id: &str, key: &str) -> Option<String> {
        let removed = self.storage.borrow_mut().remove(app_id, key);
        if removed.is_some() {
            self.mark_dirty();
        }
        removed
    }

    /// Read-only snapshot of windows, spaces and grants
    pub fn system_view(&self) -> SystemView {
        let desktop = self.desktop.borrow();
        let state = desktop.state();
        SystemView {
            windows: state.windows.clone(),
            spaces: state.spaces.clone(),
            current_space: state.current_space,
            active_window: state.active_window.clone(),
            grants: self.broker.borrow().grants().clone(),
        }
    }
}

impl Drop for Kernel {
    fn drop(&mut self) {
        if let Some(subscription) = self.fs_watch.take() {
            subscription.unsubscribe();
        }
    }
}
