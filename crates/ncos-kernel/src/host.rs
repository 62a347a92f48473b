//! App Host: the per-window API surface of a hosted application.
//!
//! Every gated call asks the permission broker first and fails with
//! `PermissionDenied` if the capability is refused, cancelled or times
//! out. Failed checks are not retried; the app has to call again. A timeout
//! only gives up this caller's wait; the prompt stays open while other
//! callers still wait on it.
//!
//! | surface                         | capability        |
//! |---------------------------------|-------------------|
//! | read_file, list_nodes, search   | `files:read`      |
//! | create_file, create_folder, update_file | `files:write` |
//! | delete_node, move_node, rename_node | `files:manage` |
//! | mount_drive, unmount_drive      | `mount:manage`    |
//! | clipboard_read / clipboard_write | `clipboard:read` / `clipboard:write` |
//! | audit_log                       | `system:read`     |
//! | revoke_permission               | `system:config`   |
//! | lifecycle, storage, system_view | none              |

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use ncos_bus::{channels, AuditEntry, AuditOutcome, ErrorReport, Event, KernelEvent, Subscription};
use ncos_desktop::{DesktopCommand, WindowId};
use ncos_perm::{Capability, Decision};
use ncos_vfs::{ExternalHandle, FileEntry, Node, NodeId, SearchHit};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::KernelError;
use crate::kernel::{Kernel, SystemView};

/// Where the host's window stands
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostStatus {
    /// Focused window
    Active,
    /// Visible but not focused
    Background,
    /// Minimized or on another space
    Suspended,
    /// Window no longer exists
    Closed,
}

/// Capability-checked handle for one application window
pub struct AppHost {
    kernel: Rc<Kernel>,
    app_id: String,
    window_id: WindowId,
    crashed: Cell<bool>,
}

impl fmt::Debug for AppHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppHost")
            .field("app_id", &self.app_id)
            .field("window_id", &self.window_id)
            .field("crashed", &self.crashed.get())
            .finish_non_exhaustive()
    }
}

impl AppHost {
    pub(crate) fn new(kernel: Rc<Kernel>, app_id: String, window_id: WindowId) -> Self {
        Self {
            kernel,
            app_id,
            window_id,
            crashed: Cell::new(false),
        }
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    pub fn window_id(&self) -> &str {
        &self.window_id
    }

    /// Payload the window was opened with
    pub fn launch_args(&self) -> Value {
        self.kernel
            .window(&self.window_id)
            .map(|w| w.payload)
            .unwrap_or(Value::Null)
    }

    /// Ask for a capability, waiting for the user if nothing is recorded.
    pub async fn require(&self, capability: &Capability) -> Result<(), KernelError> {
        let ticket = self.kernel.request_permission(&self.app_id, capability);
        let timeout = self.kernel.config().permission_timeout();

        let decision = match (timeout, ticket.correlation_id().cloned()) {
            (Some(limit), Some(correlation_id)) => {
                // The ticket moves into the timer and is dropped with it, closing its waiter.
                let waited = tokio::time::timeout(limit, ticket).await;
                match waited {
                    Ok(decision) => decision,
                    Err(_) => {
                        log::warn!(
                            target: "kernel",
                            "{} timed out waiting for {} after {:?}",
                            self.app_id,
                            capability,
                            limit
                        );
                        // Other callers joined on the prompt keep waiting.
                        if let Err(e) = self.kernel.detach_permission(&correlation_id) {
                            log::debug!(target: "kernel", "detach {}: {}", correlation_id, e);
                        }
                        self.kernel.bus().record_audit(
                            AuditEntry::new(
                                "permission.timeout",
                                self.app_id.as_str(),
                                capability.as_str(),
                                AuditOutcome::Timeout,
                            )
                            .with_details(correlation_id.to_string()),
                        );
                        return Err(self.denied(capability));
                    }
                }
            }
            _ => ticket.await,
        };

        match decision {
            Ok(Decision::Granted) => Ok(()),
            Ok(Decision::Denied) | Err(_) => Err(self.denied(capability)),
        }
    }

    fn denied(&self, capability: &Capability) -> KernelError {
        KernelError::permission_denied(self.app_id.as_str(), capability.as_str())
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Launch another app (or another instance of this one).
    pub fn open(&self, app_id: &str, payload: Value) -> Result<AppHost, KernelError> {
        self.kernel.launch(app_id, payload)
    }

    pub fn close(&self, window_id: &str) -> Result<(), KernelError> {
        self.kernel
            .dispatch(DesktopCommand::Close { id: window_id.to_string() })?;
        Ok(())
    }

    pub fn focus(&self, window_id: &str) -> Result<(), KernelError> {
        self.kernel
            .dispatch(DesktopCommand::Focus { id: window_id.to_string() })?;
        Ok(())
    }

    pub fn minimize(&self, window_id: &str) -> Result<(), KernelError> {
        self.kernel
            .dispatch(DesktopCommand::ToggleMinimize { id: window_id.to_string() })?;
        Ok(())
    }

    pub fn close_self(&self) -> Result<(), KernelError> {
        self.close(&self.window_id)
    }

    pub fn focus_self(&self) -> Result<(), KernelError> {
        self.focus(&self.window_id)
    }

    pub fn status(&self) -> HostStatus {
        let state = self.kernel.desktop_state();
        match state.window(&self.window_id) {
            None => HostStatus::Closed,
            Some(w) if w.minimized || w.space != state.current_space => HostStatus::Suspended,
            Some(_) if state.active_window.as_deref() == Some(self.window_id.as_str()) => {
                HostStatus::Active
            }
            Some(_) => HostStatus::Background,
        }
    }

    // ========================================================================
    // Filesystem
    // ========================================================================

    pub async fn read_file(&self, id: &str) -> Result<FileEntry, KernelError> {
        self.require(&Capability::FILES_READ).await?;
        Ok(self.kernel.vfs().read_file(id).await?)
    }

    pub async fn list_nodes(&self, parent_id: &str) -> Result<Vec<Node>, KernelError> {
        self.require(&Capability::FILES_READ).await?;
        Ok(self.kernel.vfs().list_nodes(parent_id)?)
    }

    pub async fn search(&self, query: &str) -> Result<Vec<SearchHit>, KernelError> {
        self.require(&Capability::FILES_READ).await?;
        Ok(self.kernel.vfs().search(query))
    }

    pub async fn create_file(
        &self,
        parent_id: &str,
        name: &str,
        content: &[u8],
    ) -> Result<Node, KernelError> {
        self.require(&Capability::FILES_WRITE).await?;
        Ok(self.kernel.vfs().create_file(parent_id, name, content).await?)
    }

    pub async fn create_folder(&self, parent_id: &str, name: &str) -> Result<Node, KernelError> {
        self.require(&Capability::FILES_WRITE).await?;
        Ok(self.kernel.vfs().create_folder(parent_id, name).await?)
    }

    pub async fn update_file(&self, id: &str, content: &[u8]) -> Result<Node, KernelError> {
        self.require(&Capability::FILES_WRITE).await?;
        Ok(self.kernel.vfs().update_file(id, content).await?)
    }

    pub async fn delete_node(&self, id: &str) -> Result<Vec<NodeId>, KernelError> {
        self.require(&Capability::FILES_MANAGE).await?;
        Ok(self.kernel.vfs().delete_node(id).await?)
    }

    pub async fn move_node(&self, id: &str, new_parent_id: &str) -> Result<Node, KernelError> {
        self.require(&Capability::FILES_MANAGE).await?;
        Ok(self.kernel.vfs().move_node(id, new_parent_id).await?)
    }

    pub async fn rename_node(&self, id: &str, name: &str) -> Result<Node, KernelError> {
        self.require(&Capability::FILES_MANAGE).await?;
        Ok(self.kernel.vfs().rename_node(id, name).await?)
    }

    pub async fn mount_drive(&self, handle: ExternalHandle) -> Result<Node, KernelError> {
        self.require(&Capability::MOUNT_MANAGE).await?;
        Ok(self.kernel.vfs().mount_drive(handle).await?)
    }

    pub async fn unmount_drive(&self, id: &str) -> Result<Vec<NodeId>, KernelError> {
        self.require(&Capability::MOUNT_MANAGE).await?;
        Ok(self.kernel.vfs().unmount_drive(id).await?)
    }

    // ========================================================================
    // Clipboard
    // ========================================================================

    pub async fn clipboard_read(&self) -> Result<Option<String>, KernelError> {
        self.require(&Capability::CLIPBOARD_READ).await?;
        Ok(self.kernel.clipboard_read())
    }

    pub async fn clipboard_write(&self, text: &str) -> Result<(), KernelError> {
        self.require(&Capability::CLIPBOARD_WRITE).await?;
        self.kernel.clipboard_write(&self.app_id, text);
        Ok(())
    }

    // ========================================================================
    // App storage (scoped to this app, no capability)
    // ========================================================================

    pub fn storage_get(&self, key: &str) -> Option<String> {
        self.kernel.storage_get(&self.app_id, key)
    }

    pub fn storage_set(&self, key: &str, value: &str) {
        self.kernel.storage_set(&self.app_id, key, value);
    }

    pub fn storage_remove(&self, key: &str) -> Option<String> {
        self.kernel.storage_remove(&self.app_id, key)
    }

    // ========================================================================
    // System
    // ========================================================================

    pub fn system_view(&self) -> SystemView {
        self.kernel.system_view()
    }

    pub async fn audit_log(&self, limit: usize) -> Result<Vec<AuditEntry>, KernelError> {
        self.require(&Capability::SYSTEM_READ).await?;
        Ok(self.kernel.audit_log(limit))
    }

    /// Revoke another app's decision (settings panel).
    pub async fn revoke_permission(
        &self,
        app_id: &str,
        capability: &Capability,
    ) -> Result<bool, KernelError> {
        self.require(&Capability::SYSTEM_CONFIG).await?;
        Ok(self.kernel.revoke_permission(app_id, capability))
    }

    /// Listen on a bus channel (or `prefix*` pattern).
    pub fn subscribe<F>(&self, channel: &str, handler: F) -> Result<Subscription, KernelError>
    where
        F: Fn(&Event) + 'static,
    {
        Ok(self.kernel.bus().subscribe(channel, handler)?)
    }

    /// Publish a free-form event on `app:<app_id>:<topic>`.
    pub fn emit(&self, topic: &str, payload: Value) {
        let channel = format!("app:{}:{}", self.app_id, topic);
        self.kernel.bus().publish(&channel, KernelEvent::Custom(payload));
    }

    // ========================================================================
    // Crash isolation
    // ========================================================================

    /// Report that the app failed. Only this host is marked crashed; the
    /// kernel and other windows are untouched.
    pub fn report_crash(&self, message: &str) {
        self.crashed.set(true);
        self.kernel.bus().publish(
            channels::ERR_APP,
            KernelEvent::Error(ErrorReport::new(self.window_id.as_str(), message)),
        );
    }

    pub fn is_crashed(&self) -> bool {
        self.crashed.get()
    }

    /// Clear the crashed flag so the app can render again.
    pub fn restart(&self) {
        if self.crashed.replace(false) {
            log::info!(target: "kernel", "restarting {} in {}", self.app_id, self.window_id);
        }
    }
}
