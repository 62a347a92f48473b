//! Snapshot persistence, bundles and recovery.
//!
//! Every accepted change bumps a generation counter. A save records the
//! generation it captured, so a change that lands while the save is in
//! flight keeps the kernel dirty.
//!
//! ```text
//!   change ──► generation += 1 ──► (debounce) ──► persist_if_due ──► save ok?
//!                                                                   ├─ yes: saved = captured
//!                                                                   └─ no:  stays dirty, retried next tick
//! ```

use std::cell::Cell;
use std::time::Duration;

use ncos_bus::{
    channels, now_millis, AuditEntry, AuditOutcome, ErrorReport, KernelEvent,
};
use ncos_desktop::DesktopState;
use tokio::time::{Instant, MissedTickBehavior};

use super::Kernel;
use crate::error::KernelError;
use crate::persistence::{validate_bundle, SystemSnapshot};
use crate::recovery::RecoveryAction;

/// Smallest autosave tick, so a zero debounce does not spin
const MIN_AUTOSAVE_TICK: Duration = Duration::from_millis(10);

/// Dirty tracking shared with the `fs:change` listener
#[derive(Debug, Default)]
pub(crate) struct PersistState {
    generation: Cell<u64>,
    saved_generation: Cell<u64>,
    last_change: Cell<Option<Instant>>,
    saves: Cell<u64>,
    failures: Cell<u64>,
}

impl PersistState {
    pub(crate) fn touch(&self) {
        self.generation.set(self.generation.get() + 1);
        self.last_change.set(Some(Instant::now()));
    }

    fn is_dirty(&self) -> bool {
        self.generation.get() != self.saved_generation.get()
    }

    fn is_due(&self, debounce: Duration) -> bool {
        self.is_dirty()
            && self
                .last_change
                .get()
                .map_or(true, |at| at.elapsed() >= debounce)
    }

    fn saved(&self, generation: u64) {
        self.saved_generation.set(generation);
        self.saves.set(self.saves.get() + 1);
    }

    /// Current state matches what is stored.
    pub(crate) fn mark_clean(&self) {
        self.saved_generation.set(self.generation.get());
    }
}

impl Kernel {
    /// Record that durable state changed.
    pub fn mark_dirty(&self) {
        self.persist.touch();
    }

    /// Whether there are changes not yet written
    pub fn is_dirty(&self) -> bool {
        self.persist.is_dirty()
    }

    /// Successful snapshot writes this session
    pub fn save_count(&self) -> u64 {
        self.persist.saves.get()
    }

    /// Failed snapshot writes this session
    pub fn save_failures(&self) -> u64 {
        self.persist.failures.get()
    }

    /// Capture the full system snapshot.
    pub fn snapshot(&self) -> SystemSnapshot {
        let desktop = self.desktop.borrow().snapshot();
        let grants = self.broker.borrow().grants().clone();
        let storage = self.storage.borrow().clone();
        SystemSnapshot::assemble(desktop, grants, self.vfs.nodes(), storage, now_millis())
    }

    /// Write the snapshot now.
    ///
    /// A failure is logged, audited and published on `err:storage`; the
    /// kernel stays dirty so the next autosave tick retries.
    pub async fn flush(&self) -> Result<(), KernelError> {
        let generation = self.persist.generation.get();
        let snapshot = self.snapshot();
        match self.snapshots.save(&snapshot).await {
            Ok(()) => {
                self.persist.saved(generation);
                log::debug!(target: "kernel", "snapshot saved (generation {})", generation);
                Ok(())
            }
            Err(e) => {
                self.persist.failures.set(self.persist.failures.get() + 1);
                self.report_storage_failure("kernel.persist", &e);
                Err(e)
            }
        }
    }

    /// Save if dirty and the debounce window has passed. Returns whether
    /// a snapshot was written.
    pub async fn persist_if_due(&self) -> bool {
        if !self.persist.is_due(self.config.autosave_debounce()) {
            return false;
        }
        self.flush().await.is_ok()
    }

    /// Drive `persist_if_due` until shutdown.
    pub async fn autosave(&self) {
        let period = self.config.autosave_debounce().max(MIN_AUTOSAVE_TICK);
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        log::debug!(target: "kernel", "autosave every {:?}", period);

        while !self.shut_down.get() {
            ticker.tick().await;
            if self.shut_down.get() {
                break;
            }
            self.persist_if_due().await;
        }
    }

    pub(crate) fn report_storage_failure(&self, action: &str, err: &KernelError) {
        log::error!(target: "kernel", "{} failed: {}", action, err);
        self.bus.record_audit(
            AuditEntry::new(action, "kernel", "snapshot", AuditOutcome::Error)
                .with_details(err.to_string()),
        );
        self.bus.publish(
            channels::ERR_STORAGE,
            KernelEvent::Error(ErrorReport::new("kernel", err.to_string())),
        );
    }

    // ========================================================================
    // Bundles
    // ========================================================================

    /// Serialize the current state as a portable bundle.
    pub fn export_bundle(&self) -> Result<String, KernelError> {
        Ok(serde_json::to_string(&self.snapshot())?)
    }

    /// Replace the live state with a bundle.
    ///
    /// The bundle is validated completely first; a rejected bundle leaves
    /// the kernel untouched.
    pub async fn import_bundle(&self, json: &str) -> Result<(), KernelError> {
        let validated = validate_bundle(json, &self.config.import).and_then(|snapshot| {
            let state =
                DesktopState::from_snapshot(snapshot.desktop_snapshot(), self.config.layout())?;
            Ok((snapshot, state))
        });
        let (snapshot, state) = match validated {
            Ok(parts) => parts,
            Err(e) => {
                log::warn!(target: "kernel", "import rejected: {}", e);
                self.bus.record_audit(
                    AuditEntry::new("kernel.import", "kernel", "bundle", AuditOutcome::Deny)
                        .with_details(e.to_string()),
                );
                return Err(e);
            }
        };

        let node_count = snapshot.fs_nodes.len();
        self.desktop.borrow_mut().replace(state);
        self.broker.borrow_mut().restore(snapshot.permissions.clone());
        *self.storage.borrow_mut() = snapshot.app_storage.clone();
        self.vfs.replace_all(snapshot.nodes()).await;
        self.mark_dirty();

        log::info!(target: "kernel", "imported bundle with {} nodes", node_count);
        self.bus.record_audit(
            AuditEntry::new("kernel.import", "kernel", "bundle", AuditOutcome::Allow)
                .with_details(format!("{} nodes", node_count)),
        );
        self.bus.publish(
            channels::SPACE_CHANGE,
            KernelEvent::SpaceChanged {
                space_id: self.desktop.borrow().state().current_space,
            },
        );
        Ok(())
    }

    // ========================================================================
    // Recovery
    // ========================================================================

    /// Carry out the recovery the user picked after a fatal error.
    pub async fn recover(&self, action: RecoveryAction) -> Result<(), KernelError> {
        let result = match action {
            RecoveryAction::Restart => {
                self.vfs.load().await;
                self.restore().await;
                Ok(())
            }
            RecoveryAction::HardReset => {
                let cleared = self.snapshots.clear().await;
                self.vfs.wipe().await;
                self.broker.borrow_mut().clear();
                self.desktop
                    .borrow_mut()
                    .replace(DesktopState::new(self.config.layout()));
                self.storage.borrow_mut().clear();
                self.clipboard.borrow_mut().clear();
                if let Err(e) = &cleared {
                    self.report_storage_failure("kernel.reset", e);
                }
                cleared
            }
        };

        self.persist.mark_clean();
        self.crash.clear();
        log::warn!(target: "kernel", "recovered with {:?}", action);
        self.bus.record_audit(AuditEntry::new(
            "kernel.recover",
            "kernel",
            format!("{:?}", action),
            AuditOutcome::Info,
        ));
        self.bus.publish(channels::SYS_RESTART, KernelEvent::Restart);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_tracking() {
        let state = PersistState::default();
        assert!(!state.is_dirty());

        state.touch();
        let captured = state.generation.get();
        state.touch();
        state.saved(captured);
        assert!(state.is_dirty());

        state.saved(state.generation.get());
        assert!(!state.is_dirty());
        assert_eq!(state.saves.get(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_due_after_debounce() {
        let state = PersistState::default();
        let debounce = Duration::from_millis(500);
        assert!(!state.is_due(debounce));

        state.touch();
        assert!(!state.is_due(debounce));

        tokio::time::advance(Duration::from_millis(500)).await;
        assert!(state.is_due(debounce));

        state.mark_clean();
        assert!(!state.is_due(debounce));
    }
}
