//! Crash boundary.
//!
//! Listens on every `err:` channel and on `sys:error`. Non-fatal reports
//! are only counted; the latest fatal one is kept until the user picks a
//! recovery action. Anything published on `sys:error` counts as fatal, as
//! does a panicking bus handler (reported by the bus on `err:kernel`).
//!
//! ```text
//!   err:storage ─┐
//!   err:app ─────┤
//!   err:kernel ──┼──► CrashBoundary ──► pending_recovery() ──► Kernel::recover(action)
//!   sys:error ───┘                                               ├─ Restart   (reload snapshot)
//!                                                                └─ HardReset (wipe everything)
//! ```

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use ncos_bus::{channels, BusError, ErrorReport, Event, EventBus, KernelEvent, Subscription};
use serde::{Deserialize, Serialize};

/// What the user chose after a fatal error
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryAction {
    /// Reload state from the last snapshot
    Restart,
    /// Wipe all persisted state and start clean
    HardReset,
}

#[derive(Default)]
struct CrashState {
    fatal: RefCell<Option<ErrorReport>>,
    errors: Cell<u64>,
}

impl CrashState {
    fn observe(&self, event: &Event, always_fatal: bool) {
        self.errors.set(self.errors.get() + 1);
        let report = match &event.payload {
            KernelEvent::Error(report) if report.fatal || always_fatal => ErrorReport {
                fatal: true,
                ..report.clone()
            },
            KernelEvent::Error(_) => return,
            other if always_fatal => {
                ErrorReport::fatal(event.channel.as_str(), format!("{:?}", other))
            }
            _ => return,
        };
        log::error!(
            target: "kernel",
            "fatal error from {}: {}",
            report.source,
            report.message
        );
        *self.fatal.borrow_mut() = Some(report);
    }
}

/// Subscriber on the error channels
pub struct CrashBoundary {
    state: Rc<CrashState>,
    subscriptions: Vec<Subscription>,
}

impl CrashBoundary {
    /// Subscribe to `err:*` and `sys:error` on `bus`.
    pub fn install(bus: &EventBus) -> Result<Self, BusError> {
        let state = Rc::new(CrashState::default());
        let errors = Rc::clone(&state);
        let failures = Rc::clone(&state);
        let mut subscriptions = vec![bus.subscribe(channels::ERR_ANY, move |event| {
            errors.observe(event, false)
        })?];
        match bus.subscribe(channels::SYS_ERROR, move |event| failures.observe(event, true)) {
            Ok(subscription) => subscriptions.push(subscription),
            Err(e) => {
                for subscription in subscriptions {
                    subscription.unsubscribe();
                }
                return Err(e);
            }
        }
        Ok(Self {
            state,
            subscriptions,
        })
    }

    /// Latest fatal report awaiting a recovery decision
    pub fn pending_recovery(&self) -> Option<ErrorReport> {
        self.state.fatal.borrow().clone()
    }

    /// Errors seen on any `err:` channel since the last clear
    pub fn error_count(&self) -> u64 {
        self.state.errors.get()
    }

    pub fn clear(&self) {
        *self.state.fatal.borrow_mut() = None;
        self.state.errors.set(0);
    }
}

impl Drop for CrashBoundary {
    fn drop(&mut self) {
        for subscription in self.subscriptions.drain(..) {
            subscription.unsubscribe();
        }
    }
}
