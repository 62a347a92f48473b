//! The permission broker: grant table plus correlated prompts.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use ncos_bus::{channels, now_millis, AuditEntry, AuditOutcome, EventBus, KernelEvent};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::capability::{Capability, CorrelationId, Decision, PermissionStatus};
use crate::error::PermissionError;

/// Persisted decisions: app id -> capability -> decision.
pub type GrantTable = BTreeMap<String, BTreeMap<Capability, Decision>>;

/// An outstanding prompt.
struct PendingRequest {
    /// Issue order; correlation ids are random
    seq: u64,
    app_id: String,
    capability: Capability,
    requested_at: i64,
    waiters: Vec<oneshot::Sender<Decision>>,
}

/// Public view of an outstanding prompt (for a prompt UI).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingInfo {
    pub correlation_id: CorrelationId,
    pub app_id: String,
    pub capability: Capability,
    pub requested_at: i64,
    /// Callers currently awaiting this prompt
    pub waiters: usize,
}

/// What a successful `resolve` decided.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedRequest {
    pub app_id: String,
    pub capability: Capability,
    pub decision: Decision,
    /// Callers that were still waiting and received the decision
    pub delivered: usize,
}

/// Capability authority for hosted applications.
pub struct PermissionBroker {
    grants: GrantTable,
    pending: BTreeMap<CorrelationId, PendingRequest>,
    next_seq: u64,
    bus: EventBus,
}

impl PermissionBroker {
    /// Create a broker with an empty grant table.
    pub fn new(bus: EventBus) -> Self {
        Self::with_grants(bus, GrantTable::new())
    }

    /// Create a broker from a persisted grant table.
    pub fn with_grants(bus: EventBus, grants: GrantTable) -> Self {
        Self {
            grants,
            pending: BTreeMap::new(),
            next_seq: 0,
            bus,
        }
    }

    /// Pure lookup in the grant table.
    pub fn check(&self, app_id: &str, capability: &Capability) -> PermissionStatus {
        self.grants
            .get(app_id)
            .and_then(|caps| caps.get(capability))
            .map(|&d| PermissionStatus::from(d))
            .unwrap_or(PermissionStatus::Prompt)
    }

    /// Request a capability.
    ///
    /// A recorded decision is returned immediately. Otherwise a prompt is
    /// published on `sys:permission_request` and the returned ticket
    /// completes when [`resolve`](Self::resolve) is called with the same
    /// correlation id. A second request for a pair that is already being
    /// prompted joins the existing prompt.
    pub fn request(&mut self, app_id: &str, capability: &Capability) -> PermissionTicket {
        if let Some(decision) = self.check(app_id, capability).decision() {
            self.bus.record_audit(
                AuditEntry::new(
                    "permission.request",
                    app_id,
                    capability.as_str(),
                    outcome_for(decision),
                )
                .with_details("recorded decision"),
            );
            return PermissionTicket::decided(decision);
        }

        let (tx, rx) = oneshot::channel();

        let existing = self
            .pending
            .iter_mut()
            .find(|(_, p)| p.app_id == app_id && &p.capability == capability);
        if let Some((correlation_id, pending)) = existing {
            pending.waiters.push(tx);
            let correlation_id = correlation_id.clone();
            log::debug!(
                target: "perm",
                "{} joined pending prompt {} for {}",
                app_id,
                correlation_id,
                capability
            );
            self.bus.record_audit(
                AuditEntry::new("permission.request", app_id, capability.as_str(), AuditOutcome::Info)
                    .with_details(format!("joined {}", correlation_id)),
            );
            return PermissionTicket::pending(correlation_id, rx);
        }

        let correlation_id = CorrelationId::generate();
        self.next_seq += 1;
        self.pending.insert(
            correlation_id.clone(),
            PendingRequest {
                seq: self.next_seq,
                app_id: app_id.to_string(),
                capability: capability.clone(),
                requested_at: now_millis(),
                waiters: vec![tx],
            },
        );

        log::info!(
            target: "perm",
            "prompting for {} -> {} ({})",
            app_id,
            capability,
            correlation_id
        );
        self.bus.record_audit(
            AuditEntry::new("permission.request", app_id, capability.as_str(), AuditOutcome::Info)
                .with_details(format!("prompt {}", correlation_id)),
        );
        self.bus.publish(
            channels::SYS_PERMISSION_REQUEST,
            KernelEvent::PermissionRequested {
                app_id: app_id.to_string(),
                capability: capability.to_string(),
                correlation_id: correlation_id.to_string(),
            },
        );

        PermissionTicket::pending(correlation_id, rx)
    }

    /// Deliver the external decision for an outstanding prompt.
    ///
    /// The decision is written to the grant table, audited and handed to
    /// every caller still waiting on the prompt.
    pub fn resolve(
        &mut self,
        correlation_id: &CorrelationId,
        decision: Decision,
    ) -> Result<ResolvedRequest, PermissionError> {
        let pending = self
            .pending
            .remove(correlation_id)
            .ok_or_else(|| PermissionError::UnknownCorrelation(correlation_id.to_string()))?;

        self.grants
            .entry(pending.app_id.clone())
            .or_default()
            .insert(pending.capability.clone(), decision);

        self.bus.record_audit(
            AuditEntry::new(
                "permission.resolve",
                pending.app_id.as_str(),
                pending.capability.as_str(),
                outcome_for(decision),
            )
            .with_details(format!("{} ({})", decision.as_str(), correlation_id)),
        );
        self.bus.publish(
            channels::SYS_PERMISSION_RESOLVED,
            KernelEvent::PermissionResolved {
                app_id: pending.app_id.clone(),
                capability: pending.capability.to_string(),
                correlation_id: correlation_id.to_string(),
                decision: decision.as_str().to_string(),
            },
        );

        let mut delivered = 0;
        for waiter in pending.waiters {
            // A dropped receiver means the caller went away (window closed).
            if waiter.send(decision).is_ok() {
                delivered += 1;
            }
        }

        Ok(ResolvedRequest {
            app_id: pending.app_id,
            capability: pending.capability,
            decision,
            delivered,
        })
    }

    /// Abandon an outstanding prompt. Waiters observe `Cancelled`.
    pub fn cancel(&mut self, correlation_id: &CorrelationId) -> Result<(), PermissionError> {
        let pending = self
            .pending
            .remove(correlation_id)
            .ok_or_else(|| PermissionError::UnknownCorrelation(correlation_id.to_string()))?;

        log::info!(
            target: "perm",
            "cancelled prompt {} ({} -> {})",
            correlation_id,
            pending.app_id,
            pending.capability
        );
        self.bus.record_audit(
            AuditEntry::new(
                "permission.cancel",
                pending.app_id.as_str(),
                pending.capability.as_str(),
                AuditOutcome::Info,
            )
            .with_details(correlation_id.to_string()),
        );
        Ok(())
    }

    /// Drop waiters that stopped listening (timed out or went away).
    ///
    /// The prompt itself is abandoned only once nobody waits on it any
    /// more. Returns whether the prompt was removed.
    pub fn detach(&mut self, correlation_id: &CorrelationId) -> Result<bool, PermissionError> {
        let pending = self
            .pending
            .get_mut(correlation_id)
            .ok_or_else(|| PermissionError::UnknownCorrelation(correlation_id.to_string()))?;
        pending.waiters.retain(|waiter| !waiter.is_closed());
        if !pending.waiters.is_empty() {
            log::debug!(
                target: "perm",
                "prompt {} keeps {} waiter(s)",
                correlation_id,
                pending.waiters.len()
            );
            return Ok(false);
        }
        self.cancel(correlation_id)?;
        Ok(true)
    }

    /// Forget a decision, returning the pair to `prompt`.
    ///
    /// Returns whether a record existed.
    pub fn revoke(&mut self, app_id: &str, capability: &Capability) -> bool {
        let removed = match self.grants.get_mut(app_id) {
            Some(caps) => {
                let removed = caps.remove(capability).is_some();
                if caps.is_empty() {
                    self.grants.remove(app_id);
                }
                removed
            }
            None => false,
        };

        if removed {
            self.bus.record_audit(AuditEntry::new(
                "permission.revoke",
                app_id,
                capability.as_str(),
                AuditOutcome::Info,
            ));
        }
        removed
    }

    /// Write a decision directly, bypassing the prompt.
    pub fn set(&mut self, app_id: &str, capability: &Capability, decision: Decision) {
        self.grants
            .entry(app_id.to_string())
            .or_default()
            .insert(capability.clone(), decision);
        self.bus.record_audit(
            AuditEntry::new("permission.set", app_id, capability.as_str(), outcome_for(decision))
                .with_details(decision.as_str()),
        );
    }

    /// Outstanding prompts, oldest first.
    pub fn pending(&self) -> Vec<PendingInfo> {
        let mut pending: Vec<_> = self.pending.iter().collect();
        pending.sort_by_key(|(_, p)| p.seq);
        pending
            .into_iter()
            .map(|(id, p)| PendingInfo {
                correlation_id: id.clone(),
                app_id: p.app_id.clone(),
                capability: p.capability.clone(),
                requested_at: p.requested_at,
                waiters: p.waiters.len(),
            })
            .collect()
    }

    /// The grant table (for persistence and read-only views).
    pub fn grants(&self) -> &GrantTable {
        &self.grants
    }

    /// Replace the grant table with a persisted one.
    ///
    /// Outstanding prompts are left untouched.
    pub fn restore(&mut self, grants: GrantTable) {
        self.grants = grants;
    }

    /// Drop every decision and every outstanding prompt.
    pub fn clear(&mut self) {
        self.grants.clear();
        self.pending.clear();
    }
}

fn outcome_for(decision: Decision) -> AuditOutcome {
    match decision {
        Decision::Granted => AuditOutcome::Allow,
        Decision::Denied => AuditOutcome::Deny,
    }
}

// =============================================================================
// Ticket
// =============================================================================

enum TicketState {
    Decided(Decision),
    Pending {
        correlation_id: CorrelationId,
        rx: oneshot::Receiver<Decision>,
    },
}

/// Deferred result of [`PermissionBroker::request`].
///
/// Resolves to the decision, or `Cancelled` if the prompt was abandoned.
pub struct PermissionTicket {
    state: TicketState,
}

impl PermissionTicket {
    fn decided(decision: Decision) -> Self {
        Self {
            state: TicketState::Decided(decision),
        }
    }

    fn pending(correlation_id: CorrelationId, rx: oneshot::Receiver<Decision>) -> Self {
        Self {
            state: TicketState::Pending { correlation_id, rx },
        }
    }

    /// Correlation id of the prompt, if the ticket is waiting on one.
    pub fn correlation_id(&self) -> Option<&CorrelationId> {
        match &self.state {
            TicketState::Decided(_) => None,
            TicketState::Pending { correlation_id, .. } => Some(correlation_id),
        }
    }

    /// Whether the ticket waits on a prompt.
    pub fn is_pending(&self) -> bool {
        matches!(self.state, TicketState::Pending { .. })
    }
}

impl Future for PermissionTicket {
    type Output = Result<Decision, PermissionError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.get_mut().state {
            TicketState::Decided(decision) => Poll::Ready(Ok(*decision)),
            TicketState::Pending { rx, .. } => Pin::new(rx)
                .poll(cx)
                .map(|r| r.map_err(|_| PermissionError::Cancelled)),
        }
    }
}
