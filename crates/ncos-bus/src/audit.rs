//! Audit trail for security-relevant kernel decisions.
//!
//! Entries are kept in a capped ring buffer, newest first. Once the
//! buffer is full the oldest entry is dropped silently.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::clock::now_millis;

/// Default ring buffer capacity.
pub const DEFAULT_AUDIT_CAPACITY: usize = 100;

/// Result of an audited action.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Allow,
    Deny,
    Error,
    Info,
    Timeout,
}

/// A single audit record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// When the action happened (ms since epoch)
    pub timestamp: i64,
    /// Action identifier, e.g. `permission.resolve`
    pub action: String,
    /// App that caused the action
    pub app_id: String,
    /// Resource the action targeted (capability, node id, ...)
    pub target: String,
    /// What happened
    pub outcome: AuditOutcome,
    /// Free-form details
    #[serde(default)]
    pub details: String,
}

impl AuditEntry {
    /// Create an entry stamped with the current time.
    pub fn new(
        action: impl Into<String>,
        app_id: impl Into<String>,
        target: impl Into<String>,
        outcome: AuditOutcome,
    ) -> Self {
        Self {
            timestamp: now_millis(),
            action: action.into(),
            app_id: app_id.into(),
            target: target.into(),
            outcome,
            details: String::new(),
        }
    }

    /// Attach details.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = details.into();
        self
    }
}

/// Capped, most-recent-first ring buffer.
#[derive(Clone, Debug)]
pub struct AuditLog {
    entries: VecDeque<AuditEntry>,
    capacity: usize,
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new(DEFAULT_AUDIT_CAPACITY)
    }
}

impl AuditLog {
    /// Create a log holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(1024)),
            capacity: capacity.max(1),
        }
    }

    /// Record an entry, dropping the oldest past capacity.
    pub fn push(&mut self, entry: AuditEntry) {
        self.entries.push_front(entry);
        while self.entries.len() > self.capacity {
            self.entries.pop_back();
        }
    }

    /// Up to `limit` entries, newest first.
    pub fn entries(&self, limit: usize) -> Vec<AuditEntry> {
        self.entries.iter().take(limit).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
