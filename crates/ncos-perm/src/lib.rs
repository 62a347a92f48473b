//! Night City Permission Broker
//!
//! Hosted applications hold named capabilities (`files:read`,
//! `clipboard:write`, ...). The broker answers three questions:
//!
//! - **check**: what is the recorded decision for (app, capability)?
//! - **request**: ask the user when nothing is recorded yet, and wait
//! - **resolve / cancel / revoke**: complete, abandon or forget decisions
//!
//! Outstanding prompts live in a correlation table keyed by
//! [`CorrelationId`]. Any number of prompts may be outstanding at once;
//! repeated requests for the same pair share one prompt.
//!
//! Every decision, raw request and revocation is mirrored into the audit
//! ring buffer on the event bus.

pub mod broker;
pub mod capability;
pub mod error;

pub use broker::{GrantTable, PendingInfo, PermissionBroker, PermissionTicket, ResolvedRequest};
pub use capability::{Capability, CorrelationId, Decision, PermissionStatus};
pub use error::PermissionError;
