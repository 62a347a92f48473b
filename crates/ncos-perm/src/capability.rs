//! Capability names and decision types.

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A named permission an application must hold to perform a gated operation.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Capability(Cow<'static, str>);

impl Capability {
    pub const FILES_READ: Capability = Capability::from_static("files:read");
    pub const FILES_WRITE: Capability = Capability::from_static("files:write");
    pub const FILES_MANAGE: Capability = Capability::from_static("files:manage");
    pub const MOUNT_MANAGE: Capability = Capability::from_static("mount:manage");
    pub const CLIPBOARD_READ: Capability = Capability::from_static("clipboard:read");
    pub const CLIPBOARD_WRITE: Capability = Capability::from_static("clipboard:write");
    pub const SYSTEM_ADMIN: Capability = Capability::from_static("system:admin");
    pub const SYSTEM_READ: Capability = Capability::from_static("system:read");
    pub const SYSTEM_CONFIG: Capability = Capability::from_static("system:config");

    /// Every capability the kernel itself gates on.
    pub const KNOWN: [Capability; 9] = [
        Self::FILES_READ,
        Self::FILES_WRITE,
        Self::FILES_MANAGE,
        Self::MOUNT_MANAGE,
        Self::CLIPBOARD_READ,
        Self::CLIPBOARD_WRITE,
        Self::SYSTEM_ADMIN,
        Self::SYSTEM_READ,
        Self::SYSTEM_CONFIG,
    ];

    /// Capability from a static name.
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    /// Capability from an arbitrary (app-defined) name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the kernel gates one of its own operations on this name.
    pub fn is_known(&self) -> bool {
        Self::KNOWN.iter().any(|c| c == self)
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Capability {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// A recorded decision.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Granted,
    Denied,
}

impl Decision {
    pub fn is_granted(self) -> bool {
        self == Decision::Granted
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Decision::Granted => "granted",
            Decision::Denied => "denied",
        }
    }
}

/// Result of a grant-table lookup. `Prompt` means nothing is recorded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionStatus {
    Granted,
    Denied,
    Prompt,
}

impl From<Decision> for PermissionStatus {
    fn from(d: Decision) -> Self {
        match d {
            Decision::Granted => PermissionStatus::Granted,
            Decision::Denied => PermissionStatus::Denied,
        }
    }
}

impl PermissionStatus {
    /// The decision, if one is recorded.
    pub fn decision(self) -> Option<Decision> {
        match self {
            PermissionStatus::Granted => Some(Decision::Granted),
            PermissionStatus::Denied => Some(Decision::Denied),
            PermissionStatus::Prompt => None,
        }
    }
}

/// Token pairing an outstanding request with its eventual resolution.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Allocate a fresh, unique id.
    pub fn generate() -> Self {
        Self(format!("perm_{}", uuid::Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CorrelationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_serializes_as_plain_string() {
        let json = serde_json::to_string(&Capability::FILES_READ).unwrap();
        assert_eq!(json, "\"files:read\"");

        let back: Capability = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Capability::FILES_READ);
    }

    #[test]
    fn test_owned_and_static_compare_equal() {
        assert_eq!(Capability::new("clipboard:write"), Capability::CLIPBOARD_WRITE);
        assert!(Capability::new("system:config").is_known());
        assert!(!Capability::new("network:scan").is_known());
    }

    #[test]
    fn test_status_from_decision() {
        assert_eq!(PermissionStatus::from(Decision::Denied), PermissionStatus::Denied);
        assert_eq!(PermissionStatus::Prompt.decision(), None);
        assert_eq!(PermissionStatus::Granted.decision(), Some(Decision::Granted));
    }

    #[test]
    fn test_correlation_ids_unique() {
        let a = CorrelationId::generate();
        let b = CorrelationId::generate();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("perm_"));
    }
}
