//! Import validation for snapshot bundles.
//!
//! A bundle is untrusted input. It is checked in two passes:
//!
//! ```text
//!   bytes ──► size limit ──► parse as Value ──► shape limits ──► typed parse ──► structure
//!             (Quota)                          nodes / depth /                   root, parents,
//!                                              string length                     cycles, desktop
//! ```
//!
//! Any failure rejects the whole bundle; nothing is applied partially.

use std::collections::BTreeSet;

use ncos_desktop::DesktopState;
use ncos_vfs::{validate_id, Node, ROOT_ID};
use serde_json::Value;

use crate::config::ImportLimits;
use crate::error::KernelError;
use crate::persistence::SystemSnapshot;

/// Validate a bundle and return the parsed snapshot.
pub fn validate_bundle(json: &str, limits: &ImportLimits) -> Result<SystemSnapshot, KernelError> {
    if json.len() > limits.max_bytes {
        return Err(KernelError::QuotaExceeded {
            size: json.len(),
            limit: limits.max_bytes,
        });
    }

    let value: Value = serde_json::from_str(json)?;
    check_shape(&value, limits)?;

    let snapshot: SystemSnapshot = serde_json::from_value(value)
        .map_err(|e| KernelError::ValidationFailure(format!("malformed bundle: {}", e)))?;
    check_structure(&snapshot)?;
    Ok(snapshot)
}

/// Size, depth and string bounds on the raw document.
pub fn check_shape(value: &Value, limits: &ImportLimits) -> Result<(), KernelError> {
    let Value::Object(root) = value else {
        return Err(KernelError::ValidationFailure(
            "bundle is not an object".to_string(),
        ));
    };

    if let Some(Value::Object(nodes)) = root.get("fs_nodes") {
        if nodes.len() > limits.max_nodes {
            return Err(KernelError::ValidationFailure(format!(
                "bundle too large: {} nodes (max {})",
                nodes.len(),
                limits.max_nodes
            )));
        }
    }

    let depth = nesting_depth(value);
    if depth > limits.max_depth {
        return Err(KernelError::ValidationFailure(format!(
            "nesting depth exceeded: {} (max {})",
            depth, limits.max_depth
        )));
    }

    if let Some(len) = longest_string(value).filter(|&len| len > limits.max_string_len) {
        return Err(KernelError::ValidationFailure(format!(
            "excessively long string: {} chars (max {})",
            len, limits.max_string_len
        )));
    }

    Ok(())
}

/// Containers on the deepest path; a scalar has depth 0.
fn nesting_depth(value: &Value) -> usize {
    match value {
        Value::Object(map) => 1 + map.values().map(nesting_depth).max().unwrap_or(0),
        Value::Array(items) => 1 + items.iter().map(nesting_depth).max().unwrap_or(0),
        _ => 0,
    }
}

/// Length in chars of the longest string or object key.
fn longest_string(value: &Value) -> Option<usize> {
    match value {
        Value::String(s) => Some(s.chars().count()),
        Value::Object(map) => map
            .iter()
            .flat_map(|(k, v)| [Some(k.chars().count()), longest_string(v)])
            .flatten()
            .max(),
        Value::Array(items) => items.iter().filter_map(longest_string).max(),
        _ => None,
    }
}

/// Referential checks on the typed snapshot.
fn check_structure(snapshot: &SystemSnapshot) -> Result<(), KernelError> {
    let nodes = &snapshot.fs_nodes;

    if !nodes.is_empty() {
        match nodes.get(ROOT_ID) {
            Some(root) if root.is_folder() && root.parent_id.is_none() => {}
            Some(_) => return Err(invalid("root must be a folder without parent")),
            None => return Err(invalid("missing root node")),
        }
    }

    for (key, node) in nodes {
        if key != &node.id {
            return Err(invalid(format!("node key {} does not match id {}", key, node.id)));
        }
        validate_id(&node.id)?;
        if node.is_root() {
            continue;
        }
        let parent = node
            .parent_id
            .as_deref()
            .ok_or_else(|| invalid(format!("node {} has no parent", node.id)))?;
        match nodes.get(parent) {
            Some(p) if p.is_folder() || p.is_mount() => {}
            Some(_) => {
                return Err(invalid(format!(
                    "parent {} of {} is not a folder",
                    parent, node.id
                )))
            }
            None => {
                return Err(invalid(format!(
                    "parent {} of {} does not exist",
                    parent, node.id
                )))
            }
        }
    }

    for node in nodes.values() {
        if !reaches_root(node, snapshot) {
            return Err(invalid(format!("node {} is part of a cycle", node.id)));
        }
    }

    // The layout is not persisted; any viewport works for the check.
    DesktopState::from_snapshot(snapshot.desktop_snapshot(), Default::default())?;
    Ok(())
}

fn reaches_root(node: &Node, snapshot: &SystemSnapshot) -> bool {
    let mut seen = BTreeSet::new();
    let mut current = node;
    while let Some(parent) = current.parent_id.as_deref() {
        if !seen.insert(current.id.as_str()) {
            return false;
        }
        match snapshot.fs_nodes.get(parent) {
            Some(next) => current = next,
            None => return false,
        }
    }
    current.is_root()
}

fn invalid(reason: impl Into<String>) -> KernelError {
    KernelError::ValidationFailure(reason.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn limits() -> ImportLimits {
        ImportLimits::default()
    }

    fn root_json() -> Value {
        json!({
            "id": "root", "parent_id": null, "name": "root", "kind": "folder",
            "created": 0, "modified": 0
        })
    }

    fn folder_json(id: &str, parent: &str) -> Value {
        json!({
            "id": id, "parent_id": parent, "name": id, "kind": "folder",
            "created": 0, "modified": 0
        })
    }

    fn expect_reason(err: KernelError, needle: &str) {
        match err {
            KernelError::ValidationFailure(reason) => {
                assert!(reason.contains(needle), "{:?} lacks {:?}", reason, needle)
            }
            other => panic!("expected validation failure, got {:?}", other),
        }
    }

    #[test]
    fn test_accepts_minimal_bundle() {
        let bundle = json!({
            "version": 2,
            "spaces": [{"id": 1, "label": "Space 1"}],
            "current_space": 1,
            "fs_nodes": {"root": root_json(), "docs": folder_json("docs", "root")}
        });
        let snapshot = validate_bundle(&bundle.to_string(), &limits()).unwrap();
        assert_eq!(snapshot.fs_nodes.len(), 2);
    }

    #[test]
    fn test_rejects_non_object() {
        let err = validate_bundle("\"not an object\"", &limits()).unwrap_err();
        expect_reason(err, "not an object");
    }

    #[test]
    fn test_rejects_too_many_nodes() {
        let nodes: serde_json::Map<String, Value> = (0..1001)
            .map(|i| (i.to_string(), json!({ "id": i.to_string() })))
            .collect();
        let bundle = json!({ "fs_nodes": nodes });
        let err = validate_bundle(&bundle.to_string(), &limits()).unwrap_err();
        expect_reason(err, "too large");
    }

    #[test]
    fn test_rejects_deep_nesting() {
        let mut deep = json!("leaf");
        for _ in 0..15 {
            deep = json!({ "a": deep });
        }
        let err = validate_bundle(&deep.to_string(), &limits()).unwrap_err();
        expect_reason(err, "depth exceeded");
    }

    #[test]
    fn test_rejects_long_string() {
        let bundle = json!({ "data": "a".repeat(100_001) });
        let err = validate_bundle(&bundle.to_string(), &limits()).unwrap_err();
        expect_reason(err, "excessively long string");

        let bundle = json!({ "data": "a".repeat(100_000) });
        assert!(validate_bundle(&bundle.to_string(), &limits()).is_ok());
    }

    #[test]
    fn test_rejects_oversized_payload() {
        let small = ImportLimits {
            max_bytes: 16,
            ..ImportLimits::default()
        };
        let err = validate_bundle(r#"{"windows": [], "spaces": []}"#, &small).unwrap_err();
        assert_eq!(err, KernelError::QuotaExceeded { size: 29, limit: 16 });
    }

    #[test]
    fn test_rejects_missing_parent() {
        let bundle = json!({
            "fs_nodes": {"root": root_json(), "orphan": folder_json("orphan", "ghost")}
        });
        let err = validate_bundle(&bundle.to_string(), &limits()).unwrap_err();
        expect_reason(err, "does not exist");
    }

    #[test]
    fn test_rejects_cycle() {
        let bundle = json!({
            "fs_nodes": {
                "root": root_json(),
                "a": folder_json("a", "b"),
                "b": folder_json("b", "a")
            }
        });
        let err = validate_bundle(&bundle.to_string(), &limits()).unwrap_err();
        expect_reason(err, "cycle");
    }

    #[test]
    fn test_rejects_missing_root() {
        let bundle = json!({ "fs_nodes": {"docs": folder_json("docs", "root")} });
        let err = validate_bundle(&bundle.to_string(), &limits()).unwrap_err();
        expect_reason(err, "missing root");
    }

    #[test]
    fn test_rejects_window_in_unknown_space() {
        let bundle = json!({
            "version": 2,
            "spaces": [{"id": 1, "label": "Space 1"}],
            "current_space": 1,
            "windows": [{
                "id": "calc", "kind": "calc", "title": "Calculator", "z_order": 100,
                "position": {"x": 0.0, "y": 0.0},
                "size": {"width": 300.0, "height": 400.0},
                "space": 9
            }]
        });
        let err = validate_bundle(&bundle.to_string(), &limits()).unwrap_err();
        expect_reason(err, "desktop snapshot");
    }

    #[test]
    fn test_depth_counts_containers() {
        assert_eq!(nesting_depth(&json!(1)), 0);
        assert_eq!(nesting_depth(&json!({})), 1);
        assert_eq!(nesting_depth(&json!({"a": [{"b": 1}]})), 3);
    }
}
