//! App-scoped key/value storage.
//!
//! Every app gets its own namespace; keys are stored flat as
//! `app:<app_id>:<key>` so the whole map serializes into the system
//! snapshot as-is.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Flat key/value map namespaced per app
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppStorage {
    entries: BTreeMap<String, String>,
}

fn scoped_key(app_id: &str, key: &str) -> String {
    format!("app:{}:{}", app_id, key)
}

fn app_prefix(app_id: &str) -> String {
    format!("app:{}:", app_id)
}

impl AppStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, app_id: &str, key: &str) -> Option<&str> {
        self.entries.get(&scoped_key(app_id, key)).map(String::as_str)
    }

    /// Store a value, returning the previous one.
    pub fn set(&mut self, app_id: &str, key: &str, value: impl Into<String>) -> Option<String> {
        self.entries.insert(scoped_key(app_id, key), value.into())
    }

    pub fn remove(&mut self, app_id: &str, key: &str) -> Option<String> {
        self.entries.remove(&scoped_key(app_id, key))
    }

    /// Keys of one app, without the namespace prefix
    pub fn keys(&self, app_id: &str) -> Vec<String> {
        let prefix = app_prefix(app_id);
        self.entries
            .range(prefix.clone()..)
            .take_while(|(k, _)| k.starts_with(&prefix))
            .map(|(k, _)| k[prefix.len()..].to_string())
            .collect()
    }

    /// Drop every key of one app. Returns the number removed.
    pub fn clear_app(&mut self, app_id: &str) -> usize {
        let prefix = app_prefix(app_id);
        let before = self.entries.len();
        self.entries.retain(|k, _| !k.starts_with(&prefix));
        before - self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
