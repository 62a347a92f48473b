//! Best-effort search index.
//!
//! Keyed by node id; stores the lowercased name and a truncated lowercase
//! excerpt of the content. The index is never authoritative and can be
//! rebuilt at any time from the metadata and content stores.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::{Node, NodeId};

/// Number of content characters kept per indexed file.
pub const EXCERPT_CHARS: usize = 1000;

const NAME_SCORE: u32 = 10;
const CONTENT_SCORE: u32 = 5;

#[derive(Clone, Debug)]
struct IndexEntry {
    name: String,
    excerpt: String,
}

/// A search result.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: NodeId,
    pub score: u32,
}

/// In-memory search index.
#[derive(Clone, Debug, Default)]
pub struct SearchIndex {
    entries: HashMap<NodeId, IndexEntry>,
}

impl SearchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index (or re-index) a node. Folders and mounts are indexed by name only.
    pub fn add(&mut self, node: &Node, content: &[u8]) {
        let excerpt = if node.is_file() {
            String::from_utf8_lossy(content)
                .chars()
                .take(EXCERPT_CHARS)
                .collect::<String>()
                .to_lowercase()
        } else {
            String::new()
        };
        self.entries.insert(
            node.id.clone(),
            IndexEntry {
                name: node.name.to_lowercase(),
                excerpt,
            },
        );
    }

    /// Update the indexed name only (rename keeps the excerpt).
    pub fn rename(&mut self, id: &str, name: &str) {
        if let Some(entry) = self.entries.get_mut(id) {
            entry.name = name.to_lowercase();
        }
    }

    pub fn remove(&mut self, id: &str) {
        self.entries.remove(id);
    }

    /// Case-insensitive substring search, best score first.
    ///
    /// Ties are broken by id so results are stable.
    pub fn search(&self, query: &str) -> Vec<SearchHit> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }

        let mut hits: Vec<SearchHit> = self
            .entries
            .iter()
            .filter_map(|(id, entry)| {
                let mut score = 0;
                if entry.name.contains(&needle) {
                    score += NAME_SCORE;
                }
                if entry.excerpt.contains(&needle) {
                    score += CONTENT_SCORE;
                }
                (score > 0).then(|| SearchHit {
                    id: id.clone(),
                    score,
                })
            })
            .collect();

        hits.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
        hits
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
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
