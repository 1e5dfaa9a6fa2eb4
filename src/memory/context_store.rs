//! Named facts that live alongside the dialogue.
//!
//! Entries are overwritten in place and kept until an explicit clear.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextEntry {
    pub value: String,
    #[serde(with = "super::timestamp")]
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextStore {
    entries: BTreeMap<String, ContextEntry>,
}

impl ContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: BTreeMap<String, ContextEntry>) -> Self {
        Self { entries }
    }

    pub fn set(&mut self, key: &str, value: &str) {
        self.entries.insert(
            key.to_string(),
            ContextEntry {
                value: value.to_string(),
                timestamp: Utc::now(),
            },
        );
    }

    /// `None` when the key was never set; `Some("")` for a stored empty value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(|e| e.value.as_str())
    }

    pub fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn entries(&self) -> &BTreeMap<String, ContextEntry> {
        &self.entries
    }

    /// Render every fact as a prompt block. Empty when no facts are stored.
    pub fn render(&self) -> String {
        if self.entries.is_empty() {
            return String::new();
        }

        let mut lines = vec!["[Persistent Context]".to_string()];
        for (key, entry) in &self.entries {
            lines.push(format!("- {}: {}", key, entry.value));
        }
        lines.join("\n")
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
