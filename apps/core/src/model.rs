use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One selectable named set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: String,
    pub title: String,
    /// Epoch millis of the last swap into this set, 0 when never selected.
    pub last_accessed: i64,
    /// The active set when it is not enumerable among stored sets.
    pub is_virtual: bool,
}

impl Candidate {
    pub fn new(id: &str, title: &str) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            last_accessed: 0,
            is_virtual: false,
        }
    }

    pub fn virtual_active(id: &str, title: &str) -> Self {
        Self {
            is_virtual: true,
            ..Self::new(id, title)
        }
    }

    pub fn with_last_accessed(mut self, last_accessed: i64) -> Self {
        self.last_accessed = last_accessed;
        self
    }
}

/// A shortcut living either inside a stored set or inside the slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookmarkItem {
    pub id: String,
    pub title: String,
    pub url: Option<String>,
}

impl BookmarkItem {
    pub fn new(id: &str, title: &str, url: Option<&str>) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            url: url.map(str::to_string),
        }
    }
}

/// Persisted record of which set occupies the slot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveState {
    pub active_id: Option<String>,
    pub active_title: Option<String>,
    pub access_times: BTreeMap<String, i64>,
}

impl ActiveState {
    pub fn is_active(&self, id: &str) -> bool {
        self.active_id.as_deref() == Some(id)
    }

    pub fn access_time(&self, id: &str) -> i64 {
        self.access_times.get(id).copied().unwrap_or(0)
    }

    pub fn latest_access(&self) -> i64 {
        self.access_times.values().copied().max().unwrap_or(0)
    }

    pub fn has_initial_name(&self) -> bool {
        self.active_title
            .as_deref()
            .is_some_and(|title| !title.trim().is_empty())
    }
}

/// Lower-cases `input` one character at a time, remembering which source
/// character every folded character came from.
///
/// Some characters fold to more than one character, so offsets computed on the
/// folded text have to be mapped back through the returned origins before they
/// can index the original string.
pub fn fold_case(input: &str) -> (Vec<char>, Vec<usize>) {
    let mut folded = Vec::with_capacity(input.len());
    let mut origins = Vec::with_capacity(input.len());
    for (char_index, ch) in input.chars().enumerate() {
        for lower in ch.to_lowercase() {
            folded.push(lower);
            origins.push(char_index);
        }
    }
    (folded, origins)
}
