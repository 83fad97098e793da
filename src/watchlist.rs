//! Suspicious-user watch-list.
//!
//! Listed users are removed on sight: when they join and when they post.
//! Entries only change through admin commands and never expire.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::handle_key;

/// A watch-listed handle and when it was added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WatchEntry {
    pub handle: String,
    pub added_at: DateTime<Utc>,
}

/// Insertion-ordered set of handles with case-insensitive membership.
#[derive(Debug, Default)]
pub struct WatchList {
    entries: Vec<WatchEntry>,
}

impl WatchList {
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, handle: &str) -> Option<usize> {
        let key = handle_key(handle);
        self.entries
            .iter()
            .position(|e| handle_key(&e.handle) == key)
    }

    /// Add a handle. Re-adding refreshes the timestamp but keeps the
    /// original position. Returns `true` if the handle was new.
    pub fn add(&mut self, handle: &str, now: DateTime<Utc>) -> bool {
        match self.position(handle) {
            Some(i) => {
                self.entries[i].added_at = now;
                false
            }
            None => {
                self.entries.push(WatchEntry {
                    handle: handle.to_string(),
                    added_at: now,
                });
                true
            }
        }
    }

    /// Remove a handle. Returns `false` if it was not listed.
    pub fn remove(&mut self, handle: &str) -> bool {
        match self.position(handle) {
            Some(i) => {
                self.entries.remove(i);
                true
            }
            None => false,
        }
    }

    /// Remove every entry, returning how many there were.
    pub fn remove_all(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        count
    }

    pub fn contains(&self, handle: &str) -> bool {
        self.position(handle).is_some()
    }

    /// Entries in insertion order.
    pub fn list(&self) -> &[WatchEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
