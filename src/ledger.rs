//! Per-user message and violation counters.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::models::handle_key;

/// Default number of flagged messages shown by a history query.
pub const DEFAULT_HISTORY_LIMIT: usize = 5;

/// A message that matched a prohibited term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlaggedMessage {
    pub timestamp: DateTime<Utc>,
    pub text: String,
}

/// Counters and flagged-message history for one user.
#[derive(Debug, Clone, Default)]
pub struct ViolationRecord {
    /// Flagged messages ever seen. Equals `history.len()`.
    pub violation_count: u64,
    /// Warnings since the last threshold ban.
    pub warning_count: u32,
    /// All messages seen, flagged or not.
    pub message_count: u64,
    pub history: Vec<FlaggedMessage>,
}

/// Result of a history query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryReport {
    NoViolations,
    Found {
        /// Total violations on record.
        total: u64,
        /// Most recent entries, oldest first.
        recent: Vec<FlaggedMessage>,
    },
}

/// Resolve a requested history limit. Missing or non-positive limits fall
/// back to [`DEFAULT_HISTORY_LIMIT`].
///
/// ```
/// use warden::ledger::history_limit;
///
/// assert_eq!(history_limit(None), 5);
/// assert_eq!(history_limit(Some(0)), 5);
/// assert_eq!(history_limit(Some(-3)), 5);
/// assert_eq!(history_limit(Some(12)), 12);
/// ```
pub fn history_limit(requested: Option<i64>) -> usize {
    match requested {
        Some(n) if n > 0 => usize::try_from(n).unwrap_or(usize::MAX),
        _ => DEFAULT_HISTORY_LIMIT,
    }
}

/// Ledger of violation records keyed by case-insensitive handle.
#[derive(Debug, Default)]
pub struct ViolationLedger {
    records: HashMap<String, ViolationRecord>,
}

impl ViolationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one observed message.
    pub fn record_message(&mut self, user: &str) {
        self.records.entry(handle_key(user)).or_default().message_count += 1;
    }

    /// Append a flagged message and bump both counters.
    ///
    /// Returns the warning count after the increment.
    pub fn record_violation(&mut self, user: &str, text: &str, timestamp: DateTime<Utc>) -> u32 {
        let record = self.records.entry(handle_key(user)).or_default();
        record.history.push(FlaggedMessage {
            timestamp,
            text: text.to_string(),
        });
        record.violation_count += 1;
        record.warning_count += 1;
        record.warning_count
    }

    /// Zero the warning count after a threshold ban.
    pub fn reset_warnings(&mut self, user: &str) {
        if let Some(record) = self.records.get_mut(&handle_key(user)) {
            record.warning_count = 0;
        }
    }

    /// The most recent `limit` flagged messages, oldest first.
    pub fn history(&self, user: &str, limit: Option<i64>) -> HistoryReport {
        let Some(record) = self.get(user).filter(|r| r.violation_count > 0) else {
            return HistoryReport::NoViolations;
        };

        let limit = history_limit(limit);
        let start = record.history.len().saturating_sub(limit);

        HistoryReport::Found {
            total: record.violation_count,
            recent: record.history[start..].to_vec(),
        }
    }

    /// Wipe every violation record. Message counts survive.
    pub fn clear(&mut self) {
        for record in self.records.values_mut() {
            record.violation_count = 0;
            record.warning_count = 0;
            record.history.clear();
        }
    }

    pub fn get(&self, user: &str) -> Option<&ViolationRecord> {
        self.records.get(&handle_key(user))
    }

    /// `(message_count, violation_count)` for a user, zero when unknown.
    pub fn counts(&self, user: &str) -> (u64, u64) {
        self.get(user)
            .map(|r| (r.message_count, r.violation_count))
            .unwrap_or((0, 0))
    }
}
