//! Core data models for Warden.

use serde::Serialize;

use crate::filter::MatchMode;
use crate::warnings::WarningThreshold;

/// Identity of a message author or joining member.
///
/// Accounts without a public handle cannot be tracked by the ledger or the
/// watch-list and are exempt from per-user moderation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum UserKey {
    Handle(String),
    Untrackable,
}

impl UserKey {
    /// Build a key from an optional handle. A leading `@` is stripped and a
    /// blank handle counts as no handle.
    ///
    /// ```
    /// use warden::models::UserKey;
    ///
    /// assert_eq!(UserKey::from_handle(Some("@eve")), UserKey::Handle("eve".to_string()));
    /// assert_eq!(UserKey::from_handle(Some("  ")), UserKey::Untrackable);
    /// assert_eq!(UserKey::from_handle(None), UserKey::Untrackable);
    /// ```
    pub fn from_handle(handle: Option<&str>) -> Self {
        match handle.map(normalize_handle) {
            Some(h) if !h.is_empty() => Self::Handle(h),
            _ => Self::Untrackable,
        }
    }

    /// The handle, if this user is trackable.
    pub fn handle(&self) -> Option<&str> {
        match self {
            Self::Handle(h) => Some(h),
            Self::Untrackable => None,
        }
    }
}

/// Trim whitespace and a leading `@` from a handle typed by an admin.
pub fn normalize_handle(raw: &str) -> String {
    raw.trim().trim_start_matches('@').to_string()
}

/// Key used for case-insensitive lookups of a handle.
pub fn handle_key(handle: &str) -> String {
    handle.to_lowercase()
}

/// A text message delivered by the messaging platform.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub chat_id: u64,
    pub channel_id: u64,
    pub message_id: u64,
    pub author_id: u64,
    pub author: UserKey,
    pub text: String,
}

/// A member who just joined a chat.
#[derive(Debug, Clone)]
pub struct JoinedMember {
    pub user_id: u64,
    pub user: UserKey,
}

/// One or more members joining a chat.
#[derive(Debug, Clone)]
pub struct JoinEvent {
    pub chat_id: u64,
    /// Channel for greetings and notices. `None` when the chat has none.
    pub channel_id: Option<u64>,
    pub members: Vec<JoinedMember>,
}

/// Per-chat policy configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModerationSettings {
    /// Global kill-switch for all moderation in the chat.
    pub enabled: bool,
    pub match_mode: MatchMode,
    pub warning_threshold: WarningThreshold,
}

impl Default for ModerationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            match_mode: MatchMode::Strict,
            warning_threshold: WarningThreshold::default(),
        }
    }
}

/// Coarse label for the share of clean messages a user has sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum ReputationBand {
    NoData,
    Poor,
    Average,
    Good,
    Excellent,
}

impl ReputationBand {
    /// Classify a user from their message and violation counts.
    ///
    /// ```
    /// use warden::models::ReputationBand;
    ///
    /// assert_eq!(ReputationBand::from_counts(0, 0), ReputationBand::NoData);
    /// assert_eq!(ReputationBand::from_counts(10, 1), ReputationBand::Excellent);
    /// assert_eq!(ReputationBand::from_counts(10, 3), ReputationBand::Good);
    /// assert_eq!(ReputationBand::from_counts(10, 5), ReputationBand::Average);
    /// assert_eq!(ReputationBand::from_counts(10, 6), ReputationBand::Poor);
    /// ```
    pub fn from_counts(message_count: u64, violation_count: u64) -> Self {
        if message_count == 0 {
            return Self::NoData;
        }

        let clean = message_count.saturating_sub(violation_count);
        let ratio = clean as f64 / message_count as f64;

        if ratio >= 0.9 {
            Self::Excellent
        } else if ratio >= 0.7 {
            Self::Good
        } else if ratio >= 0.5 {
            Self::Average
        } else {
            Self::Poor
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::NoData => "no data",
            Self::Poor => "poor",
            Self::Average => "average",
            Self::Good => "good",
            Self::Excellent => "excellent",
        }
    }
}

/// Role of a user in a chat, as reported by the messaging platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChatRole {
    Admin,
    Regular,
    /// The platform could not be asked.
    Unknown,
}

impl ChatRole {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Admin => "administrator",
            Self::Regular => "member",
            Self::Unknown => "unknown",
        }
    }
}

/// Aggregate statistics for one user in one chat.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserStats {
    pub handle: String,
    pub message_count: u64,
    pub violation_count: u64,
    pub reputation: ReputationBand,
    pub watch_listed: bool,
    pub role: ChatRole,
}


#[cfg(test)]
mod property_tests {
    use crate::models::ReputationBand;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// More violations for the same message count never raise the band.
        #[test]
        fn prop_reputation_monotonic_in_violations(
            message_count in 1u64..10_000,
            a in 0u64..10_000,
            b in 0u64..10_000,
        ) {
            let fewer = a.min(b).min(message_count);
            let more = a.max(b).min(message_count);

            let better = ReputationBand::from_counts(message_count, fewer);
            let worse = ReputationBand::from_counts(message_count, more);

            prop_assert!(
                worse <= better,
                "{} violations gave {:?} but {} gave {:?}",
                more, worse, fewer, better
            );
        }

        #[test]
        fn prop_messages_always_yield_data(message_count in 1u64..10_000, violations in 0u64..10_000) {
            let band = ReputationBand::from_counts(message_count, violations.min(message_count));
            prop_assert_ne!(band, ReputationBand::NoData);
        }
    }
}
