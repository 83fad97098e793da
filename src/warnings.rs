//! Warning escalation.
//!
//! Each violation raises a user's warning count. Below the threshold the user
//! gets a warning with the number of chances left; reaching it triggers a
//! time-boxed ban and the count starts over.

use std::fmt;
use std::num::NonZeroU32;

use crate::error::{Result, WardenError};

/// Default number of warnings before a ban.
pub const DEFAULT_WARNING_THRESHOLD: u32 = 5;

/// Positive number of warnings that triggers a ban.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct WarningThreshold(NonZeroU32);

impl WarningThreshold {
    pub fn new(value: u32) -> Result<Self> {
        NonZeroU32::new(value)
            .map(Self)
            .ok_or_else(|| WardenError::Validation("Limit must be a positive number".to_string()))
    }

    pub fn get(&self) -> u32 {
        self.0.get()
    }
}

impl Default for WarningThreshold {
    fn default() -> Self {
        Self(NonZeroU32::MIN.saturating_add(DEFAULT_WARNING_THRESHOLD - 1))
    }
}

impl TryFrom<i64> for WarningThreshold {
    type Error = WardenError;

    fn try_from(value: i64) -> Result<Self> {
        let value = u32::try_from(value)
            .map_err(|_| WardenError::Validation("Limit must be a positive number".to_string()))?;
        Self::new(value)
    }
}

impl fmt::Display for WarningThreshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.get())
    }
}

/// Why a user is being banned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BanReason {
    /// The user is on the watch-list.
    SuspiciousUser,
    /// The user reached the warning threshold.
    ExceededLimit,
}

impl BanReason {
    pub fn description(&self) -> &'static str {
        match self {
            Self::SuspiciousUser => "Listed as a suspicious user",
            Self::ExceededLimit => "Exceeded the warning limit",
        }
    }
}

/// Ban length in days per [`BanReason`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BanDurations {
    suspicious_user: u32,
    exceeded_limit: u32,
}

impl BanDurations {
    /// Both durations must be at least one day.
    pub fn new(suspicious_user: u32, exceeded_limit: u32) -> Result<Self> {
        if suspicious_user == 0 || exceeded_limit == 0 {
            return Err(WardenError::Config(
                "Ban durations must be at least one day".to_string(),
            ));
        }
        Ok(Self {
            suspicious_user,
            exceeded_limit,
        })
    }

    pub fn days(&self, reason: BanReason) -> u32 {
        match reason {
            BanReason::SuspiciousUser => self.suspicious_user,
            BanReason::ExceededLimit => self.exceeded_limit,
        }
    }
}

impl Default for BanDurations {
    fn default() -> Self {
        Self {
            suspicious_user: 3,
            exceeded_limit: 1,
        }
    }
}

/// What to do about a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Reply with a warning; `remaining` more warnings until a ban.
    Warn { remaining: u32 },
    /// Ban straight away, bypassing the warning count.
    Ban { reason: BanReason, days: u32 },
    /// Ban for reaching the threshold. The caller must reset the user's
    /// warning count when applying this.
    ResetAndBan { days: u32 },
}

/// Turns warning counts into actions.
#[derive(Debug, Clone, Copy, Default)]
pub struct EscalationPolicy {
    durations: BanDurations,
}

impl EscalationPolicy {
    pub fn new(durations: BanDurations) -> Self {
        Self { durations }
    }

    pub fn durations(&self) -> BanDurations {
        self.durations
    }

    /// Decide the action for a warning count that was just incremented.
    pub fn evaluate(&self, warning_count: u32, threshold: WarningThreshold) -> Action {
        let threshold = threshold.get();
        if warning_count < threshold {
            Action::Warn {
                remaining: threshold - warning_count,
            }
        } else {
            Action::ResetAndBan {
                days: self.durations.days(BanReason::ExceededLimit),
            }
        }
    }

    /// Immediate ban for a watch-listed user.
    pub fn watch_list_ban(&self) -> Action {
        Action::Ban {
            reason: BanReason::SuspiciousUser,
            days: self.durations.days(BanReason::SuspiciousUser),
        }
    }
}
