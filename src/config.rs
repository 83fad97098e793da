//! Configuration loading from environment.
//!
//! Every setting has a default except the Discord token. Values that are set
//! but malformed are rejected rather than silently replaced by the default.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{Result, WardenError};
use crate::filter::MatchMode;
use crate::models::ModerationSettings;
use crate::warnings::{BanDurations, BanReason, WarningThreshold};

const DEFAULT_WORDLIST_PATH: &str = "badwords.txt";
const DEFAULT_VIOLATION_LOG_PATH: &str = "violations.log";
const DEFAULT_HEALTH_PORT: u16 = 8080;

/// Main configuration for the Warden bot.
#[derive(Debug, Clone)]
pub struct WardenConfig {
    /// Discord bot token.
    pub discord_token: String,
    /// One prohibited term per line.
    pub wordlist_path: PathBuf,
    pub violation_log_path: PathBuf,
    /// Initial settings of every chat.
    pub settings: ModerationSettings,
    pub ban_durations: BanDurations,
    pub health_port: u16,
}

impl WardenConfig {
    /// Load configuration from environment variables.
    ///
    /// Required environment variables:
    /// - `DISCORD_TOKEN`: Discord bot token
    ///
    /// Optional environment variables:
    /// - `WORDLIST_PATH`: term source (default: badwords.txt)
    /// - `VIOLATION_LOG_PATH`: violation log file (default: violations.log)
    /// - `WARNING_THRESHOLD`: warnings before a ban (default: 5)
    /// - `MATCH_MODE`: `strict` or `total` (default: strict)
    /// - `SUSPICIOUS_BAN_DAYS`: ban for watch-listed users (default: 3)
    /// - `EXCEED_LIMIT_BAN_DAYS`: ban for reaching the limit (default: 1)
    /// - `HEALTH_PORT`: health check port (default: 8080)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let discord_token = var("DISCORD_TOKEN")
            .ok_or_else(|| WardenError::Config("DISCORD_TOKEN not set".to_string()))?;

        let wordlist_path = var("WORDLIST_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_WORDLIST_PATH));

        let violation_log_path = var("VIOLATION_LOG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_VIOLATION_LOG_PATH));

        let warning_threshold = match parse_var::<u32>(&var, "WARNING_THRESHOLD")? {
            Some(value) => WarningThreshold::new(value)
                .map_err(|_| WardenError::Config("WARNING_THRESHOLD must be positive".to_string()))?,
            None => WarningThreshold::default(),
        };

        let match_mode = match var("MATCH_MODE") {
            Some(raw) => MatchMode::from_str(&raw)
                .map_err(|_| WardenError::Config(format!("Invalid MATCH_MODE '{}'", raw)))?,
            None => MatchMode::Strict,
        };

        let defaults = BanDurations::default();
        let ban_durations = BanDurations::new(
            parse_var(&var, "SUSPICIOUS_BAN_DAYS")?
                .unwrap_or(defaults.days(BanReason::SuspiciousUser)),
            parse_var(&var, "EXCEED_LIMIT_BAN_DAYS")?
                .unwrap_or(defaults.days(BanReason::ExceededLimit)),
        )?;

        let health_port = parse_var(&var, "HEALTH_PORT")?.unwrap_or(DEFAULT_HEALTH_PORT);

        Ok(Self {
            discord_token,
            wordlist_path,
            violation_log_path,
            settings: ModerationSettings {
                enabled: true,
                match_mode,
                warning_threshold,
            },
            ban_durations,
            health_port,
        })
    }
}

fn parse_var<T: FromStr>(var: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>> {
    var(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|_| WardenError::Config(format!("Invalid {} '{}'", key, raw)))
        })
        .transpose()
}
