//! Warden: group-chat moderation.
//!
//! Detects prohibited terms in messages under strict or total matching,
//! escalates repeat offenders from warnings to time-boxed bans, and removes
//! watch-listed users on sight.

pub mod commands;
pub mod config;
pub mod discord;
pub mod error;
pub mod filter;
pub mod health;
pub mod ledger;
pub mod messenger;
pub mod models;
pub mod pipeline;
pub mod violation_log;
pub mod warnings;
pub mod watchlist;
pub mod wordlist;
