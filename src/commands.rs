//! Admin command surface.
//!
//! [`AdminCommand`] parses and executes admin commands independently of the
//! transport; [`SlashCommandHandler`] exposes them as the `/warden` slash
//! command.

use std::str::FromStr;
use std::sync::Arc;

use serenity::all::{
    CommandDataOption, CommandDataOptionValue, CommandInteraction, CommandOptionType, Context,
    CreateCommand, CreateCommandOption, CreateInteractionResponse,
    CreateInteractionResponseMessage, Permissions,
};

use crate::error::{ErrorContext, Result, WardenError};
use crate::filter::MatchMode;
use crate::ledger::HistoryReport;
use crate::models::normalize_handle;
use crate::pipeline::{format_scan, ModerationService};
use crate::warnings::{BanReason, WarningThreshold};

const HELP: &str = "**Warden commands**\n\
    • `reload` re-read the word list\n\
    • `enable` / `disable` turn moderation on or off\n\
    • `status` show the current settings\n\
    • `mode [strict|total]` show or set the match mode\n\
    • `limit <N>` set the number of warnings before a ban\n\
    • `watch-add <user>` / `watch-remove <user>` edit the watch-list\n\
    • `watch-clear` empty the watch-list\n\
    • `watch-list` show the watch-list\n\
    • `history <user> [N]` last N flagged messages (default 5)\n\
    • `stats <user>` message and violation statistics\n\
    • `clear-log` wipe the violation log\n\
    • `scan` look for watch-listed administrators\n\
    • `help` this message";

/// A parsed admin command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCommand {
    Reload,
    Enable,
    Disable,
    Status,
    /// Show the mode, or set it.
    Mode(Option<MatchMode>),
    Limit(WarningThreshold),
    WatchAdd(String),
    WatchRemove(String),
    WatchRemoveAll,
    WatchList,
    History { user: String, limit: Option<i64> },
    Stats(String),
    ClearLog,
    Scan,
    Help,
}

fn required<'a>(args: &'a [String], index: usize, usage: &str) -> Result<&'a str> {
    args.get(index)
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| WardenError::Validation(format!("Usage: {}", usage)))
}

impl AdminCommand {
    /// Parse a command name and its positional arguments.
    pub fn parse(name: &str, args: &[String]) -> Result<Self> {
        let command = match name.trim().to_lowercase().as_str() {
            "reload" => Self::Reload,
            "enable" => Self::Enable,
            "disable" => Self::Disable,
            "status" => Self::Status,
            "mode" => match args.first().map(|s| s.trim()).filter(|s| !s.is_empty()) {
                Some(mode) => Self::Mode(Some(MatchMode::from_str(mode)?)),
                None => Self::Mode(None),
            },
            "limit" => {
                let raw = required(args, 0, "limit <N>")?;
                let value: i64 = raw.parse().map_err(|_| {
                    WardenError::Validation("Limit must be a positive number".to_string())
                })?;
                Self::Limit(WarningThreshold::try_from(value)?)
            }
            "watch-add" => Self::WatchAdd(required(args, 0, "watch-add <user>")?.to_string()),
            "watch-remove" => {
                Self::WatchRemove(required(args, 0, "watch-remove <user>")?.to_string())
            }
            "watch-clear" => Self::WatchRemoveAll,
            "watch-list" => Self::WatchList,
            "history" => {
                let user = required(args, 0, "history <user> [N]")?.to_string();
                let limit = match args.get(1).map(|s| s.trim()).filter(|s| !s.is_empty()) {
                    Some(raw) => Some(raw.parse::<i64>().map_err(|_| {
                        WardenError::Validation("Count must be a number".to_string())
                    })?),
                    None => None,
                };
                Self::History { user, limit }
            }
            "stats" => Self::Stats(required(args, 0, "stats <user>")?.to_string()),
            "clear-log" => Self::ClearLog,
            "scan" => Self::Scan,
            "help" => Self::Help,
            other => {
                return Err(WardenError::Validation(format!(
                    "Unknown command `{}`. Use `help` to see the available commands",
                    other
                )))
            }
        };
        Ok(command)
    }

    /// Run the command against a chat and build the reply.
    pub async fn execute(&self, service: &ModerationService, chat_id: u64) -> Result<String> {
        match self {
            Self::Reload => {
                let count = service.reload_terms().await?;
                Ok(format!("✅ Word list reloaded: {} terms.", count))
            }
            Self::Enable => {
                service.set_enabled(chat_id, true).await;
                Ok("✅ Moderation enabled.".to_string())
            }
            Self::Disable => {
                service.set_enabled(chat_id, false).await;
                Ok("⏸️ Moderation disabled.".to_string())
            }
            Self::Status => {
                let status = service.status(chat_id).await?;
                Ok(format!(
                    "**Warden status**\n\
                     • Moderation: {}\n\
                     • Match mode: {}\n\
                     • Warning limit: {}\n\
                     • Ban for suspicious users: {} days\n\
                     • Ban for exceeding the limit: {} days\n\
                     • Prohibited terms: {} (version {})\n\
                     • Watch-listed users: {}",
                    if status.settings.enabled { "enabled" } else { "disabled" },
                    status.settings.match_mode,
                    status.settings.warning_threshold,
                    status.durations.days(BanReason::SuspiciousUser),
                    status.durations.days(BanReason::ExceededLimit),
                    status.term_count,
                    status.term_version,
                    status.watch_listed,
                ))
            }
            Self::Mode(None) => {
                let settings = service.settings(chat_id).await;
                Ok(format!("Current match mode: {}", settings.match_mode))
            }
            Self::Mode(Some(mode)) => {
                service.set_match_mode(chat_id, *mode).await;
                Ok(format!("✅ Match mode set to {}.", mode))
            }
            Self::Limit(threshold) => {
                service.set_warning_threshold(chat_id, *threshold).await;
                Ok(format!("✅ Warning limit set to {}.", threshold))
            }
            Self::WatchAdd(user) => {
                let added = service.watch_add(chat_id, user).await?;
                let handle = normalize_handle(user);
                Ok(if added {
                    format!("✅ @{} added to the watch-list.", handle)
                } else {
                    format!("✅ @{} is already on the watch-list, date updated.", handle)
                })
            }
            Self::WatchRemove(user) => {
                let removed = service.watch_remove(chat_id, user).await?;
                let handle = normalize_handle(user);
                Ok(if removed {
                    format!("✅ @{} removed from the watch-list.", handle)
                } else {
                    format!("❓ @{} not found on the watch-list.", handle)
                })
            }
            Self::WatchRemoveAll => {
                let count = service.watch_remove_all(chat_id).await;
                Ok(format!("✅ Watch-list cleared ({} removed).", count))
            }
            Self::WatchList => {
                let entries = service.watch_list(chat_id).await;
                if entries.is_empty() {
                    return Ok("The watch-list is empty.".to_string());
                }
                let mut response = String::from("🕵️ **Watch-list**\n");
                for entry in entries {
                    response.push_str(&format!(
                        "• @{} (added {})\n",
                        entry.handle,
                        entry.added_at.format("%Y-%m-%d %H:%M")
                    ));
                }
                Ok(response)
            }
            Self::History { user, limit } => {
                let handle = normalize_handle(user);
                match service.history(chat_id, user, *limit).await? {
                    HistoryReport::NoViolations => {
                        Ok(format!("@{} has no violations.", handle))
                    }
                    HistoryReport::Found { total, recent } => {
                        let mut response = format!(
                            "📜 **@{}**: {} violation{}\nLast {}:\n",
                            handle,
                            total,
                            if total == 1 { "" } else { "s" },
                            recent.len()
                        );
                        for flagged in recent {
                            response.push_str(&format!(
                                "[{}] {}\n",
                                flagged.timestamp.format("%Y-%m-%d %H:%M:%S"),
                                flagged.text
                            ));
                        }
                        Ok(response)
                    }
                }
            }
            Self::Stats(user) => {
                let stats = service.stats(chat_id, user).await?;
                Ok(format!(
                    "📊 **@{}**\n\
                     • Messages: {}\n\
                     • Violations: {}\n\
                     • Reputation: {}\n\
                     • Watch-listed: {}\n\
                     • Role: {}",
                    stats.handle,
                    stats.message_count,
                    stats.violation_count,
                    stats.reputation.label(),
                    if stats.watch_listed { "yes" } else { "no" },
                    stats.role.label(),
                ))
            }
            Self::ClearLog => {
                service.clear_violation_log().await?;
                Ok("✅ Violation log cleared.".to_string())
            }
            Self::Scan => {
                let found = service.scan_administrators(chat_id).await?;
                Ok(format_scan(&found))
            }
            Self::Help => Ok(HELP.to_string()),
        }
    }
}

/// Named options each subcommand takes, in positional order.
fn option_names(subcommand: &str) -> &'static [&'static str] {
    match subcommand {
        "mode" => &["mode"],
        "limit" => &["value"],
        "watch-add" | "watch-remove" | "stats" => &["user"],
        "history" => &["user", "count"],
        _ => &[],
    }
}

/// Flatten a subcommand's options into positional arguments. Stops at the
/// first missing option.
fn positional_args(subcommand: &str, options: &[CommandDataOption]) -> Vec<String> {
    option_names(subcommand)
        .iter()
        .map_while(|name| {
            options
                .iter()
                .find(|o| o.name == *name)
                .and_then(|o| match &o.value {
                    CommandDataOptionValue::String(s) => Some(s.clone()),
                    CommandDataOptionValue::Integer(n) => Some(n.to_string()),
                    _ => None,
                })
        })
        .collect()
}

fn user_option(name: &'static str, description: &'static str) -> CreateCommandOption {
    CreateCommandOption::new(CommandOptionType::SubCommand, name, description).add_sub_option(
        CreateCommandOption::new(CommandOptionType::String, "user", "Username").required(true),
    )
}

fn plain(name: &'static str, description: &'static str) -> CreateCommandOption {
    CreateCommandOption::new(CommandOptionType::SubCommand, name, description)
}

/// Slash command handler.
pub struct SlashCommandHandler {
    service: Arc<ModerationService>,
}

impl SlashCommandHandler {
    pub fn new(service: Arc<ModerationService>) -> Self {
        Self { service }
    }

    /// Register all slash commands with Discord.
    pub fn register_commands() -> Vec<CreateCommand> {
        vec![Self::create_warden_command()]
    }

    fn create_warden_command() -> CreateCommand {
        CreateCommand::new("warden")
            .description("Warden moderation commands")
            .default_member_permissions(Permissions::ADMINISTRATOR)
            .add_option(plain("reload", "Re-read the word list"))
            .add_option(plain("enable", "Turn moderation on"))
            .add_option(plain("disable", "Turn moderation off"))
            .add_option(plain("status", "Show the current settings"))
            .add_option(
                plain("mode", "Show or set the match mode").add_sub_option(
                    CreateCommandOption::new(CommandOptionType::String, "mode", "Match mode")
                        .required(false)
                        .add_string_choice("strict", "strict")
                        .add_string_choice("total", "total"),
                ),
            )
            .add_option(
                plain("limit", "Set the number of warnings before a ban").add_sub_option(
                    CreateCommandOption::new(CommandOptionType::Integer, "value", "Warnings")
                        .required(true),
                ),
            )
            .add_option(user_option("watch-add", "Add a user to the watch-list"))
            .add_option(user_option("watch-remove", "Remove a user from the watch-list"))
            .add_option(plain("watch-clear", "Empty the watch-list"))
            .add_option(plain("watch-list", "Show the watch-list"))
            .add_option(
                user_option("history", "Show a user's flagged messages").add_sub_option(
                    CreateCommandOption::new(
                        CommandOptionType::Integer,
                        "count",
                        "How many messages to show",
                    )
                    .required(false),
                ),
            )
            .add_option(user_option("stats", "Show a user's statistics"))
            .add_option(plain("clear-log", "Wipe the violation log"))
            .add_option(plain("scan", "Look for watch-listed administrators"))
            .add_option(plain("help", "List the commands"))
    }

    /// Handle an incoming slash command interaction.
    pub async fn handle_command(&self, ctx: &Context, command: &CommandInteraction) -> Result<()> {
        if !Self::check_permissions(command) {
            return self
                .respond_error(
                    ctx,
                    command,
                    "You don't have permission to use this command.",
                )
                .await;
        }

        let Some(guild_id) = command.guild_id else {
            return self
                .respond_error(ctx, command, "Command must be used in a server.")
                .await;
        };

        let subcommand = command.data.options.first();
        let name = subcommand.map(|o| o.name.as_str()).unwrap_or("help");

        // Subcommand options are nested inside the subcommand value
        let args = match subcommand.map(|o| &o.value) {
            Some(CommandDataOptionValue::SubCommand(options)) => positional_args(name, options),
            _ => Vec::new(),
        };

        let result = match AdminCommand::parse(name, &args) {
            Ok(parsed) => parsed.execute(&self.service, guild_id.get()).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(response) => self.respond_message(ctx, command, &response).await,
            Err(e) => {
                e.log_with_context(
                    &ErrorContext::new(format!("command:{}", name))
                        .with_chat_id(guild_id.get())
                        .with_user(command.user.name.as_str()),
                );
                self.respond_error(ctx, command, &e.user_message()).await
            }
        }
    }

    fn check_permissions(command: &CommandInteraction) -> bool {
        command
            .member
            .as_ref()
            .and_then(|m| m.permissions)
            .is_some_and(|p| p.administrator())
    }

    /// Send a response message.
    async fn respond_message(
        &self,
        ctx: &Context,
        command: &CommandInteraction,
        content: &str,
    ) -> Result<()> {
        let response = CreateInteractionResponse::Message(
            CreateInteractionResponseMessage::new()
                .content(content)
                .ephemeral(true),
        );

        match command.create_response(&ctx.http, response).await {
            Ok(()) => Ok(()),
            Err(e) => {
                // Discord may time out or another instance may respond first
                if e.to_string().contains("already been acknowledged") {
                    Ok(())
                } else {
                    Err(WardenError::DiscordApi(Box::new(e)))
                }
            }
        }
    }

    async fn respond_error(
        &self,
        ctx: &Context,
        command: &CommandInteraction,
        message: &str,
    ) -> Result<()> {
        self.respond_message(ctx, command, &format!("❌ {}", message))
            .await
    }
}
