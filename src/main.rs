//! Warden Discord bot entry point.
//!
//! Word-filter moderation with warning escalation, time-boxed bans and a
//! suspicious-user watch-list.

use std::sync::Arc;

use serenity::model::application::Interaction;
use serenity::model::channel::Message;
use serenity::model::gateway::Ready;
use serenity::model::guild::Member;
use serenity::prelude::*;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use warden::commands::SlashCommandHandler;
use warden::config::WardenConfig;
use warden::discord::{user_key, DiscordMessenger};
use warden::error::{ErrorContext, Result, WardenError};
use warden::health::spawn_health_server;
use warden::models::{InboundMessage, JoinEvent, JoinedMember, UserKey};
use warden::pipeline::ModerationService;
use warden::violation_log::FileViolationLog;
use warden::wordlist::WordList;

/// Main event handler for the bot.
struct WardenHandler {
    service: Arc<ModerationService>,
    command_handler: Arc<SlashCommandHandler>,
}

#[serenity::async_trait]
impl EventHandler for WardenHandler {
    async fn message(&self, _ctx: Context, msg: Message) {
        // Ignore bot messages and DMs
        if msg.author.bot {
            return;
        }
        let Some(guild_id) = msg.guild_id else {
            return;
        };

        let author = if msg.webhook_id.is_some() {
            UserKey::Untrackable
        } else {
            user_key(&msg.author)
        };

        let inbound = InboundMessage {
            chat_id: guild_id.get(),
            channel_id: msg.channel_id.get(),
            message_id: msg.id.get(),
            author_id: msg.author.id.get(),
            author,
            text: msg.content.clone(),
        };

        if let Err(e) = self.service.handle_message(&inbound).await {
            e.log_with_context(
                &ErrorContext::new("handle_message")
                    .with_chat_id(inbound.chat_id)
                    .with_user(msg.author.name.as_str()),
            );
        }
    }

    async fn guild_member_addition(&self, ctx: Context, new_member: Member) {
        let guild_id = new_member.guild_id;

        let channel_id = match ctx.http.get_guild(guild_id).await {
            Ok(guild) => guild.system_channel_id.map(|c| c.get()),
            Err(e) => {
                tracing::warn!(
                    guild_id = %guild_id,
                    error = %e,
                    "Could not look up system channel"
                );
                None
            }
        };

        let event = JoinEvent {
            chat_id: guild_id.get(),
            channel_id,
            members: vec![JoinedMember {
                user_id: new_member.user.id.get(),
                user: user_key(&new_member.user),
            }],
        };

        if let Err(e) = self.service.handle_join(&event).await {
            e.log_with_context(&ErrorContext::new("handle_join").with_chat_id(event.chat_id));
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Command(command) = interaction {
            if let Err(e) = self.command_handler.handle_command(&ctx, &command).await {
                tracing::error!(error = %e, "Failed to handle slash command");
            }
        }
    }

    async fn ready(&self, ctx: Context, ready: Ready) {
        tracing::info!(user = %ready.user.name, "Warden bot connected");

        // Register slash commands globally
        let commands = SlashCommandHandler::register_commands();
        if let Err(e) = serenity::all::Command::set_global_commands(&ctx.http, commands).await {
            tracing::error!(error = %e, "Failed to register slash commands");
        } else {
            tracing::info!("Slash commands registered");
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    // RUST_LOG overrides the default info level, e.g. RUST_LOG=warden=debug
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("Warden bot starting...");

    let config = WardenConfig::from_env()?;
    tracing::info!(
        wordlist = %config.wordlist_path.display(),
        mode = %config.settings.match_mode,
        threshold = %config.settings.warning_threshold,
        "Configuration loaded"
    );

    let words = Arc::new(WordList::open(&config.wordlist_path)?);
    spawn_health_server(config.health_port, words.clone());

    let http = Arc::new(serenity::http::Http::new(&config.discord_token));
    let messenger = Arc::new(DiscordMessenger::new(http));
    let violation_log = Arc::new(FileViolationLog::new(&config.violation_log_path));

    let service = Arc::new(
        ModerationService::new(words, messenger, violation_log)
            .with_settings(config.settings)
            .with_ban_durations(config.ban_durations),
    );
    let command_handler = Arc::new(SlashCommandHandler::new(service.clone()));

    let handler = WardenHandler {
        service,
        command_handler,
    };

    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT
        | GatewayIntents::GUILD_MEMBERS;

    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .await
        .map_err(|e| WardenError::DiscordApi(Box::new(e)))?;

    tracing::info!("Starting Discord client...");

    client
        .start()
        .await
        .map_err(|e| WardenError::DiscordApi(Box::new(e)))?;

    Ok(())
}
