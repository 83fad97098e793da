//! Discord implementation of the [`Messenger`] boundary.
//!
//! Discord bans are permanent, so time-boxed bans are lifted by a tokio task
//! after the ban period. Pending unbans do not survive a restart.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serenity::async_trait;
use serenity::http::Http;
use serenity::model::id::{ChannelId, GuildId, MessageId, RoleId, UserId};
use serenity::model::user::User;

use crate::error::{Result, WardenError};
use crate::messenger::{ChatMember, Messenger};
use crate::models::UserKey;

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// Page size for member listing, the Discord maximum.
const MEMBER_PAGE: u64 = 1000;

/// Map a Discord user to a ledger key. System accounts cannot be tracked.
pub fn user_key(user: &User) -> UserKey {
    if user.system {
        UserKey::Untrackable
    } else {
        UserKey::from_handle(Some(&user.name))
    }
}

/// How long a ban of `days` days lasts.
pub fn ban_period(days: u32) -> Duration {
    Duration::from_secs(u64::from(days) * SECONDS_PER_DAY)
}

/// The guild owner and holders of an administrator role count as admins.
fn is_administrator(
    user_id: UserId,
    member_roles: &[RoleId],
    owner_id: UserId,
    admin_roles: &HashSet<RoleId>,
) -> bool {
    user_id == owner_id || member_roles.iter().any(|r| admin_roles.contains(r))
}

/// Messenger backed by serenity's HTTP client.
pub struct DiscordMessenger {
    http: Arc<Http>,
}

impl DiscordMessenger {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }

    fn schedule_unban(&self, guild_id: GuildId, user_id: UserId, days: u32) {
        let http = Arc::clone(&self.http);
        tokio::spawn(async move {
            tokio::time::sleep(ban_period(days)).await;
            match http
                .remove_ban(guild_id, user_id, Some("Ban period elapsed"))
                .await
            {
                Ok(()) => tracing::info!(
                    guild_id = %guild_id,
                    user_id = %user_id,
                    "Ban lifted"
                ),
                Err(e) => tracing::error!(
                    guild_id = %guild_id,
                    user_id = %user_id,
                    error = %e,
                    "Failed to lift ban"
                ),
            }
        });
    }
}

#[async_trait]
impl Messenger for DiscordMessenger {
    async fn reply(&self, channel_id: u64, text: &str) -> Result<()> {
        let content = serde_json::json!({ "content": text });
        self.http
            .send_message(ChannelId::new(channel_id), vec![], &content)
            .await
            .map_err(|e| WardenError::collaborator("send message", e))?;
        Ok(())
    }

    async fn delete_message(&self, channel_id: u64, message_id: u64) -> Result<()> {
        self.http
            .delete_message(
                ChannelId::new(channel_id),
                MessageId::new(message_id),
                Some("Message from watch-listed user"),
            )
            .await
            .map_err(|e| WardenError::collaborator("delete message", e))
    }

    async fn ban(&self, chat_id: u64, user_id: u64, days: u32, reason: &str) -> Result<()> {
        let guild_id = GuildId::new(chat_id);
        let user_id = UserId::new(user_id);

        self.http
            .ban_user(guild_id, user_id, 0, Some(reason))
            .await
            .map_err(|e| WardenError::collaborator("ban", e))?;

        self.schedule_unban(guild_id, user_id, days);
        Ok(())
    }

    async fn administrators(&self, chat_id: u64) -> Result<Vec<ChatMember>> {
        let guild_id = GuildId::new(chat_id);

        let guild = self
            .http
            .get_guild(guild_id)
            .await
            .map_err(|e| WardenError::collaborator("get guild", e))?;

        let admin_roles: HashSet<RoleId> = guild
            .roles
            .values()
            .filter(|role| role.permissions.administrator())
            .map(|role| role.id)
            .collect();

        let mut admins = Vec::new();
        let mut after = None;
        loop {
            let page = self
                .http
                .get_guild_members(guild_id, Some(MEMBER_PAGE), after)
                .await
                .map_err(|e| WardenError::collaborator("list members", e))?;

            let page_len = page.len() as u64;
            after = page.last().map(|m| m.user.id.get());

            admins.extend(
                page.iter()
                    .filter(|m| {
                        is_administrator(m.user.id, &m.roles, guild.owner_id, &admin_roles)
                    })
                    .map(|m| ChatMember {
                        user_id: m.user.id.get(),
                        user: user_key(&m.user),
                    }),
            );

            if page_len < MEMBER_PAGE {
                break;
            }
        }

        Ok(admins)
    }
}
