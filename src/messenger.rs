//! Boundary to the chat platform.
//!
//! The moderation core only issues commands through [`Messenger`] and treats
//! every call as fire-and-forget: failures are logged by the caller and never
//! roll back state that was already committed.

use serenity::async_trait;

use crate::error::Result;
use crate::models::UserKey;

/// A member of a chat as reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMember {
    pub user_id: u64,
    pub user: UserKey,
}

/// Commands the moderation core sends to the chat platform.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Post a message in a channel.
    async fn reply(&self, channel_id: u64, text: &str) -> Result<()>;

    /// Delete one message.
    async fn delete_message(&self, channel_id: u64, message_id: u64) -> Result<()>;

    /// Remove a user from a chat for `days` days.
    async fn ban(&self, chat_id: u64, user_id: u64, days: u32, reason: &str) -> Result<()>;

    /// Current administrators of a chat.
    async fn administrators(&self, chat_id: u64) -> Result<Vec<ChatMember>>;
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use serenity::async_trait;

    use crate::error::{Result, WardenError};
    use crate::messenger::{ChatMember, Messenger};

    /// A call made against [`RecordingMessenger`].
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Call {
        Reply { channel_id: u64, text: String },
        Delete { channel_id: u64, message_id: u64 },
        Ban { chat_id: u64, user_id: u64, days: u32 },
    }

    /// In-memory messenger that records calls and can be told to fail.
    #[derive(Default)]
    pub struct RecordingMessenger {
        calls: Mutex<Vec<Call>>,
        admins: Mutex<Vec<ChatMember>>,
        fail: Mutex<bool>,
    }

    impl RecordingMessenger {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_admins(&self, admins: Vec<ChatMember>) {
            *self.admins.lock().unwrap() = admins;
        }

        pub fn fail_all(&self, fail: bool) {
            *self.fail.lock().unwrap() = fail;
        }

        pub fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        pub fn replies(&self) -> Vec<String> {
            self.calls()
                .into_iter()
                .filter_map(|c| match c {
                    Call::Reply { text, .. } => Some(text),
                    _ => None,
                })
                .collect()
        }

        pub fn bans(&self) -> Vec<(u64, u32)> {
            self.calls()
                .into_iter()
                .filter_map(|c| match c {
                    Call::Ban { user_id, days, .. } => Some((user_id, days)),
                    _ => None,
                })
                .collect()
        }

        fn record(&self, call: Call, operation: &'static str) -> Result<()> {
            self.calls.lock().unwrap().push(call);
            if *self.fail.lock().unwrap() {
                return Err(WardenError::collaborator(operation, "simulated failure"));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl Messenger for RecordingMessenger {
        async fn reply(&self, channel_id: u64, text: &str) -> Result<()> {
            self.record(
                Call::Reply {
                    channel_id,
                    text: text.to_string(),
                },
                "reply",
            )
        }

        async fn delete_message(&self, channel_id: u64, message_id: u64) -> Result<()> {
            self.record(
                Call::Delete {
                    channel_id,
                    message_id,
                },
                "delete message",
            )
        }

        async fn ban(&self, chat_id: u64, user_id: u64, days: u32, _reason: &str) -> Result<()> {
            self.record(
                Call::Ban {
                    chat_id,
                    user_id,
                    days,
                },
                "ban",
            )
        }

        async fn administrators(&self, _chat_id: u64) -> Result<Vec<ChatMember>> {
            if *self.fail.lock().unwrap() {
                return Err(WardenError::collaborator("list administrators", "simulated failure"));
            }
            Ok(self.admins.lock().unwrap().clone())
        }
    }
}
