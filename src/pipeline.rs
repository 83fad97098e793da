//! Moderation orchestration.
//!
//! Composes the word list, violation ledger, escalation policy and watch-list
//! into the per-message and per-join state machines, and exposes the admin
//! operations. State is kept per chat so policies never leak between chats.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use rand::seq::SliceRandom;
use tokio::sync::{Mutex, RwLock};

use crate::error::{ErrorContext, Result, WardenError};
use crate::filter::MatchMode;
use crate::ledger::{HistoryReport, ViolationLedger};
use crate::messenger::Messenger;
use crate::models::{
    handle_key, normalize_handle, ChatRole, InboundMessage, JoinEvent, ModerationSettings,
    ReputationBand, UserStats,
};
use crate::violation_log::ViolationLog;
use crate::warnings::{Action, BanDurations, BanReason, EscalationPolicy, WarningThreshold};
use crate::watchlist::{WatchEntry, WatchList};
use crate::wordlist::WordList;

const WARNINGS: &[&str] = &[
    "@{user}, that kind of language is not allowed here! ⚠️",
    "Hey @{user}, watch your language! 🚫",
    "@{user}, that word is banned in this chat!",
    "Whoa, @{user}, you can't talk like that here! 🙊",
];

const GREETINGS: &[&str] = &[
    "Welcome, {user}! 🎉",
    "Hi {user}! Glad to see you in our group! 😊",
    "{user}, welcome to our cozy chat! 🥳",
];

/// Pick a random phrase and fill in the user.
fn phrase(choices: &[&str], user: &str) -> String {
    choices
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or("{user}")
        .replace("{user}", user)
}

/// What happened to an inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOutcome {
    /// Moderation is switched off in this chat.
    Disabled,
    /// The author has no handle and cannot be tracked.
    Untracked,
    /// The author is watch-listed and was removed.
    WatchListRemoved,
    /// No prohibited term found.
    Clean,
    /// A prohibited term was found and `action` applied.
    Violation { action: Action, violation_count: u64 },
}

/// What happened to one joining member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    Banned { user_id: u64 },
    Greeted { user_id: u64 },
}

/// Snapshot of a chat's configuration for the status command.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusReport {
    pub settings: ModerationSettings,
    pub durations: BanDurations,
    pub term_count: usize,
    pub term_version: u64,
    pub watch_listed: usize,
}

/// Isolated moderation state of one chat.
pub struct ChatState {
    settings: RwLock<ModerationSettings>,
    ledger: Mutex<ViolationLedger>,
    watchlist: RwLock<WatchList>,
}

impl ChatState {
    fn new(settings: ModerationSettings) -> Self {
        Self {
            settings: RwLock::new(settings),
            ledger: Mutex::new(ViolationLedger::new()),
            watchlist: RwLock::new(WatchList::new()),
        }
    }
}

/// The moderation service.
pub struct ModerationService {
    words: Arc<WordList>,
    chats: DashMap<u64, Arc<ChatState>>,
    /// Settings a chat starts with.
    defaults: ModerationSettings,
    policy: EscalationPolicy,
    messenger: Arc<dyn Messenger>,
    violation_log: Arc<dyn ViolationLog>,
}

impl ModerationService {
    /// Create a service with default settings and ban durations.
    pub fn new(
        words: Arc<WordList>,
        messenger: Arc<dyn Messenger>,
        violation_log: Arc<dyn ViolationLog>,
    ) -> Self {
        Self {
            words,
            chats: DashMap::new(),
            defaults: ModerationSettings::default(),
            policy: EscalationPolicy::default(),
            messenger,
            violation_log,
        }
    }

    /// Settings every chat starts with.
    pub fn with_settings(mut self, defaults: ModerationSettings) -> Self {
        self.defaults = defaults;
        self
    }

    /// Ban durations per reason.
    pub fn with_ban_durations(mut self, durations: BanDurations) -> Self {
        self.policy = EscalationPolicy::new(durations);
        self
    }

    pub fn words(&self) -> &Arc<WordList> {
        &self.words
    }

    fn chat(&self, chat_id: u64) -> Arc<ChatState> {
        Arc::clone(
            &self
                .chats
                .entry(chat_id)
                .or_insert_with(|| Arc::new(ChatState::new(self.defaults))),
        )
    }

    /// Log a failed platform call without aborting the caller.
    fn report(&self, result: Result<()>, context: ErrorContext) {
        if let Err(e) = result {
            e.log_with_context(&context);
        }
    }

    /// Process one inbound message.
    pub async fn handle_message(&self, message: &InboundMessage) -> Result<MessageOutcome> {
        let state = self.chat(message.chat_id);
        let settings = *state.settings.read().await;

        if !settings.enabled {
            return Ok(MessageOutcome::Disabled);
        }

        let Some(handle) = message.author.handle() else {
            WardenError::UntrackableUser.log_with_context(
                &ErrorContext::new("handle_message").with_chat_id(message.chat_id),
            );
            return Ok(MessageOutcome::Untracked);
        };

        if state.watchlist.read().await.contains(handle) {
            self.remove_watch_listed(message, handle).await;
            return Ok(MessageOutcome::WatchListRemoved);
        }

        state.ledger.lock().await.record_message(handle);

        let terms = self.words.snapshot()?;
        if !terms.matches(&message.text, settings.match_mode) {
            return Ok(MessageOutcome::Clean);
        }

        let now = Utc::now();
        let (action, violation_count) = {
            let mut ledger = state.ledger.lock().await;
            let warnings = ledger.record_violation(handle, &message.text, now);
            let action = self.policy.evaluate(warnings, settings.warning_threshold);
            if matches!(action, Action::ResetAndBan { .. }) {
                ledger.reset_warnings(handle);
            }
            (action, ledger.counts(handle).1)
        };

        tracing::info!(
            chat_id = message.chat_id,
            user = %handle,
            violation_count = violation_count,
            action = ?action,
            mode = %settings.match_mode,
            "Prohibited term detected"
        );

        let context = || {
            ErrorContext::new("violation")
                .with_chat_id(message.chat_id)
                .with_user(handle)
        };

        let warning = phrase(WARNINGS, handle);
        self.report(
            self.messenger.reply(message.channel_id, &warning).await,
            context(),
        );
        self.report(
            self.violation_log.append(now, handle, &message.text).await,
            context(),
        );

        self.apply_action(message, handle, action).await;

        Ok(MessageOutcome::Violation {
            action,
            violation_count,
        })
    }

    /// Carry out an escalation decision for the author of `message`.
    async fn apply_action(&self, message: &InboundMessage, handle: &str, action: Action) {
        let context = ErrorContext::new("apply_action")
            .with_chat_id(message.chat_id)
            .with_user(handle);

        let (reason, days) = match action {
            Action::Warn { remaining } => {
                let notice = format!(
                    "@{}, {} more warning{} and you will be banned.",
                    handle,
                    remaining,
                    if remaining == 1 { "" } else { "s" }
                );
                self.report(
                    self.messenger.reply(message.channel_id, &notice).await,
                    context,
                );
                return;
            }
            Action::Ban { reason, days } => (reason, days),
            Action::ResetAndBan { days } => (BanReason::ExceededLimit, days),
        };

        self.report(
            self.messenger
                .ban(message.chat_id, message.author_id, days, reason.description())
                .await,
            context.clone(),
        );

        tracing::info!(
            chat_id = message.chat_id,
            user = %handle,
            days = days,
            reason = ?reason,
            "User banned"
        );

        let notice = format!(
            "⛔ @{} has been banned for {} day{}: {}.",
            handle,
            days,
            if days == 1 { "" } else { "s" },
            reason.description().to_lowercase()
        );
        self.report(
            self.messenger.reply(message.channel_id, &notice).await,
            context,
        );
    }

    /// Delete a watch-listed user's message and ban them.
    async fn remove_watch_listed(&self, message: &InboundMessage, handle: &str) {
        tracing::warn!(
            chat_id = message.chat_id,
            user = %handle,
            "Message from watch-listed user"
        );

        self.report(
            self.messenger
                .delete_message(message.channel_id, message.message_id)
                .await,
            ErrorContext::new("delete_message")
                .with_chat_id(message.chat_id)
                .with_user(handle),
        );

        self.apply_action(message, handle, self.policy.watch_list_ban())
            .await;
    }

    /// Process members joining a chat.
    ///
    /// Watch-listed members are banned on the spot; everyone else is greeted.
    /// Afterwards the current administrators are checked against the
    /// watch-list.
    pub async fn handle_join(&self, event: &JoinEvent) -> Result<Vec<JoinOutcome>> {
        let state = self.chat(event.chat_id);
        if !state.settings.read().await.enabled {
            return Ok(Vec::new());
        }

        let mut outcomes = Vec::with_capacity(event.members.len());

        for member in &event.members {
            let handle = member.user.handle();
            let listed = match handle {
                Some(h) => state.watchlist.read().await.contains(h),
                None => false,
            };

            if listed {
                let handle = handle.unwrap_or_default();
                let days = self.policy.durations().days(BanReason::SuspiciousUser);
                let context = ErrorContext::new("join_ban")
                    .with_chat_id(event.chat_id)
                    .with_user(handle);

                self.report(
                    self.messenger
                        .ban(
                            event.chat_id,
                            member.user_id,
                            days,
                            BanReason::SuspiciousUser.description(),
                        )
                        .await,
                    context.clone(),
                );

                tracing::warn!(
                    chat_id = event.chat_id,
                    user = %handle,
                    days = days,
                    "Watch-listed user joined and was banned"
                );

                if let Some(channel_id) = event.channel_id {
                    let notice = format!(
                        "⛔ @{} is on the watch-list and has been banned for {} day{}.",
                        handle,
                        days,
                        if days == 1 { "" } else { "s" }
                    );
                    self.report(self.messenger.reply(channel_id, &notice).await, context);
                }

                outcomes.push(JoinOutcome::Banned {
                    user_id: member.user_id,
                });
            } else {
                if let Some(channel_id) = event.channel_id {
                    let greeting = phrase(GREETINGS, handle.unwrap_or("friend"));
                    self.report(
                        self.messenger.reply(channel_id, &greeting).await,
                        ErrorContext::new("greet").with_chat_id(event.chat_id),
                    );
                }
                outcomes.push(JoinOutcome::Greeted {
                    user_id: member.user_id,
                });
            }
        }

        match self.scan_administrators(event.chat_id).await {
            Ok(found) if !found.is_empty() => {
                tracing::warn!(
                    chat_id = event.chat_id,
                    admins = ?found,
                    "Watch-listed users hold admin rights"
                );
                if let Some(channel_id) = event.channel_id {
                    self.report(
                        self.messenger
                            .reply(channel_id, &format_scan(&found))
                            .await,
                        ErrorContext::new("scan").with_chat_id(event.chat_id),
                    );
                }
            }
            Ok(_) => {}
            Err(e) => e.log_with_context(&ErrorContext::new("scan").with_chat_id(event.chat_id)),
        }

        Ok(outcomes)
    }

    /// Administrators of a chat who are on its watch-list. Read-only.
    pub async fn scan_administrators(&self, chat_id: u64) -> Result<Vec<String>> {
        let admins = self.messenger.administrators(chat_id).await?;
        let state = self.chat(chat_id);
        let watchlist = state.watchlist.read().await;

        Ok(admins
            .iter()
            .filter_map(|m| m.user.handle())
            .filter(|h| watchlist.contains(h))
            .map(str::to_string)
            .collect())
    }

    /// Re-read the term source. Returns the new term count.
    pub async fn reload_terms(&self) -> Result<usize> {
        let words = Arc::clone(&self.words);
        tokio::task::spawn_blocking(move || words.reload())
            .await
            .map_err(|e| WardenError::InternalState(format!("reload task failed: {}", e)))?
    }

    pub async fn settings(&self, chat_id: u64) -> ModerationSettings {
        *self.chat(chat_id).settings.read().await
    }

    pub async fn set_enabled(&self, chat_id: u64, enabled: bool) {
        self.chat(chat_id).settings.write().await.enabled = enabled;
        tracing::info!(chat_id = chat_id, enabled = enabled, "Moderation toggled");
    }

    pub async fn set_match_mode(&self, chat_id: u64, mode: MatchMode) {
        self.chat(chat_id).settings.write().await.match_mode = mode;
        tracing::info!(chat_id = chat_id, mode = %mode, "Match mode changed");
    }

    /// Takes effect on the next violation; issued warnings stay as they are.
    pub async fn set_warning_threshold(&self, chat_id: u64, threshold: WarningThreshold) {
        self.chat(chat_id).settings.write().await.warning_threshold = threshold;
        tracing::info!(chat_id = chat_id, threshold = %threshold, "Warning threshold changed");
    }

    pub async fn status(&self, chat_id: u64) -> Result<StatusReport> {
        let state = self.chat(chat_id);
        let terms = self.words.snapshot()?;
        let settings = *state.settings.read().await;
        let watch_listed = state.watchlist.read().await.len();

        Ok(StatusReport {
            settings,
            durations: self.policy.durations(),
            term_count: terms.len(),
            term_version: terms.version(),
            watch_listed,
        })
    }

    /// Add a handle to the watch-list. Returns `true` if it was new.
    pub async fn watch_add(&self, chat_id: u64, handle: &str) -> Result<bool> {
        let handle = require_handle(handle)?;
        let added = self
            .chat(chat_id)
            .watchlist
            .write()
            .await
            .add(&handle, Utc::now());
        tracing::info!(chat_id = chat_id, user = %handle, "Added to watch-list");
        Ok(added)
    }

    /// Remove a handle from the watch-list. Returns `false` if not listed.
    pub async fn watch_remove(&self, chat_id: u64, handle: &str) -> Result<bool> {
        let handle = require_handle(handle)?;
        let removed = self.chat(chat_id).watchlist.write().await.remove(&handle);
        if removed {
            tracing::info!(chat_id = chat_id, user = %handle, "Removed from watch-list");
        }
        Ok(removed)
    }

    pub async fn watch_remove_all(&self, chat_id: u64) -> usize {
        let removed = self.chat(chat_id).watchlist.write().await.remove_all();
        tracing::info!(chat_id = chat_id, removed = removed, "Watch-list cleared");
        removed
    }

    pub async fn watch_list(&self, chat_id: u64) -> Vec<WatchEntry> {
        self.chat(chat_id).watchlist.read().await.list().to_vec()
    }

    /// Recent flagged messages of a user. Non-positive or missing limits
    /// show the default window.
    pub async fn history(&self, chat_id: u64, handle: &str, limit: Option<i64>) -> Result<HistoryReport> {
        let handle = require_handle(handle)?;
        Ok(self.chat(chat_id).ledger.lock().await.history(&handle, limit))
    }

    /// Aggregate statistics of a user.
    pub async fn stats(&self, chat_id: u64, handle: &str) -> Result<UserStats> {
        let handle = require_handle(handle)?;
        let state = self.chat(chat_id);

        let (message_count, violation_count) = state.ledger.lock().await.counts(&handle);
        let watch_listed = state.watchlist.read().await.contains(&handle);

        let role = match self.messenger.administrators(chat_id).await {
            Ok(admins) => {
                let key = handle_key(&handle);
                let is_admin = admins
                    .iter()
                    .filter_map(|m| m.user.handle())
                    .any(|h| handle_key(h) == key);
                if is_admin {
                    ChatRole::Admin
                } else {
                    ChatRole::Regular
                }
            }
            Err(e) => {
                e.log_with_context(
                    &ErrorContext::new("stats")
                        .with_chat_id(chat_id)
                        .with_user(handle.as_str()),
                );
                ChatRole::Unknown
            }
        };

        Ok(UserStats {
            reputation: ReputationBand::from_counts(message_count, violation_count),
            handle,
            message_count,
            violation_count,
            watch_listed,
            role,
        })
    }

    /// Truncate the violation log and wipe the violation records of every
    /// chat. Message counts and watch-lists are kept. If the log cannot be
    /// truncated nothing is wiped.
    pub async fn clear_violation_log(&self) -> Result<()> {
        self.violation_log.clear().await?;

        let states: Vec<Arc<ChatState>> = self
            .chats
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        for state in states {
            state.ledger.lock().await.clear();
        }

        tracing::info!("Violation log cleared");
        Ok(())
    }
}

fn require_handle(raw: &str) -> Result<String> {
    let handle = normalize_handle(raw);
    if handle.is_empty() {
        return Err(WardenError::Validation("Please specify a username".to_string()));
    }
    Ok(handle)
}

/// Notice listing watch-listed administrators.
pub fn format_scan(found: &[String]) -> String {
    if found.is_empty() {
        return "✅ No suspicious members found.".to_string();
    }
    let lines: Vec<String> = found.iter().map(|h| format!("@{}", h)).collect();
    format!("⚠️ Suspicious members found:\n{}", lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use chrono::{DateTime, Utc};
    use serenity::async_trait;

    use crate::error::{Result, WardenError};
    use crate::filter::MatchMode;
    use crate::ledger::HistoryReport;
    use crate::messenger::testing::{Call, RecordingMessenger};
    use crate::messenger::ChatMember;
    use crate::models::{
        ChatRole, InboundMessage, JoinEvent, JoinedMember, ModerationSettings, ReputationBand,
        UserKey,
    };
    use crate::pipeline::{JoinOutcome, MessageOutcome, ModerationService};
    use crate::violation_log::ViolationLog;
    use crate::warnings::{Action, BanDurations, WarningThreshold};
    use crate::wordlist::{TermSet, WordList};

    const CHAT: u64 = 100;
    const CHANNEL: u64 = 200;

    #[derive(Default)]
    struct MemoryLog {
        entries: Mutex<Vec<(String, String)>>,
        fail_clear: bool,
    }

    #[async_trait]
    impl ViolationLog for MemoryLog {
        async fn append(&self, _timestamp: DateTime<Utc>, user: &str, text: &str) -> Result<()> {
            self.entries
                .lock()
                .unwrap()
                .push((user.to_string(), text.to_string()));
            Ok(())
        }

        async fn clear(&self) -> Result<()> {
            if self.fail_clear {
                return Err(WardenError::Io("read-only".to_string()));
            }
            self.entries.lock().unwrap().clear();
            Ok(())
        }
    }

    struct Harness {
        service: Arc<ModerationService>,
        messenger: Arc<RecordingMessenger>,
        log: Arc<MemoryLog>,
    }

    fn harness_with(terms: &[&str], settings: ModerationSettings, log: MemoryLog) -> Harness {
        let terms = terms.iter().map(|t| t.to_string()).collect();
        let words = Arc::new(WordList::new(
            "unused.txt",
            TermSet::new(1, terms).expect("terms compile"),
        ));
        let messenger = Arc::new(RecordingMessenger::new());
        let log = Arc::new(log);
        let service = ModerationService::new(words, messenger.clone(), log.clone())
            .with_settings(settings)
            .with_ban_durations(BanDurations::new(3, 1).expect("valid durations"));

        Harness {
            service: Arc::new(service),
            messenger,
            log,
        }
    }

    fn harness(terms: &[&str]) -> Harness {
        harness_with(terms, ModerationSettings::default(), MemoryLog::default())
    }

    fn message(user: &str, text: &str) -> InboundMessage {
        InboundMessage {
            chat_id: CHAT,
            channel_id: CHANNEL,
            message_id: 1,
            author_id: 42,
            author: UserKey::Handle(user.to_string()),
            text: text.to_string(),
        }
    }

    fn join(user: &str, user_id: u64) -> JoinEvent {
        JoinEvent {
            chat_id: CHAT,
            channel_id: Some(CHANNEL),
            members: vec![JoinedMember {
                user_id,
                user: UserKey::Handle(user.to_string()),
            }],
        }
    }

    #[tokio::test]
    async fn clean_message_passes() {
        let h = harness(&["bad"]);
        let outcome = h
            .service
            .handle_message(&message("bob", "hello there"))
            .await
            .expect("should process");

        assert_eq!(outcome, MessageOutcome::Clean);
        assert!(h.messenger.calls().is_empty());

        let stats = h.service.stats(CHAT, "bob").await.expect("stats");
        assert_eq!(stats.message_count, 1);
    }

    #[tokio::test]
    async fn five_violations_escalate_to_ban() {
        let h = harness(&["bad"]);
        let mut remaining = Vec::new();

        for _ in 0..4 {
            let outcome = h
                .service
                .handle_message(&message("bob", "this is bad"))
                .await
                .expect("should process");
            match outcome {
                MessageOutcome::Violation {
                    action: Action::Warn { remaining: r },
                    ..
                } => remaining.push(r),
                other => panic!("expected warning, got {:?}", other),
            }
        }
        assert_eq!(remaining, vec![4, 3, 2, 1]);

        let outcome = h
            .service
            .handle_message(&message("bob", "this is bad"))
            .await
            .expect("should process");
        assert_eq!(
            outcome,
            MessageOutcome::Violation {
                action: Action::ResetAndBan { days: 1 },
                violation_count: 5,
            }
        );
        assert_eq!(h.messenger.bans(), vec![(42, 1)]);

        // Warning count starts over after the ban.
        let outcome = h
            .service
            .handle_message(&message("bob", "bad again"))
            .await
            .expect("should process");
        assert_eq!(
            outcome,
            MessageOutcome::Violation {
                action: Action::Warn { remaining: 4 },
                violation_count: 6,
            }
        );
    }

    #[tokio::test]
    async fn violation_sends_warning_and_logs() {
        let h = harness(&["bad"]);
        h.service
            .handle_message(&message("bob", "bad"))
            .await
            .expect("should process");

        let replies = h.messenger.replies();
        assert_eq!(replies.len(), 2);
        assert!(replies[0].contains("bob"));
        assert!(replies[1].contains("4 more warnings"));

        let entries = h.log.entries.lock().unwrap().clone();
        assert_eq!(entries, vec![("bob".to_string(), "bad".to_string())]);
    }

    #[tokio::test]
    async fn disabled_chat_is_a_no_op() {
        let h = harness(&["bad"]);
        h.service.set_enabled(CHAT, false).await;
        h.service.watch_add(CHAT, "eve").await.expect("add");

        let outcome = h
            .service
            .handle_message(&message("bob", "bad"))
            .await
            .expect("should process");
        assert_eq!(outcome, MessageOutcome::Disabled);

        let outcomes = h.service.handle_join(&join("eve", 7)).await.expect("join");
        assert!(outcomes.is_empty());
        assert!(h.messenger.calls().is_empty());
    }

    #[tokio::test]
    async fn untrackable_user_is_skipped() {
        let h = harness(&["bad"]);
        let mut msg = message("bob", "bad");
        msg.author = UserKey::Untrackable;

        let outcome = h.service.handle_message(&msg).await.expect("should process");
        assert_eq!(outcome, MessageOutcome::Untracked);
        assert!(h.messenger.calls().is_empty());
    }

    #[tokio::test]
    async fn watch_listed_clean_message_is_removed() {
        let h = harness(&["bad"]);
        h.service.watch_add(CHAT, "@Eve").await.expect("add");

        let outcome = h
            .service
            .handle_message(&message("eve", "perfectly polite"))
            .await
            .expect("should process");

        assert_eq!(outcome, MessageOutcome::WatchListRemoved);
        let calls = h.messenger.calls();
        assert!(calls.contains(&Call::Delete {
            channel_id: CHANNEL,
            message_id: 1
        }));
        assert_eq!(h.messenger.bans(), vec![(42, 3)]);

        // Content scanning never ran.
        let stats = h.service.stats(CHAT, "eve").await.expect("stats");
        assert_eq!(stats.message_count, 0);
        assert!(stats.watch_listed);
    }

    #[tokio::test]
    async fn watch_listed_join_is_banned_without_greeting() {
        let h = harness(&["bad"]);
        h.service.watch_add(CHAT, "eve").await.expect("add");

        let outcomes = h.service.handle_join(&join("eve", 7)).await.expect("join");

        assert_eq!(outcomes, vec![JoinOutcome::Banned { user_id: 7 }]);
        assert_eq!(h.messenger.bans(), vec![(7, 3)]);
        assert!(h
            .messenger
            .replies()
            .iter()
            .all(|r| !r.to_lowercase().contains("welcome")));
    }

    #[tokio::test]
    async fn regular_join_is_greeted() {
        let h = harness(&["bad"]);
        let outcomes = h.service.handle_join(&join("amy", 8)).await.expect("join");

        assert_eq!(outcomes, vec![JoinOutcome::Greeted { user_id: 8 }]);
        assert!(h.messenger.bans().is_empty());
        let replies = h.messenger.replies();
        assert_eq!(replies.len(), 1);
        assert!(replies[0].contains("amy"));
    }

    #[tokio::test]
    async fn join_reports_watch_listed_admins() {
        let h = harness(&["bad"]);
        h.service.watch_add(CHAT, "mallory").await.expect("add");
        h.messenger.set_admins(vec![
            ChatMember {
                user_id: 1,
                user: UserKey::Handle("Mallory".to_string()),
            },
            ChatMember {
                user_id: 2,
                user: UserKey::Handle("owner".to_string()),
            },
        ]);

        let found = h.service.scan_administrators(CHAT).await.expect("scan");
        assert_eq!(found, vec!["Mallory".to_string()]);

        h.service.handle_join(&join("amy", 8)).await.expect("join");
        assert!(h
            .messenger
            .replies()
            .iter()
            .any(|r| r.contains("@Mallory")));
        // The sweep is informational only.
        assert!(h.messenger.bans().is_empty());
    }

    #[tokio::test]
    async fn collaborator_failures_do_not_roll_back() {
        let h = harness(&["bad"]);
        h.service
            .set_warning_threshold(CHAT, WarningThreshold::new(1).expect("positive"))
            .await;
        h.messenger.fail_all(true);

        let outcome = h
            .service
            .handle_message(&message("bob", "bad"))
            .await
            .expect("failures are logged, not returned");
        assert!(matches!(
            outcome,
            MessageOutcome::Violation {
                action: Action::ResetAndBan { .. },
                violation_count: 1
            }
        ));

        let HistoryReport::Found { total, .. } =
            h.service.history(CHAT, "bob", None).await.expect("history")
        else {
            panic!("violation should stay committed");
        };
        assert_eq!(total, 1);
    }

    #[tokio::test]
    async fn threshold_change_applies_to_next_violation() {
        let h = harness(&["bad"]);
        for _ in 0..3 {
            h.service
                .handle_message(&message("bob", "bad"))
                .await
                .expect("should process");
        }

        h.service
            .set_warning_threshold(CHAT, WarningThreshold::new(2).expect("positive"))
            .await;

        let outcome = h
            .service
            .handle_message(&message("bob", "bad"))
            .await
            .expect("should process");
        assert!(matches!(
            outcome,
            MessageOutcome::Violation {
                action: Action::ResetAndBan { .. },
                ..
            }
        ));
    }

    #[tokio::test]
    async fn match_mode_switch() {
        let h = harness(&["spam"]);

        let outcome = h
            .service
            .handle_message(&message("bob", "s-p-a-m hello"))
            .await
            .expect("should process");
        // Strict strips the hyphens, so this still reads as "spam".
        assert!(matches!(outcome, MessageOutcome::Violation { .. }));

        let outcome = h
            .service
            .handle_message(&message("bob", "spammer"))
            .await
            .expect("should process");
        assert_eq!(outcome, MessageOutcome::Clean);

        h.service.set_match_mode(CHAT, MatchMode::Total).await;
        let outcome = h
            .service
            .handle_message(&message("bob", "spammer"))
            .await
            .expect("should process");
        assert!(matches!(outcome, MessageOutcome::Violation { .. }));
    }

    #[tokio::test]
    async fn chats_are_isolated() {
        let h = harness(&["bad"]);
        h.service.set_enabled(CHAT, false).await;
        h.service.watch_add(CHAT, "eve").await.expect("add");

        let mut other = message("eve", "bad");
        other.chat_id = CHAT + 1;

        let outcome = h.service.handle_message(&other).await.expect("should process");
        assert!(matches!(outcome, MessageOutcome::Violation { .. }));
        assert!(h.service.settings(CHAT + 1).await.enabled);
    }

    #[tokio::test]
    async fn stats_reports_role_and_band() {
        let h = harness(&["bad"]);
        h.messenger.set_admins(vec![ChatMember {
            user_id: 1,
            user: UserKey::Handle("bob".to_string()),
        }]);

        for text in ["hi", "hello", "bad"] {
            h.service
                .handle_message(&message("bob", text))
                .await
                .expect("should process");
        }

        let stats = h.service.stats(CHAT, "@BOB").await.expect("stats");
        assert_eq!(stats.message_count, 3);
        assert_eq!(stats.violation_count, 1);
        assert_eq!(stats.reputation, ReputationBand::Average);
        assert_eq!(stats.role, ChatRole::Admin);

        let stats = h.service.stats(CHAT, "nobody").await.expect("stats");
        assert_eq!(stats.reputation, ReputationBand::NoData);
        assert_eq!(stats.role, ChatRole::Regular);

        h.messenger.fail_all(true);
        let stats = h.service.stats(CHAT, "bob").await.expect("stats");
        assert_eq!(stats.role, ChatRole::Unknown);
    }

    #[tokio::test]
    async fn clear_log_wipes_violations_only() {
        let h = harness(&["bad"]);
        h.service.watch_add(CHAT, "eve").await.expect("add");
        h.service
            .handle_message(&message("bob", "bad"))
            .await
            .expect("should process");

        h.service.clear_violation_log().await.expect("clear");

        assert!(h.log.entries.lock().unwrap().is_empty());
        assert_eq!(
            h.service.history(CHAT, "bob", None).await.expect("history"),
            HistoryReport::NoViolations
        );
        let stats = h.service.stats(CHAT, "bob").await.expect("stats");
        assert_eq!(stats.message_count, 1);
        assert_eq!(h.service.watch_list(CHAT).await.len(), 1);
    }

    #[tokio::test]
    async fn failed_log_clear_keeps_ledger() {
        let log = MemoryLog {
            fail_clear: true,
            ..MemoryLog::default()
        };
        let h = harness_with(&["bad"], ModerationSettings::default(), log);
        h.service
            .handle_message(&message("bob", "bad"))
            .await
            .expect("should process");

        assert!(h.service.clear_violation_log().await.is_err());
        assert!(matches!(
            h.service.history(CHAT, "bob", None).await.expect("history"),
            HistoryReport::Found { total: 1, .. }
        ));
    }

    #[tokio::test]
    async fn failed_reload_keeps_matching() {
        let h = harness(&["bad"]);
        // The word list points at a file that does not exist.
        assert!(h.service.reload_terms().await.is_err());

        let outcome = h
            .service
            .handle_message(&message("bob", "bad"))
            .await
            .expect("should process");
        assert!(matches!(outcome, MessageOutcome::Violation { .. }));
    }

    #[tokio::test]
    async fn watch_list_commands_validate_handles() {
        let h = harness(&["bad"]);
        assert!(matches!(
            h.service.watch_add(CHAT, " @ ").await,
            Err(WardenError::Validation(_))
        ));
        assert!(!h.service.watch_remove(CHAT, "ghost").await.expect("remove"));
        assert!(h.service.watch_add(CHAT, "eve").await.expect("add"));
        assert_eq!(h.service.watch_remove_all(CHAT).await, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_violations_are_not_lost() {
        let settings = ModerationSettings {
            warning_threshold: WarningThreshold::new(1000).expect("positive"),
            ..ModerationSettings::default()
        };
        let h = harness_with(&["bad"], settings, MemoryLog::default());

        let tasks: Vec<_> = (0..50)
            .map(|_| {
                let service = Arc::clone(&h.service);
                tokio::spawn(async move { service.handle_message(&message("bob", "bad")).await })
            })
            .collect();
        for task in tasks {
            task.await.expect("task").expect("should process");
        }

        let stats = h.service.stats(CHAT, "bob").await.expect("stats");
        assert_eq!(stats.message_count, 50);
        assert_eq!(stats.violation_count, 50);
    }
}
