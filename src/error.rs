//! Error types for Warden.
//!
//! All errors are explicitly typed using thiserror. No panics in production code.

use thiserror::Error;

/// Central error type for all Warden operations.
#[derive(Debug, Error)]
pub enum WardenError {
    /// The term source could not be read. The previous term set stays live.
    #[error("Failed to load terms from {path}: {reason}")]
    Load {
        /// Path of the term source.
        path: String,
        /// Underlying failure.
        reason: String,
    },

    /// Malformed admin command arguments. No state was changed.
    #[error("Invalid argument: {0}")]
    Validation(String),

    /// A call to the messaging platform failed.
    #[error("{operation} failed: {detail}")]
    Collaborator {
        /// Which platform operation failed.
        operation: &'static str,
        /// Error text reported by the platform.
        detail: String,
    },

    /// The sender has no stable handle and cannot be tracked.
    #[error("User has no stable handle")]
    UntrackableUser,

    /// Configuration error (missing env vars, invalid values).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal state error (lock poisoning, invalid state transitions).
    #[error("Internal state error: {0}")]
    InternalState(String),

    /// Term pattern compilation error.
    #[error("Regex pattern error: {0}")]
    RegexPattern(#[from] regex::Error),

    /// Discord API error from serenity.
    #[error("Discord API error: {0}")]
    DiscordApi(#[from] Box<serenity::Error>),

    /// IO error.
    #[error("IO error: {0}")]
    Io(String),
}

impl WardenError {
    /// Build a collaborator error from any displayable platform failure.
    pub fn collaborator(operation: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Collaborator {
            operation,
            detail: err.to_string(),
        }
    }

    /// Log error with full context using tracing.
    pub fn log_with_context(&self, context: &ErrorContext) {
        match self {
            Self::InternalState(_) | Self::Io(_) => {
                tracing::error!(
                    error = %self,
                    request_id = %context.request_id,
                    chat_id = ?context.chat_id,
                    user = ?context.user,
                    operation = %context.operation,
                    "Critical error occurred"
                );
            }
            Self::Collaborator { .. } | Self::DiscordApi(_) => {
                tracing::error!(
                    error = %self,
                    request_id = %context.request_id,
                    chat_id = ?context.chat_id,
                    user = ?context.user,
                    operation = %context.operation,
                    "Messaging platform error"
                );
            }
            Self::Load { .. } | Self::Config(_) | Self::RegexPattern(_) => {
                tracing::error!(
                    error = %self,
                    request_id = %context.request_id,
                    operation = %context.operation,
                    "Configuration error"
                );
            }
            Self::Validation(_) => {
                tracing::warn!(
                    error = %self,
                    request_id = %context.request_id,
                    chat_id = ?context.chat_id,
                    operation = %context.operation,
                    "Rejected command arguments"
                );
            }
            // Expected for accounts without a handle.
            Self::UntrackableUser => {
                tracing::debug!(
                    request_id = %context.request_id,
                    chat_id = ?context.chat_id,
                    operation = %context.operation,
                    "Skipped untrackable user"
                );
            }
        }
    }

    /// Get user-facing explanation for command replies.
    ///
    /// Validation errors carry their detail so the admin can fix the command;
    /// everything else hides internals.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(detail) => detail.clone(),
            Self::Load { .. } => "Could not read the word list, keeping the current one".to_string(),
            Self::Collaborator { .. } | Self::DiscordApi(_) => {
                "Chat service temporarily unavailable".to_string()
            }
            Self::UntrackableUser => "This user has no username and cannot be tracked".to_string(),
            Self::Config(_) => "Service configuration error".to_string(),
            Self::InternalState(_) => "Internal service error".to_string(),
            Self::RegexPattern(_) => "Invalid word list entry".to_string(),
            Self::Io(_) => "File system error".to_string(),
        }
    }
}

/// Context information for error logging.
#[derive(Debug, Clone)]
pub struct ErrorContext {
    /// Unique request identifier for correlation
    pub request_id: String,
    /// Chat the event came from, if any
    pub chat_id: Option<u64>,
    /// Handle of the user involved, if any
    pub user: Option<String>,
    /// Operation being performed
    pub operation: String,
}

impl ErrorContext {
    /// Create a new error context.
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            chat_id: None,
            user: None,
            operation: operation.into(),
        }
    }

    /// Set chat ID.
    pub fn with_chat_id(mut self, chat_id: u64) -> Self {
        self.chat_id = Some(chat_id);
        self
    }

    /// Set user handle.
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }
}

/// Result type alias for Warden operations.
pub type Result<T> = std::result::Result<T, WardenError>;
