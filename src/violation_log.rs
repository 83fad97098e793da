//! Append-only violation log sink.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serenity::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::{Result, WardenError};

/// Destination for `(timestamp, user, text)` violation records.
#[async_trait]
pub trait ViolationLog: Send + Sync {
    /// Append one record.
    async fn append(&self, timestamp: DateTime<Utc>, user: &str, text: &str) -> Result<()>;

    /// Truncate the log.
    async fn clear(&self) -> Result<()>;
}

/// Format one log line: `[YYYY-MM-DD HH:MM:SS] @user: text`.
///
/// Line breaks in the text are flattened so each record stays on one line.
pub fn format_entry(timestamp: DateTime<Utc>, user: &str, text: &str) -> String {
    let flat: String = text
        .chars()
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect();
    format!(
        "[{}] @{}: {}\n",
        timestamp.format("%Y-%m-%d %H:%M:%S"),
        user,
        flat
    )
}

/// Violation log written to a plain text file.
pub struct FileViolationLog {
    path: PathBuf,
    // Serializes appends against truncation.
    write_lock: Mutex<()>,
}

impl FileViolationLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }
}

#[async_trait]
impl ViolationLog for FileViolationLog {
    async fn append(&self, timestamp: DateTime<Utc>, user: &str, text: &str) -> Result<()> {
        let line = format_entry(timestamp, user, text);
        let _guard = self.write_lock.lock().await;

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| WardenError::Io(format!("Failed to open violation log: {}", e)))?;

        file.write_all(line.as_bytes())
            .await
            .map_err(|e| WardenError::Io(format!("Failed to write violation log: {}", e)))?;

        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        tokio::fs::write(&self.path, b"")
            .await
            .map_err(|e| WardenError::Io(format!("Failed to clear violation log: {}", e)))
    }
}
