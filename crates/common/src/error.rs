use std::path::PathBuf;

use thiserror::Error;

/// Error taxonomy shared by every stage of the reminder pipeline.
///
/// Everything except `LedgerCorrupt` is recoverable: the failing item is
/// logged and skipped, and the next poll retries it.
#[derive(Debug, Error)]
pub enum ReminderError {
    #[error("Event source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Recipient not found: {0}")]
    RecipientNotFound(String),

    #[error("Directory error: {0}")]
    Directory(String),

    #[error("Gateway error: {0}")]
    Gateway(String),

    #[error("Ledger at {} is corrupt: {reason}", path.display())]
    LedgerCorrupt { path: PathBuf, reason: String },

    #[error("Ledger write failed: {0}")]
    LedgerWrite(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ReminderError {
    /// Only an untrustworthy ledger may stop the process.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ReminderError::LedgerCorrupt { .. })
    }
}

pub type Result<T> = std::result::Result<T, ReminderError>;
