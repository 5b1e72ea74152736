//! Recipient directory — maps an event's subject key to a deliverable contact.
//!
//! The directory is owned elsewhere (the web app's `users` table); this side
//! only reads it. "Not found" is an ordinary outcome, reported as
//! `RecipientNotFound`.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;
use sqlx::PgPool;

use reminder_common::error::{ReminderError, Result};
use reminder_common::types::Recipient;

/// Read-only lookup of recipients by subject key.
#[async_trait]
pub trait RecipientDirectory: Send + Sync {
    async fn resolve(&self, subject_key: &str) -> Result<Recipient>;
}

/// Directory backed by the `users` table.
pub struct PgDirectory {
    pool: PgPool,
}

impl PgDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecipientDirectory for PgDirectory {
    async fn resolve(&self, subject_key: &str) -> Result<Recipient> {
        let row: Option<(String, Option<String>)> =
            sqlx::query_as("SELECT email, phone_number FROM users WHERE email = $1")
                .bind(subject_key)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| ReminderError::Directory(e.to_string()))?;

        match row {
            Some((email, Some(phone))) if !phone.trim().is_empty() => {
                Ok(Recipient::new(email, &phone))
            }
            Some(_) => Err(ReminderError::RecipientNotFound(format!(
                "{subject_key} has no phone number"
            ))),
            None => Err(ReminderError::RecipientNotFound(subject_key.to_string())),
        }
    }
}

/// One entry of a JSON recipients file.
#[derive(Debug, Clone, Deserialize)]
pub struct DirectoryEntry {
    pub key: String,
    pub phone: String,
}

/// In-memory directory, optionally loaded from a JSON file.
#[derive(Debug, Default)]
pub struct StaticDirectory {
    recipients: HashMap<String, Recipient>,
}

impl StaticDirectory {
    pub fn new(entries: impl IntoIterator<Item = DirectoryEntry>) -> Self {
        let recipients = entries
            .into_iter()
            .filter(|entry| !entry.phone.trim().is_empty())
            .map(|entry| (entry.key.clone(), Recipient::new(entry.key, &entry.phone)))
            .collect();
        Self { recipients }
    }

    /// Load `[{ "key": "...", "phone": "..." }, ...]` from disk.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let entries: Vec<DirectoryEntry> = serde_json::from_str(&contents).map_err(|e| {
            ReminderError::Config(format!("Invalid recipients file {}: {e}", path.display()))
        })?;

        let directory = Self::new(entries);
        tracing::info!(
            path = %path.display(),
            recipients = directory.len(),
            "Recipient directory loaded"
        );
        Ok(directory)
    }

    pub fn insert(&mut self, key: impl Into<String>, phone: &str) {
        let key = key.into();
        self.recipients
            .insert(key.clone(), Recipient::new(key, phone));
    }

    pub fn len(&self) -> usize {
        self.recipients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recipients.is_empty()
    }
}

#[async_trait]
impl RecipientDirectory for StaticDirectory {
    async fn resolve(&self, subject_key: &str) -> Result<Recipient> {
        self.recipients
            .get(subject_key)
            .cloned()
            .ok_or_else(|| ReminderError::RecipientNotFound(subject_key.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_directory_resolves_known_keys() {
        let mut directory = StaticDirectory::default();
        directory.insert("a@x.com", "+1 555 0100");

        let recipient = directory.resolve("a@x.com").await.unwrap();
        assert_eq!(recipient.key, "a@x.com");
        assert_eq!(recipient.phone, "+15550100");

        let err = directory.resolve("nobody@x.com").await.unwrap_err();
        assert!(matches!(err, ReminderError::RecipientNotFound(ref k) if k == "nobody@x.com"));
    }

    #[tokio::test]
    async fn test_from_json_file_skips_entries_without_phone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recipients.json");
        std::fs::write(
            &path,
            r#"[
                {"key": "a@x.com", "phone": "0033 6 12 34 56 78"},
                {"key": "b@x.com", "phone": "  "}
            ]"#,
        )
        .unwrap();

        let directory = StaticDirectory::from_json_file(&path).unwrap();
        assert_eq!(directory.len(), 1);
        assert_eq!(
            directory.resolve("a@x.com").await.unwrap().phone,
            "+33612345678"
        );
        assert!(directory.resolve("b@x.com").await.is_err());
    }

    #[test]
    fn test_from_json_file_rejects_bad_shape() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recipients.json");
        std::fs::write(&path, r#"{"a@x.com": "+1555"}"#).unwrap();

        let err = StaticDirectory::from_json_file(&path).unwrap_err();
        assert!(matches!(err, ReminderError::Config(_)));
    }
}
