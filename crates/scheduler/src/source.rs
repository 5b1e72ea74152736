//! Event source client — pulls candidate events from the calendar API.
//!
//! No retries here: the scheduler's polling interval is the retry cadence.

use std::time::Duration;

use async_trait::async_trait;

use reminder_common::error::{ReminderError, Result};
use reminder_common::types::Event;

/// Anything that can produce this cycle's candidate events.
#[async_trait]
pub trait EventSource: Send + Sync {
    async fn fetch_events(&self) -> Result<Vec<Event>>;
}

/// `GET <url>` returning `{ "events": [...] }`.
pub struct HttpEventSource {
    url: String,
    client: reqwest::Client,
}

impl HttpEventSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ReminderError::Config(format!("Failed to build source client: {e}")))?;

        Ok(Self {
            url: url.into(),
            client,
        })
    }

    /// Decode a response body. Individual malformed events are dropped; a
    /// body that is not an `events` document fails the whole fetch.
    pub fn decode_batch(body: &str) -> Result<Vec<Event>> {
        let document: serde_json::Value = serde_json::from_str(body)
            .map_err(|e| ReminderError::SourceUnavailable(format!("malformed payload: {e}")))?;

        let serde_json::Value::Object(mut document) = document else {
            return Err(ReminderError::SourceUnavailable(
                "malformed payload: expected a JSON object".to_string(),
            ));
        };

        // An absent (or null) `events` key is an empty batch.
        let items = match document.remove("events") {
            None | Some(serde_json::Value::Null) => Vec::new(),
            Some(serde_json::Value::Array(items)) => items,
            Some(other) => {
                return Err(ReminderError::SourceUnavailable(format!(
                    "malformed payload: `events` must be an array, got {}",
                    json_kind(&other)
                )));
            }
        };

        let mut events = Vec::with_capacity(items.len());
        for (index, value) in items.into_iter().enumerate() {
            let id_hint = value
                .get("id")
                .and_then(|v| v.as_str())
                .unwrap_or("<none>")
                .to_string();

            match Event::from_json(value) {
                Ok(event) => events.push(event),
                Err(e) => {
                    tracing::warn!(
                        index,
                        event_id = %id_hint,
                        error = %e,
                        "Dropping malformed event"
                    );
                }
            }
        }

        Ok(events)
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

#[async_trait]
impl EventSource for HttpEventSource {
    async fn fetch_events(&self) -> Result<Vec<Event>> {
        let response = self.client.get(&self.url).send().await.map_err(|e| {
            if e.is_timeout() {
                ReminderError::SourceUnavailable(format!("request timed out: {e}"))
            } else {
                ReminderError::SourceUnavailable(format!("request failed: {e}"))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ReminderError::SourceUnavailable(format!(
                "source returned {status}"
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ReminderError::SourceUnavailable(format!("failed to read body: {e}")))?;

        let events = Self::decode_batch(&body)?;
        tracing::debug!(count = events.len(), "Fetched events");
        Ok(events)
    }
}
