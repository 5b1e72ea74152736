//! RaspiSMS gateway client.
//!
//! Submits scheduled SMS jobs with `POST /api/scheduled/`, authenticated by the
//! `X-Api-Key` header. Fields are form-encoded (`text`, `numbers`, `id_phone`,
//! `at`), so phone numbers with a leading `+` need no manual escaping.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDateTime;

use reminder_common::error::{ReminderError, Result};
use reminder_common::types::{DispatchReceipt, Event, Recipient};

use crate::Dispatcher;
use crate::message::{compose_message, format_gateway_time};

/// Connection settings for the gateway.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub url: String,
    pub api_key: String,
    /// Identifier of the modem/phone line that sends the SMS.
    pub phone_id: String,
    pub timeout: Duration,
}

/// HTTP client for a local RaspiSMS instance.
pub struct RaspiSmsGateway {
    config: GatewayConfig,
    client: reqwest::Client,
}

impl RaspiSmsGateway {
    pub fn new(config: GatewayConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ReminderError::Config(format!("Failed to build gateway client: {e}")))?;

        Ok(Self { config, client })
    }
}

#[async_trait]
impl Dispatcher for RaspiSmsGateway {
    async fn send(
        &self,
        recipient: &Recipient,
        event: &Event,
        scheduled_at: NaiveDateTime,
    ) -> Result<DispatchReceipt> {
        let text = compose_message(event);
        let at = format_gateway_time(scheduled_at);

        tracing::debug!(
            event_id = %event.id,
            recipient = %recipient.key,
            at = %at,
            text = %text,
            "Submitting SMS job to gateway"
        );

        let response = self
            .client
            .post(&self.config.url)
            .header("X-Api-Key", &self.config.api_key)
            .form(&[
                ("text", text.as_str()),
                ("numbers", recipient.phone.as_str()),
                ("id_phone", self.config.phone_id.as_str()),
                ("at", at.as_str()),
            ])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ReminderError::Gateway(format!("request timed out: {e}"))
                } else {
                    ReminderError::Gateway(format!("request failed: {e}"))
                }
            })?;

        let status = response.status();
        // A 2xx status means the job was accepted; the body is informational.
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(
                    event_id = %event.id,
                    recipient = %recipient.key,
                    status = status.as_u16(),
                    error = %e,
                    "Failed to read gateway response body"
                );
                String::new()
            }
        };

        if !status.is_success() {
            return Err(ReminderError::Gateway(format!(
                "gateway returned {status}: {}",
                body.trim()
            )));
        }

        Ok(DispatchReceipt {
            status: status.as_u16(),
            body,
        })
    }
}
