//! Event processing pipeline.
//!
//! For each fetched event:
//! 1. Resolve the subject to a recipient (via `RecipientDirectory`)
//! 2. Skip the pair if the `DeliveryLedger` already has it, or another caller
//!    is sending it right now
//! 3. Dispatch the reminder (via `Dispatcher`)
//! 4. Record the pair in the ledger, only after the gateway acknowledged it
//!
//! Every failure is contained to its own event; the rest of the batch proceeds.

use std::sync::Arc;
use std::time::Duration;

use chrono::Local;

use reminder_common::error::ReminderError;
use reminder_common::status::CycleReport;
use reminder_common::types::Event;
use reminder_notifier::Dispatcher;
use reminder_notifier::message::scheduled_send_time;

use crate::directory::RecipientDirectory;
use crate::ledger::{Claim, DeliveryLedger};

/// Upper bound on one recipient lookup unless overridden.
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);

/// What happened to a single event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// Sent, acknowledged and recorded.
    Dispatched,
    /// Sent and acknowledged, but the ledger write failed.
    DispatchedUnrecorded,
    AlreadyNotified,
    /// Another caller is sending this pair right now.
    InFlight,
    UnknownRecipient,
    /// Lookup failed or timed out; retried next poll.
    DirectoryFailed,
    /// Gateway rejected or timed out; retried next poll.
    DispatchFailed,
}

/// Runs the resolve → dedup → dispatch → record steps for fetched events.
pub struct EventProcessor {
    directory: Arc<dyn RecipientDirectory>,
    ledger: Arc<DeliveryLedger>,
    dispatcher: Arc<dyn Dispatcher>,
    send_delay: Duration,
    lookup_timeout: Duration,
}

impl EventProcessor {
    pub fn new(
        directory: Arc<dyn RecipientDirectory>,
        ledger: Arc<DeliveryLedger>,
        dispatcher: Arc<dyn Dispatcher>,
        send_delay: Duration,
    ) -> Self {
        Self {
            directory,
            ledger,
            dispatcher,
            send_delay,
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
        }
    }

    /// Bound each recipient lookup. A lookup that exceeds it counts as a
    /// directory failure for that event only.
    pub fn with_lookup_timeout(mut self, timeout: Duration) -> Self {
        self.lookup_timeout = timeout;
        self
    }

    pub fn ledger(&self) -> &Arc<DeliveryLedger> {
        &self.ledger
    }

    /// Process a whole batch in order, tallying outcomes into `report`.
    pub async fn process_batch(&self, events: &[Event], report: &mut CycleReport) {
        for event in events {
            match self.process_event(event).await {
                EventOutcome::Dispatched => report.dispatched += 1,
                EventOutcome::DispatchedUnrecorded => {
                    report.dispatched += 1;
                    report.ledger_errors += 1;
                }
                EventOutcome::AlreadyNotified | EventOutcome::InFlight => {
                    report.already_notified += 1
                }
                EventOutcome::UnknownRecipient => report.unknown_recipients += 1,
                EventOutcome::DirectoryFailed => report.directory_errors += 1,
                EventOutcome::DispatchFailed => report.failed_dispatches += 1,
            }
        }
    }

    /// Process one event. Never fails: every error is logged and folded into
    /// the returned outcome.
    pub async fn process_event(&self, event: &Event) -> EventOutcome {
        let lookup = tokio::time::timeout(
            self.lookup_timeout,
            self.directory.resolve(&event.subject),
        )
        .await
        .unwrap_or_else(|_| {
            Err(ReminderError::Directory(format!(
                "lookup timed out after {}ms",
                self.lookup_timeout.as_millis()
            )))
        });

        let recipient = match lookup {
            Ok(recipient) => recipient,
            Err(ReminderError::RecipientNotFound(detail)) => {
                tracing::warn!(
                    event_id = %event.id,
                    subject = %event.subject,
                    title = %event.title,
                    detail = %detail,
                    "Recipient not found, skipping event"
                );
                return EventOutcome::UnknownRecipient;
            }
            Err(e) => {
                tracing::error!(
                    event_id = %event.id,
                    subject = %event.subject,
                    error = %e,
                    "Recipient lookup failed, will retry next poll"
                );
                return EventOutcome::DirectoryFailed;
            }
        };

        let reservation = match self.ledger.claim(&event.id, &recipient.key) {
            Claim::Reserved(reservation) => reservation,
            Claim::AlreadyNotified => {
                tracing::debug!(
                    event_id = %event.id,
                    recipient = %recipient.key,
                    "Already notified, skipping"
                );
                return EventOutcome::AlreadyNotified;
            }
            Claim::InFlight => {
                tracing::debug!(
                    event_id = %event.id,
                    recipient = %recipient.key,
                    "Send already in progress elsewhere, skipping"
                );
                return EventOutcome::InFlight;
            }
        };

        let scheduled_at = scheduled_send_time(Local::now().naive_local(), self.send_delay);

        let receipt = match self.dispatcher.send(&recipient, event, scheduled_at).await {
            Ok(receipt) => receipt,
            Err(e) => {
                tracing::error!(
                    event_id = %event.id,
                    recipient = %recipient.key,
                    error = %e,
                    "Dispatch failed, will retry next poll"
                );
                return EventOutcome::DispatchFailed;
            }
        };

        // No await between the acknowledgment above and this write.
        match reservation.record() {
            Ok(_) => {
                tracing::info!(
                    event_id = %event.id,
                    recipient = %recipient.key,
                    title = %event.title,
                    gateway_status = receipt.status,
                    "Reminder dispatched"
                );
                EventOutcome::Dispatched
            }
            Err(e) => {
                tracing::error!(
                    event_id = %event.id,
                    recipient = %recipient.key,
                    error = %e,
                    "Reminder dispatched but ledger write failed"
                );
                EventOutcome::DispatchedUnrecorded
            }
        }
    }
}
