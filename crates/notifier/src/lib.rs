//! Notification dispatch — turns an event into an SMS job on the RaspiSMS gateway.
//!
//! The gateway is a near-term scheduling relay: every job is scheduled a short,
//! fixed delay after submission, not at the event's start time.

pub mod gateway;
pub mod message;

use async_trait::async_trait;
use chrono::NaiveDateTime;

use reminder_common::error::Result;
use reminder_common::types::{DispatchReceipt, Event, Recipient};

pub use gateway::{GatewayConfig, RaspiSmsGateway};

/// Anything that can hand a reminder to an SMS transport.
///
/// `Ok` means the transport acknowledged the job. Any `Err` leaves the pair
/// eligible for another attempt on the next poll.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn send(
        &self,
        recipient: &Recipient,
        event: &Event,
        scheduled_at: NaiveDateTime,
    ) -> Result<DispatchReceipt>;
}
