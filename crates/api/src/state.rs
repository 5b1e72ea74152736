//! Shared application state for the status API.

use std::sync::Arc;

use tokio::sync::watch;

use reminder_common::status::SchedulerStatus;
use reminder_engine::ledger::DeliveryLedger;

/// Application state shared across all route handlers via Axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<DeliveryLedger>,
    pub status: watch::Receiver<SchedulerStatus>,
}

impl AppState {
    pub fn new(ledger: Arc<DeliveryLedger>, status: watch::Receiver<SchedulerStatus>) -> Self {
        Self { ledger, status }
    }
}
