//! Scheduler status snapshot shared between the polling loop and the status API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Phase of the scheduler loop: `Idle → Fetching → Processing → Idle`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerState {
    #[default]
    Idle,
    Fetching,
    Processing,
}

impl std::fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchedulerState::Idle => write!(f, "idle"),
            SchedulerState::Fetching => write!(f, "fetching"),
            SchedulerState::Processing => write!(f, "processing"),
        }
    }
}

/// Counters for one fetch → resolve → dedup → dispatch → persist cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleReport {
    pub cycle_id: Uuid,
    /// Events decoded from the source payload.
    pub fetched: u32,
    /// Sends acknowledged by the gateway this cycle.
    pub dispatched: u32,
    pub already_notified: u32,
    pub unknown_recipients: u32,
    /// Gateway rejections or timeouts, retried next poll.
    pub failed_dispatches: u32,
    /// Directory backend failures (not "not found"), retried next poll.
    pub directory_errors: u32,
    /// Acknowledged sends whose ledger write failed.
    pub ledger_errors: u32,
    /// Set when the fetch itself failed and nothing was processed.
    pub source_error: Option<String>,
}

impl CycleReport {
    pub fn new(cycle_id: Uuid) -> Self {
        Self {
            cycle_id,
            ..Default::default()
        }
    }
}

/// Live view of the scheduler, published over a `tokio::sync::watch` channel.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchedulerStatus {
    pub state: SchedulerState,
    pub cycles_completed: u64,
    pub last_cycle_at: Option<DateTime<Utc>>,
    pub last_report: Option<CycleReport>,
}
