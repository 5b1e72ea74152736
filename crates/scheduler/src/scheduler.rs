use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{Mutex, watch};
use tokio::time::MissedTickBehavior;
use tracing::Instrument;
use uuid::Uuid;

use reminder_common::status::{CycleReport, SchedulerState, SchedulerStatus};
use reminder_engine::processor::EventProcessor;

use crate::source::EventSource;

/// `tokio::time::interval` panics on a zero period.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Polling loop that drives fetch → resolve → dedup → dispatch → record.
///
/// At most one cycle runs at a time. A tick that fires while a cycle is still
/// processing waits for it to finish instead of starting a second one.
pub struct ReminderScheduler {
    source: Arc<dyn EventSource>,
    processor: EventProcessor,
    poll_interval: Duration,
    cycle_guard: Mutex<()>,
    status: watch::Sender<SchedulerStatus>,
}

impl ReminderScheduler {
    pub fn new(
        source: Arc<dyn EventSource>,
        processor: EventProcessor,
        poll_interval: Duration,
    ) -> Self {
        let (status, _) = watch::channel(SchedulerStatus::default());
        Self {
            source,
            processor,
            poll_interval: poll_interval.max(MIN_POLL_INTERVAL),
            cycle_guard: Mutex::new(()),
            status,
        }
    }

    /// Subscribe to live status updates.
    pub fn status(&self) -> watch::Receiver<SchedulerStatus> {
        self.status.subscribe()
    }

    pub fn processor(&self) -> &EventProcessor {
        &self.processor
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Run cycles on every tick until `shutdown` flips to `true` or its sender
    /// is dropped. Shutdown is only observed between cycles, so an in-flight
    /// batch always completes.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            poll_interval = ?self.poll_interval,
            "Reminder scheduler started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = ticker.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
            }

            self.run_cycle().await;
        }

        tracing::info!("Reminder scheduler stopped");
    }

    /// Run exactly one cycle and return its report.
    ///
    /// A source failure ends the cycle before anything touches the ledger.
    pub async fn run_cycle(&self) -> CycleReport {
        let _guard = self.cycle_guard.lock().await;

        let cycle_id = Uuid::new_v4();
        let report = self
            .cycle(CycleReport::new(cycle_id))
            .instrument(tracing::info_span!("cycle", cycle_id = %cycle_id))
            .await;

        self.status.send_modify(|status| {
            status.state = SchedulerState::Idle;
            status.cycles_completed += 1;
            status.last_cycle_at = Some(Utc::now());
            status.last_report = Some(report.clone());
        });

        report
    }

    /// Run one cycle to completion, even if `signal` resolves first.
    ///
    /// Used by one-shot mode: the signal is only logged, so a stop request
    /// cannot cut the cycle between a gateway acknowledgment and its ledger
    /// write.
    pub async fn run_cycle_until(&self, signal: impl Future<Output = ()>) -> CycleReport {
        let cycle = self.run_cycle();
        tokio::pin!(cycle);
        tokio::pin!(signal);

        tokio::select! {
            report = &mut cycle => return report,
            () = &mut signal => {
                tracing::info!("Received shutdown signal, finishing current cycle...");
            }
        }

        cycle.await
    }

    async fn cycle(&self, mut report: CycleReport) -> CycleReport {
        self.set_state(SchedulerState::Fetching);

        match self.source.fetch_events().await {
            Ok(events) => {
                report.fetched = u32::try_from(events.len()).unwrap_or(u32::MAX);
                if events.is_empty() {
                    tracing::info!("No events to process");
                } else {
                    tracing::info!(events = events.len(), "Processing events");
                    self.set_state(SchedulerState::Processing);
                    self.processor.process_batch(&events, &mut report).await;
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to fetch events, skipping cycle");
                report.source_error = Some(e.to_string());
            }
        }

        tracing::info!(
            fetched = report.fetched,
            dispatched = report.dispatched,
            already_notified = report.already_notified,
            unknown_recipients = report.unknown_recipients,
            failed_dispatches = report.failed_dispatches,
            directory_errors = report.directory_errors,
            ledger_errors = report.ledger_errors,
            "Cycle complete"
        );

        report
    }

    fn set_state(&self, state: SchedulerState) {
        self.status.send_modify(|status| status.state = state);
    }
}
