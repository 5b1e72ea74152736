//! Integration tests for status API routes.
//!
//! Uses `tower::ServiceExt` to test Axum routes without a real HTTP server.

use std::sync::Arc;

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use tokio::sync::watch;
use tower::ServiceExt;

use reminder_api::routes::create_router;
use reminder_api::state::AppState;
use reminder_common::status::{CycleReport, SchedulerState, SchedulerStatus};
use reminder_engine::ledger::DeliveryLedger;

// ============================================================
// Helpers
// ============================================================

async fn get_json(state: AppState, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = create_router(state)
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn state_with(
    dir: &tempfile::TempDir,
) -> (AppState, Arc<DeliveryLedger>, watch::Sender<SchedulerStatus>) {
    let ledger = Arc::new(DeliveryLedger::load(dir.path().join("sent_sms.json")).unwrap());
    let (tx, rx) = watch::channel(SchedulerStatus::default());
    (AppState::new(ledger.clone(), rx), ledger, tx)
}

// ============================================================
// Tests
// ============================================================

#[tokio::test]
async fn test_health() {
    let dir = tempfile::tempdir().unwrap();
    let (state, _, _tx) = state_with(&dir);

    let (status, body) = get_json(state, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "reminder-scheduler");
}

#[tokio::test]
async fn test_status_reflects_latest_cycle() {
    let dir = tempfile::tempdir().unwrap();
    let (state, _, tx) = state_with(&dir);

    let (_, body) = get_json(state.clone(), "/status").await;
    assert_eq!(body["state"], "idle");
    assert_eq!(body["cycles_completed"], 0);
    assert!(body["last_report"].is_null());

    tx.send_modify(|status| {
        status.state = SchedulerState::Processing;
        status.cycles_completed = 3;
        status.last_report = Some(CycleReport {
            fetched: 4,
            dispatched: 2,
            ..Default::default()
        });
    });

    let (_, body) = get_json(state, "/status").await;
    assert_eq!(body["state"], "processing");
    assert_eq!(body["cycles_completed"], 3);
    assert_eq!(body["last_report"]["dispatched"], 2);
}

#[tokio::test]
async fn test_ledger_view() {
    let dir = tempfile::tempdir().unwrap();
    let (state, ledger, _tx) = state_with(&dir);

    ledger.record_notified("e1", "a@x.com").unwrap();
    ledger.record_notified("e1", "b@x.com").unwrap();
    ledger.record_notified("e2", "a@x.com").unwrap();

    let (status, body) = get_json(state, "/ledger").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pairs"], 3);
    assert_eq!(
        body["deliveries"],
        serde_json::json!({ "e1": ["a@x.com", "b@x.com"], "e2": ["a@x.com"] })
    );
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let dir = tempfile::tempdir().unwrap();
    let (state, _, _tx) = state_with(&dir);

    let response = create_router(state)
        .oneshot(Request::builder().uri("/subscriptions").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
