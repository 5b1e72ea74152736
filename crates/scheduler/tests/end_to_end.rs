//! End-to-end cycle over real HTTP: an in-process event API and an
//! in-process RaspiSMS stand-in, wired through the production clients.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Form, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};

use reminder_engine::directory::StaticDirectory;
use reminder_engine::ledger::DeliveryLedger;
use reminder_engine::processor::EventProcessor;
use reminder_notifier::gateway::{GatewayConfig, RaspiSmsGateway};
use reminder_scheduler::scheduler::ReminderScheduler;
use reminder_scheduler::source::HttpEventSource;

#[derive(Clone, Default)]
struct GatewayLog {
    posts: Arc<Mutex<Vec<(Option<String>, HashMap<String, String>)>>>,
}

async fn scheduled(
    State(log): State<GatewayLog>,
    headers: HeaderMap,
    Form(fields): Form<HashMap<String, String>>,
) -> (StatusCode, Json<serde_json::Value>) {
    let key = headers
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    log.posts.lock().unwrap().push((key, fields));
    (StatusCode::CREATED, Json(serde_json::json!({ "error": 0 })))
}

async fn events() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "events": [{
            "id": "e1",
            "user_email": "a@x.com",
            "title": "Exam",
            "start": "2024-12-12T10:00:00",
            "location": "Room 5"
        }]
    }))
}

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn test_exam_reminder_end_to_end() {
    let log = GatewayLog::default();
    let gateway_base = serve(
        Router::new()
            .route("/api/scheduled/", post(scheduled))
            .with_state(log.clone()),
    )
    .await;
    let source_base = serve(Router::new().route("/all-users-events", get(events))).await;

    let dir = tempfile::tempdir().unwrap();
    let ledger_path = dir.path().join("sent_sms.json");

    let mut directory = StaticDirectory::default();
    directory.insert("a@x.com", "+15550100");

    let gateway = RaspiSmsGateway::new(GatewayConfig {
        url: format!("{gateway_base}/api/scheduled/"),
        api_key: "raspisms-key".to_string(),
        phone_id: "1".to_string(),
        timeout: Duration::from_secs(5),
    })
    .unwrap();
    let source = HttpEventSource::new(
        format!("{source_base}/all-users-events"),
        Duration::from_secs(5),
    )
    .unwrap();

    let ledger = Arc::new(DeliveryLedger::load(&ledger_path).unwrap());
    let processor = EventProcessor::new(
        Arc::new(directory),
        ledger,
        Arc::new(gateway),
        Duration::from_secs(180),
    );
    let scheduler = ReminderScheduler::new(Arc::new(source), processor, Duration::from_secs(120));

    let first = scheduler.run_cycle().await;
    assert_eq!(first.dispatched, 1);
    let second = scheduler.run_cycle().await;
    assert_eq!(second.already_notified, 1);

    let posts = log.posts.lock().unwrap();
    assert_eq!(posts.len(), 1);
    let (key, fields) = &posts[0];
    assert_eq!(key.as_deref(), Some("raspisms-key"));
    assert!(fields["text"].contains("Exam"));
    assert!(fields["text"].contains("Room 5"));
    assert!(fields["text"].contains("2024-12-12 10:00:00"));
    assert_eq!(fields["numbers"], "+15550100");
    assert_eq!(fields["id_phone"], "1");
    assert!(chrono::NaiveDateTime::parse_from_str(&fields["at"], "%Y-%m-%d %H:%M:%S").is_ok());

    let stored: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&ledger_path).unwrap()).unwrap();
    assert_eq!(stored["deliveries"], serde_json::json!({ "e1": ["a@x.com"] }));
}
