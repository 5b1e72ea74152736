use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use reminder_common::status::SchedulerStatus;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/status", get(scheduler_status))
}

async fn scheduler_status(State(state): State<AppState>) -> Json<SchedulerStatus> {
    Json(state.status.borrow().clone())
}
