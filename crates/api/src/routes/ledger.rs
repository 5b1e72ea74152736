use std::collections::BTreeMap;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/ledger", get(ledger_view))
}

#[derive(Debug, Serialize)]
struct LedgerView {
    pairs: usize,
    deliveries: BTreeMap<String, Vec<String>>,
}

async fn ledger_view(State(state): State<AppState>) -> Json<LedgerView> {
    let deliveries = state.ledger.snapshot();
    let pairs = deliveries.values().map(Vec::len).sum();
    Json(LedgerView { pairs, deliveries })
}
