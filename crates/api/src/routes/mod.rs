pub mod health;
pub mod ledger;
pub mod status;

use axum::Router;

use crate::state::AppState;

/// Build the complete status router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .merge(status::router())
        .merge(ledger::router())
        .with_state(state)
}
