//! Read-only status API for the reminder scheduler.
//!
//! Endpoints:
//! - GET /health — liveness
//! - GET /status — scheduler phase and last cycle report
//! - GET /ledger — delivery ledger contents

pub mod routes;
pub mod state;

use std::net::SocketAddr;

use tower_http::trace::TraceLayer;

use crate::routes::create_router;
use crate::state::AppState;

/// Serve the status API on `addr` until the task is dropped.
pub async fn serve(addr: SocketAddr, state: AppState) -> anyhow::Result<()> {
    let app = create_router(state).layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Status API listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
