// crates/server/src/routes/sessions.rs
//! Listing of logs available for watching.

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use tailview_core::LogSummary;

use crate::error::ApiResult;
use crate::state::AppState;

/// GET /api/sessions - Every log under the projects directory, newest first.
pub async fn list_sessions(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<LogSummary>>> {
    let logs = state.catalog.list().await?;
    tracing::debug!(count = logs.len(), "Listed logs");
    Ok(Json(logs))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/sessions", get(list_sessions))
}
