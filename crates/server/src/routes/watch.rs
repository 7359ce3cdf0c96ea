// crates/server/src/routes/watch.rs
//! Begin, stop, and inspect the single active watch.
//!
//! - POST   /api/watch  `{ "path": "..." }`  begin watching (supersedes any current watch)
//! - DELETE /api/watch                       stop watching
//! - GET    /api/watch                       current path and tree

use std::path::PathBuf;
use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use tailview_core::Node;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct WatchRequest {
    pub path: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchResponse {
    pub path: String,
    pub node_count: usize,
    pub tree: Vec<Node>,
}

#[derive(Debug, Serialize)]
pub struct CurrentWatch {
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tree: Option<Vec<Node>>,
}

#[derive(Debug, Serialize)]
pub struct StopResponse {
    pub stopped: bool,
}

/// POST /api/watch
pub async fn start_watch(
    State(state): State<Arc<AppState>>,
    Json(request): Json<WatchRequest>,
) -> ApiResult<Json<WatchResponse>> {
    let path = PathBuf::from(request.path.trim());
    if path.as_os_str().is_empty() {
        return Err(ApiError::BadRequest("path is required".into()));
    }
    if !path.is_absolute() {
        return Err(ApiError::BadRequest(format!(
            "path must be absolute: {}",
            path.display()
        )));
    }
    if !state.catalog.exists(&path).await {
        return Err(ApiError::LogNotFound(path.display().to_string()));
    }

    let started = match state.watch.start(&path).await {
        Ok(started) => started,
        Err(e) => {
            // The file may have vanished since the cached existence check.
            state.catalog.invalidate(&path);
            return Err(e.into());
        }
    };
    Ok(Json(WatchResponse {
        path: started.path.to_string_lossy().to_string(),
        node_count: started.node_count,
        tree: started.tree,
    }))
}

/// DELETE /api/watch
pub async fn stop_watch(State(state): State<Arc<AppState>>) -> Json<StopResponse> {
    Json(StopResponse {
        stopped: state.watch.stop().await,
    })
}

/// GET /api/watch
pub async fn current_watch(State(state): State<Arc<AppState>>) -> Json<CurrentWatch> {
    let current = state.watch.current().await;
    Json(match current {
        Some((path, tree)) => CurrentWatch {
            path: Some(path.to_string_lossy().to_string()),
            tree: Some(tree),
        },
        None => CurrentWatch {
            path: None,
            tree: None,
        },
    })
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route(
        "/watch",
        get(current_watch).post(start_watch).delete(stop_watch),
    )
}
