// crates/server/src/routes/health.rs
//! Health check endpoint for the API.

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Response for the health check endpoint.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
    pub watching: bool,
    /// Log currently being watched, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub watched_path: Option<String>,
}

/// GET /api/health - Health check endpoint.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let watched_path = state
        .watch
        .watched_path()
        .await
        .map(|p| p.to_string_lossy().to_string());
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.uptime_secs(),
        watching: watched_path.is_some(),
        watched_path,
    })
}

/// Create the health routes router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(health_check))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::time::Duration;

    #[tokio::test]
    async fn test_health_reports_watched_log() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("s1.jsonl");
        std::fs::write(
            &log,
            r#"{"type":"user","uuid":"u1","timestamp":"2026-01-01T00:00:00Z","message":{"content":"hi"}}"#,
        )
        .unwrap();
        let state = AppState::new(Config {
            port: 0,
            projects_dir: dir.path().to_path_buf(),
            debounce: Duration::from_millis(20),
            cache_ttl: Duration::from_secs(30),
            static_dir: None,
        });

        let Json(idle) = health_check(State(Arc::clone(&state))).await;
        assert!(!idle.watching);
        assert!(idle.watched_path.is_none());

        state.watch.start(&log).await.unwrap();
        let Json(busy) = health_check(State(Arc::clone(&state))).await;
        assert!(busy.watching);
        assert_eq!(busy.watched_path, Some(log.to_string_lossy().to_string()));

        let json = serde_json::to_value(&busy).unwrap();
        assert_eq!(json["status"], "ok");
        assert!(json["uptime_secs"].is_u64());
    }
}
