//! API route handlers for the tailview server.

pub mod health;
pub mod sessions;
pub mod watch;
pub mod ws;

use std::sync::Arc;

use axum::Router;

use crate::state::AppState;

/// Create the combined API router with all routes under /api prefix.
///
/// Routes:
/// - GET    /api/health   - Health check
/// - GET    /api/sessions - List logs available for watching
/// - GET    /api/watch    - Current watch path and tree
/// - POST   /api/watch    - Begin watching a log
/// - DELETE /api/watch    - Stop watching
/// - GET    /api/ws       - WebSocket stream of tree snapshots
pub fn api_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api", health::router())
        .nest("/api", sessions::router())
        .nest("/api", watch::router())
        .nest("/api", ws::router())
        .with_state(state)
}
