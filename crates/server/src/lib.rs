// crates/server/src/lib.rs
//! Tailview server library.
//!
//! Axum HTTP/WebSocket front end over `tailview-core`: lists logs, manages
//! the single active watch, and pushes rebuilt trees to subscribers.

pub mod config;
pub mod error;
pub mod live;
pub mod routes;
pub mod state;

pub use config::Config;
pub use error::*;
pub use routes::api_routes;
pub use state::AppState;

use std::path::Path;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

/// Create the Axum application with all routes and middleware.
///
/// This sets up:
/// - API routes (health, sessions, watch, ws)
/// - Static UI files when `config.static_dir` is set
/// - CORS for development (allows any origin)
/// - Request tracing
pub fn create_app(config: Config) -> Router {
    create_app_with_state(AppState::new(config))
}

/// Same as [`create_app`] over an existing state.
pub fn create_app_with_state(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let static_dir = state.config.static_dir.clone();
    let mut app = api_routes(state);
    if let Some(dir) = static_dir {
        app = app.fallback_service(static_service(&dir));
    }

    app.layer(cors).layer(TraceLayer::new_for_http())
}

/// Serve the UI bundle, falling back to `index.html` for client-side routes.
fn static_service(dir: &Path) -> ServeDir<tower_http::set_status::SetStatus<ServeFile>> {
    ServeDir::new(dir).not_found_service(ServeFile::new(dir.join("index.html")))
}

// ============================================================================
// Router Tests
// ============================================================================
