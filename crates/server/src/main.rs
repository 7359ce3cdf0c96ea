// crates/server/src/main.rs
//! Tailview server binary.
//!
//! Reads configuration from the environment, binds to localhost, and serves
//! the log listing, watch control, and tree WebSocket until killed.

use std::net::SocketAddr;

use anyhow::Result;
use tailview_server::{create_app, Config};
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "warn,tailview_server=info,tailview_core=info";

#[tokio::main]
async fn main() -> Result<()> {
    // RUST_LOG overrides the default filter
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    tracing_subscriber::fmt().with_env_filter(filter).compact().init();

    let config = Config::from_env();
    let port = config.port;

    eprintln!("\n\u{1f50d} tailview v{}\n", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        projects_dir = %config.projects_dir.display(),
        debounce_ms = config.debounce.as_millis() as u64,
        static_dir = ?config.static_dir,
        "Starting server"
    );
    if !config.projects_dir.exists() {
        tracing::warn!(
            projects_dir = %config.projects_dir.display(),
            "Projects directory does not exist; listing will be empty"
        );
    }

    let app = create_app(config);

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    eprintln!("  \u{2192} http://localhost:{}\n", port);

    axum::serve(listener, app).await?;

    Ok(())
}
