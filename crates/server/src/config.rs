// crates/server/src/config.rs
//! Runtime configuration from environment variables.

use std::path::PathBuf;
use std::time::Duration;

/// Default port for the server.
pub const DEFAULT_PORT: u16 = 47893;
pub const DEFAULT_DEBOUNCE_MS: u64 = 150;
pub const DEFAULT_CACHE_TTL_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// Root scanned for logs.
    pub projects_dir: PathBuf,
    /// Quiet period after the last change before a cycle runs.
    pub debounce: Duration,
    /// TTL for the listing metadata and existence caches.
    pub cache_ttl: Duration,
    /// Frontend bundle to serve, if any.
    pub static_dir: Option<PathBuf>,
}

impl Config {
    /// Read configuration from the process environment.
    ///
    /// Unparseable values fall back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let port = lookup("TAILVIEW_PORT")
            .or_else(|| lookup("PORT"))
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        let projects_dir = lookup("TAILVIEW_PROJECTS_DIR")
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
            .or_else(|| tailview_core::projects_dir().ok())
            .unwrap_or_else(|| PathBuf::from(".claude").join("projects"));

        let debounce_ms = lookup("TAILVIEW_DEBOUNCE_MS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_DEBOUNCE_MS);

        let cache_ttl_secs = lookup("TAILVIEW_CACHE_TTL_SECS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_CACHE_TTL_SECS);

        // STATIC_DIR wins; otherwise ./dist when present; otherwise API-only.
        let static_dir = lookup("STATIC_DIR").map(PathBuf::from).or_else(|| {
            let dist = PathBuf::from("dist");
            dist.exists().then_some(dist)
        });

        Self {
            port,
            projects_dir,
            debounce: Duration::from_millis(debounce_ms),
            cache_ttl: Duration::from_secs(cache_ttl_secs),
            static_dir,
        }
    }
}
