// crates/server/src/state.rs
//! Application state for the Axum server.

use std::sync::Arc;
use std::time::Instant;

use tailview_core::SessionCatalog;

use crate::config::Config;
use crate::live::WatchManager;

/// Shared application state accessible from all route handlers.
pub struct AppState {
    /// Server start time for uptime tracking.
    pub start_time: Instant,
    pub config: Config,
    /// The single active watch and its subscriber channel.
    pub watch: WatchManager,
    /// Listing of available logs with cached metadata.
    pub catalog: SessionCatalog,
}

impl AppState {
    pub fn new(config: Config) -> Arc<Self> {
        Arc::new(Self {
            start_time: Instant::now(),
            watch: WatchManager::new(config.debounce),
            catalog: SessionCatalog::new(config.projects_dir.clone(), config.cache_ttl),
            config,
        })
    }

    /// Get the server uptime in seconds.
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;

    #[test]
    fn test_state_uses_config() {
        let config = Config {
            port: 0,
            projects_dir: PathBuf::from("/tmp/projects"),
            debounce: Duration::from_millis(10),
            cache_ttl: Duration::from_secs(1),
            static_dir: None,
        };
        let state = AppState::new(config);
        assert_eq!(state.catalog.root(), std::path::Path::new("/tmp/projects"));
        assert!(state.uptime_secs() < 5);
    }
}
