//! File system watcher for the single watched log.
//!
//! notify cannot watch individual files on every platform (macOS FSEvents in
//! particular), so the log's parent directory is watched non-recursively and
//! events are filtered down to the target path.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

/// Events emitted for the watched log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// The log was created or written to.
    Modified,
    /// The log was removed (or renamed away).
    Removed,
}

/// Start a notify watcher for `path`, forwarding its events into `tx`.
/// `path` must already be canonical; event paths are compared verbatim.
///
/// Sends are best-effort: a full channel drops the event, and the next one
/// re-reads the whole file anyway. Dropping the returned watcher stops the
/// watch.
pub fn watch_file(path: &Path, tx: mpsc::Sender<WatchEvent>) -> notify::Result<RecommendedWatcher> {
    let target: PathBuf = path.to_path_buf();
    let dropped = Arc::new(AtomicU64::new(0));

    let mut watcher = notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| {
        let event = match res {
            Ok(event) => event,
            Err(e) => {
                error!(error = %e, "File watcher error");
                return;
            }
        };
        if !event.paths.iter().any(|p| p == &target) {
            return;
        }
        let watch_event = match event.kind {
            EventKind::Modify(_) | EventKind::Create(_) => WatchEvent::Modified,
            EventKind::Remove(_) => WatchEvent::Removed,
            _ => return,
        };
        if tx.try_send(watch_event).is_err() {
            let count = dropped.fetch_add(1, Ordering::Relaxed) + 1;
            if count == 1 || count % 100 == 0 {
                warn!(dropped_total = count, "Watch channel full, event dropped");
            }
        }
    })?;

    let watch_dir = path.parent().unwrap_or_else(|| Path::new("."));
    watcher.watch(watch_dir, RecursiveMode::NonRecursive)?;
    debug!(path = %path.display(), "Watching log file");
    Ok(watcher)
}

/// Wait for the next event, then absorb follow-ups until `quiet` elapses
/// with none. Returns `None` once the channel is closed.
///
/// A removal in the burst wins over modifications.
pub async fn next_settled(rx: &mut mpsc::Receiver<WatchEvent>, quiet: Duration) -> Option<WatchEvent> {
    let mut settled = rx.recv().await?;
    loop {
        match tokio::time::timeout(quiet, rx.recv()).await {
            Ok(Some(event)) => {
                if settled != WatchEvent::Removed {
                    settled = event;
                }
            }
            // Channel closed mid-burst: still deliver what arrived.
            Ok(None) => return Some(settled),
            Err(_elapsed) => return Some(settled),
        }
    }
}
