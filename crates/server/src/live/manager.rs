//! The single active watch.
//!
//! `WatchManager` owns at most one watched log. Starting a watch stops the
//! previous one first. Each watch runs one task that turns settled file
//! events into read-parse-rebuild-notify cycles, strictly one at a time.
//!
//! Every watch is tagged with a generation number. A cycle that finishes
//! after its watch was stopped or superseded sees a newer generation and
//! discards its result instead of notifying.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use notify::RecommendedWatcher;
use serde::Serialize;
use tailview_core::{LogSession, Node, ParseError};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::watcher::{next_settled, watch_file, WatchEvent};

/// What subscribers receive.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TreeEvent {
    /// The full current tree of the watched log.
    Snapshot { path: String, tree: Vec<Node> },
    /// The watch ended; drop whatever is displayed.
    Clear,
}

#[derive(Debug, Error)]
pub enum WatchError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("failed to watch file: {0}")]
    Notify(#[from] notify::Error),
}

/// Result of starting a watch.
#[derive(Debug, Clone)]
pub struct WatchStarted {
    pub path: PathBuf,
    pub node_count: usize,
    pub tree: Vec<Node>,
}

struct ActiveWatch {
    path: PathBuf,
    session: Arc<Mutex<LogSession>>,
    _watcher: RecommendedWatcher,
    task: JoinHandle<()>,
}

pub struct WatchManager {
    active: Mutex<Option<ActiveWatch>>,
    generation: Arc<AtomicU64>,
    tx: broadcast::Sender<TreeEvent>,
    debounce: Duration,
}

impl WatchManager {
    pub fn new(debounce: Duration) -> Self {
        let (tx, _rx) = broadcast::channel(64);
        Self {
            active: Mutex::new(None),
            generation: Arc::new(AtomicU64::new(0)),
            tx,
            debounce,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TreeEvent> {
        self.tx.subscribe()
    }

    /// Begin watching `path`, superseding any current watch.
    ///
    /// The initial read is fatal for the attempt: on failure nothing is
    /// watched afterwards and subscribers are told to clear.
    pub async fn start(&self, path: &Path) -> Result<WatchStarted, WatchError> {
        let mut active = self.active.lock().await;
        let had_previous = active.is_some();
        self.shutdown(&mut active);
        let generation = self.generation.load(Ordering::SeqCst);

        // notify reports resolved paths, so symlinks must be resolved before
        // events can be matched against the target.
        let resolved = match tokio::fs::canonicalize(path).await {
            Ok(resolved) => resolved,
            Err(e) => {
                if had_previous {
                    self.notify(TreeEvent::Clear);
                }
                return Err(ParseError::io(path, e).into());
            }
        };

        // Watch before the first read so appends in between are not missed.
        let (event_tx, event_rx) = mpsc::channel(64);
        let watcher = match watch_file(&resolved, event_tx) {
            Ok(w) => w,
            Err(e) => {
                if had_previous {
                    self.notify(TreeEvent::Clear);
                }
                return Err(e.into());
            }
        };

        let mut session = LogSession::new();
        let loaded = match session.load(path).await {
            Ok(n) => n,
            Err(e) => {
                if had_previous {
                    self.notify(TreeEvent::Clear);
                }
                return Err(e.into());
            }
        };

        let tree = session.snapshot();
        let session = Arc::new(Mutex::new(session));
        let task = tokio::spawn(run_cycles(
            path.to_path_buf(),
            Arc::clone(&session),
            event_rx,
            self.debounce,
            Arc::clone(&self.generation),
            generation,
            self.tx.clone(),
        ));

        info!(path = %path.display(), nodes = loaded, "Watch started");
        self.notify(TreeEvent::Snapshot {
            path: path.to_string_lossy().to_string(),
            tree: tree.clone(),
        });

        *active = Some(ActiveWatch {
            path: path.to_path_buf(),
            session,
            _watcher: watcher,
            task,
        });

        Ok(WatchStarted {
            path: path.to_path_buf(),
            node_count: loaded,
            tree,
        })
    }

    /// Stop the current watch, if any, and tell subscribers to clear.
    /// Returns whether a watch was active.
    pub async fn stop(&self) -> bool {
        let mut active = self.active.lock().await;
        let was_active = self.shutdown(&mut active);
        if was_active {
            self.notify(TreeEvent::Clear);
        }
        was_active
    }

    pub async fn watched_path(&self) -> Option<PathBuf> {
        self.active.lock().await.as_ref().map(|w| w.path.clone())
    }

    /// Path and full tree of the current watch.
    pub async fn current(&self) -> Option<(PathBuf, Vec<Node>)> {
        let (path, session) = {
            let active = self.active.lock().await;
            let watch = active.as_ref()?;
            (watch.path.clone(), Arc::clone(&watch.session))
        };
        let tree = session.lock().await.snapshot();
        Some((path, tree))
    }

    /// The current tree as a snapshot event.
    pub async fn current_event(&self) -> Option<TreeEvent> {
        self.current().await.map(|(path, tree)| TreeEvent::Snapshot {
            path: path.to_string_lossy().to_string(),
            tree,
        })
    }

    fn shutdown(&self, active: &mut Option<ActiveWatch>) -> bool {
        // Invalidate in-flight cycles before anything else.
        self.generation.fetch_add(1, Ordering::SeqCst);
        let Some(watch) = active.take() else {
            return false;
        };
        watch.task.abort();
        info!(path = %watch.path.display(), "Watch stopped");
        true
    }

    fn notify(&self, event: TreeEvent) {
        // No subscribers is fine.
        let _ = self.tx.send(event);
    }
}

/// One watch's event loop. Cycles run sequentially; the loop ends when the
/// watcher is dropped or the task is aborted.
async fn run_cycles(
    path: PathBuf,
    session: Arc<Mutex<LogSession>>,
    mut events: mpsc::Receiver<WatchEvent>,
    debounce: Duration,
    current_generation: Arc<AtomicU64>,
    generation: u64,
    tx: broadcast::Sender<TreeEvent>,
) {
    while let Some(event) = next_settled(&mut events, debounce).await {
        if current_generation.load(Ordering::SeqCst) != generation {
            break;
        }
        if event == WatchEvent::Removed {
            debug!(path = %path.display(), "Watched log removed");
        }

        let mut guard = session.lock().await;
        let added = match guard.poll(&path).await {
            Ok(added) => added,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Poll failed; keeping last tree");
                continue;
            }
        };
        if current_generation.load(Ordering::SeqCst) != generation {
            debug!(path = %path.display(), "Discarding cycle for stopped watch");
            break;
        }
        if added == 0 {
            continue;
        }
        let tree = guard.snapshot();
        drop(guard);
        debug!(path = %path.display(), added, "Broadcasting tree");
        let _ = tx.send(TreeEvent::Snapshot {
            path: path.to_string_lossy().to_string(),
            tree,
        });
    }
}
