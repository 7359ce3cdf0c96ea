// crates/core/src/discovery.rs
//! Log discovery under the projects directory.
//!
//! Layout is fixed at two levels: `<projects>/<project-slug>/<id>.jsonl`.
//! Listing stats every file but only re-scans a file's first lines when the
//! cached scan is older than the TTL or the modification time moved.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant, SystemTime};

use tokio::fs;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use crate::boilerplate::{classify_user_content, Verdict};
use crate::classifier::classify_line;
use crate::error::DiscoveryError;
use crate::types::{LogSummary, RecordPayload};

/// Number of leading lines the metadata scan reads.
pub const SCAN_LINES: usize = 4;

/// Returns the path to the projects directory (`~/.claude/projects`).
///
/// # Errors
/// Returns `DiscoveryError::HomeDirNotFound` if the home directory cannot be determined.
pub fn projects_dir() -> Result<PathBuf, DiscoveryError> {
    let home = dirs::home_dir().ok_or(DiscoveryError::HomeDirNotFound)?;
    Ok(home.join(".claude").join("projects"))
}

/// Decode a project directory name: `--` becomes `/`, any remaining `-`
/// becomes a space.
///
/// Lossy for names that contain literal dashes.
pub fn decode_project_slug(slug: &str) -> String {
    slug.split("--")
        .map(|part| part.replace('-', " "))
        .collect::<Vec<_>>()
        .join("/")
}

/// External identifier of a log: its file name without extension.
pub fn log_id(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// What the first few lines of a log say about it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanMetadata {
    pub preview: Option<String>,
    pub started_at: Option<String>,
    pub cwd: Option<String>,
    pub git_branch: Option<String>,
    pub lines_scanned: usize,
}

/// Scan the first [`SCAN_LINES`] non-empty lines of a log.
pub async fn scan_metadata(path: &Path) -> std::io::Result<ScanMetadata> {
    let file = fs::File::open(path).await?;
    let mut lines = BufReader::new(file).lines();
    let mut meta = ScanMetadata::default();

    while meta.lines_scanned < SCAN_LINES {
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        meta.lines_scanned += 1;

        let Some(record) = classify_line(line) else {
            continue;
        };
        let field = |key: &str| {
            record
                .raw
                .get(key)
                .and_then(|v| v.as_str())
                .filter(|s| !s.is_empty())
                .map(String::from)
        };
        if meta.cwd.is_none() {
            meta.cwd = field("cwd");
        }
        if meta.git_branch.is_none() {
            meta.git_branch = field("gitBranch");
        }
        if meta.started_at.is_none() && !record.timestamp.is_empty() {
            meta.started_at = Some(record.timestamp.clone());
        }
        if meta.preview.is_none() {
            if let RecordPayload::User { content, .. } = &record.payload {
                if let Verdict::User { summary } = classify_user_content(content) {
                    meta.preview = Some(summary).filter(|s| !s.trim().is_empty());
                }
            }
        }
    }
    Ok(meta)
}

#[derive(Debug, Clone)]
struct CachedScan {
    scanned_at: Instant,
    modified: SystemTime,
    meta: ScanMetadata,
}

/// Listing of available logs with cached per-file metadata.
#[derive(Debug)]
pub struct SessionCatalog {
    root: PathBuf,
    ttl: Duration,
    scans: Mutex<HashMap<PathBuf, CachedScan>>,
    /// Paths last seen to exist, with when. Misses are never cached.
    existence: Mutex<HashMap<PathBuf, Instant>>,
}

impl SessionCatalog {
    pub fn new(root: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            root: root.into(),
            ttl,
            scans: Mutex::new(HashMap::new()),
            existence: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Every log under the root, newest first. Logs whose stat or scan
    /// fails are left out.
    ///
    /// # Errors
    /// Only an unreadable root is an error; a missing root lists nothing.
    pub async fn list(&self) -> Result<Vec<LogSummary>, DiscoveryError> {
        let mut projects = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(root = %self.root.display(), "projects directory does not exist");
                return Ok(Vec::new());
            }
            Err(e) => return Err(DiscoveryError::io(&self.root, e)),
        };

        let mut summaries = Vec::new();
        while let Some(project) = projects
            .next_entry()
            .await
            .map_err(|e| DiscoveryError::io(&self.root, e))?
        {
            let project_path = project.path();
            if !project.file_type().await.is_ok_and(|t| t.is_dir()) {
                continue;
            }
            let slug = project.file_name().to_string_lossy().to_string();
            let mut logs = match fs::read_dir(&project_path).await {
                Ok(entries) => entries,
                Err(e) => {
                    debug!(path = %project_path.display(), error = %e, "skipping unreadable project");
                    continue;
                }
            };
            while let Ok(Some(entry)) = logs.next_entry().await {
                let path = entry.path();
                if path.extension().map(|e| e != "jsonl").unwrap_or(true) {
                    continue;
                }
                match self.summarize(&path, &slug).await {
                    Ok(summary) => summaries.push(summary),
                    Err(e) => debug!(path = %path.display(), error = %e, "omitting log from listing"),
                }
            }
        }

        // Forget logs that vanished since the last listing.
        let listed: HashSet<&str> = summaries.iter().map(|s| s.path.as_str()).collect();
        self.lock_scans().retain(|path, cached| {
            cached.scanned_at.elapsed() < self.ttl && path.to_str().is_some_and(|p| listed.contains(p))
        });
        self.prune_existence();

        summaries.sort_by(|a, b| {
            b.modified_at
                .cmp(&a.modified_at)
                .then_with(|| a.path.cmp(&b.path))
        });
        Ok(summaries)
    }

    async fn summarize(&self, path: &Path, slug: &str) -> std::io::Result<LogSummary> {
        let metadata = fs::metadata(path).await?;
        let modified = metadata.modified()?;
        let meta = self.cached_scan(path, modified).await?;

        let modified_at = modified
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);

        Ok(LogSummary {
            id: log_id(path),
            project: decode_project_slug(slug),
            path: path.to_string_lossy().to_string(),
            size_bytes: metadata.len(),
            modified_at,
            preview: meta.preview,
            started_at: meta.started_at,
            cwd: meta.cwd,
            git_branch: meta.git_branch,
            lines_scanned: meta.lines_scanned,
        })
    }

    async fn cached_scan(&self, path: &Path, modified: SystemTime) -> std::io::Result<ScanMetadata> {
        let hit = self
            .lock_scans()
            .get(path)
            .filter(|c| c.modified == modified && c.scanned_at.elapsed() < self.ttl)
            .map(|c| c.meta.clone());
        if let Some(meta) = hit {
            return Ok(meta);
        }

        let meta = scan_metadata(path).await?;
        self.lock_scans().insert(
            path.to_path_buf(),
            CachedScan {
                scanned_at: Instant::now(),
                modified,
                meta: meta.clone(),
            },
        );
        Ok(meta)
    }

    /// Whether `path` is an existing regular file.
    ///
    /// A positive answer is cached for the TTL; a negative one is re-checked
    /// every call so a log created later is found right away.
    pub async fn exists(&self, path: &Path) -> bool {
        self.prune_existence();
        if self.lock_existence().contains_key(path) {
            return true;
        }
        let exists = fs::metadata(path).await.is_ok_and(|m| m.is_file());
        if exists {
            self.lock_existence()
                .insert(path.to_path_buf(), Instant::now());
        }
        exists
    }

    fn prune_existence(&self) {
        self.lock_existence()
            .retain(|_, checked_at| checked_at.elapsed() < self.ttl);
    }

    /// Drop any cached state for `path`.
    pub fn invalidate(&self, path: &Path) {
        self.lock_scans().remove(path);
        self.lock_existence().remove(path);
    }

    fn lock_scans(&self) -> std::sync::MutexGuard<'_, HashMap<PathBuf, CachedScan>> {
        self.scans.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_existence(&self) -> std::sync::MutexGuard<'_, HashMap<PathBuf, Instant>> {
        self.existence
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
