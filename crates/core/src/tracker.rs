// crates/core/src/tracker.rs
//! Incremental line tracker for append-only logs.
//!
//! Every poll re-reads the whole file. Line indices below `processed_lines`
//! are skipped without validation; that is only a shortcut. Dedup is
//! enforced by the fingerprint set, so a rewritten file with shifted
//! offsets still yields each record once.
//!
//! Known limitation: a truncation that reproduces earlier content is
//! indistinguishable from replay and is skipped. Likewise two distinct
//! identifier-less lines whose rolling hashes collide are treated as one.

use std::collections::HashSet;
use std::path::Path;

use tracing::debug;

use crate::classifier::classify_line;
use crate::error::ParseError;
use crate::types::{LogRecord, RecordPayload};

/// Dedup identity of a record: its identifier, `snapshot-<messageId>` for
/// file snapshots, else a rolling hash of the raw line.
pub fn fingerprint(uuid: Option<&str>, payload: &RecordPayload, line: &str) -> String {
    if let Some(uuid) = uuid.filter(|u| !u.is_empty()) {
        return uuid.to_string();
    }
    if let RecordPayload::FileSnapshot {
        message_id: Some(message_id),
    } = payload
    {
        return format!("snapshot-{message_id}");
    }
    line_hash(line)
}

/// 32-bit `h * 31 + c` over the line's chars, rendered as `line-<hex>`.
pub fn line_hash(line: &str) -> String {
    let hash = line
        .chars()
        .fold(0u32, |h, c| h.wrapping_mul(31).wrapping_add(c as u32));
    format!("line-{hash:x}")
}

/// A structurally complete JSON line, recognized or not.
fn is_complete_json(line: &str) -> bool {
    serde_json::from_str::<serde::de::IgnoredAny>(line).is_ok()
}

#[derive(Debug, Default)]
pub struct LineTracker {
    /// Count of leading lines known to be complete and processed.
    processed_lines: usize,
    fingerprints: HashSet<String>,
}

impl LineTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn processed_lines(&self) -> usize {
        self.processed_lines
    }

    pub fn seen(&self, fingerprint: &str) -> bool {
        self.fingerprints.contains(fingerprint)
    }

    /// Feed the full current text of the log; returns records not seen
    /// before, in file order.
    pub fn ingest(&mut self, text: &str) -> Vec<LogRecord> {
        let lines: Vec<&str> = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();

        if lines.len() < self.processed_lines {
            debug!(
                previous = self.processed_lines,
                now = lines.len(),
                "log shrank; rescanning from start"
            );
            self.processed_lines = 0;
        }

        let mut fresh = Vec::new();
        // Position only advances across an unbroken run of valid lines, so
        // an in-flight line is revisited once the write completes.
        let mut contiguous = true;
        for (index, line) in lines.iter().enumerate().skip(self.processed_lines) {
            let record = classify_line(line);
            if record.is_none() && !is_complete_json(line) {
                debug!(line = index, "skipping incomplete line");
                contiguous = false;
                continue;
            }
            if contiguous {
                self.processed_lines = index + 1;
            }
            let Some(record) = record else {
                continue;
            };
            if self.fingerprints.insert(record.fingerprint.clone()) {
                fresh.push(record);
            }
        }
        fresh
    }

    /// Read `path` and ingest its contents.
    pub async fn poll(&mut self, path: &Path) -> Result<Vec<LogRecord>, ParseError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ParseError::io(path, e))?;
        Ok(self.ingest(&String::from_utf8_lossy(&bytes)))
    }

    pub fn reset(&mut self) {
        self.processed_lines = 0;
        self.fingerprints.clear();
    }
}
