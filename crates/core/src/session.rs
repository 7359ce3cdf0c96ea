// crates/core/src/session.rs
//! One watched log: line tracker plus node registry.

use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::classifier::expand_record;
use crate::error::ParseError;
use crate::registry::NodeRegistry;
use crate::tracker::LineTracker;
use crate::types::{LogRecord, Node};

#[derive(Debug, Default)]
pub struct LogSession {
    tracker: LineTracker,
    registry: NodeRegistry,
}

impl LogSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the full current text of the log. Returns how many node
    /// identifiers were not in the registry before.
    pub fn ingest_text(&mut self, text: &str) -> usize {
        let records = self.tracker.ingest(text);
        self.apply(records)
    }

    fn apply(&mut self, records: Vec<LogRecord>) -> usize {
        let mut added = 0;
        for record in records {
            let record = Arc::new(record);
            for node in expand_record(&record) {
                if self.registry.get(&node.id).is_none() {
                    added += 1;
                }
                self.registry.upsert(node);
            }
        }
        added
    }

    /// Fresh load: drop all state, then read the file.
    pub async fn load(&mut self, path: &Path) -> Result<usize, ParseError> {
        self.clear();
        self.poll(path).await
    }

    /// Re-read the file and ingest what is new. On error nothing changes.
    pub async fn poll(&mut self, path: &Path) -> Result<usize, ParseError> {
        let records = self.tracker.poll(path).await?;
        let added = self.apply(records);
        debug!(path = %path.display(), added, total = self.registry.len(), "log polled");
        Ok(added)
    }

    pub fn snapshot(&self) -> Vec<Node> {
        self.registry.snapshot()
    }

    pub fn node_count(&self) -> usize {
        self.registry.len()
    }

    pub fn clear(&mut self) {
        self.registry.clear();
        self.tracker.reset();
    }
}
