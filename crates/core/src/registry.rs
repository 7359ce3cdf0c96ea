// crates/core/src/registry.rs
//! Authoritative node set for the active log.

use std::collections::HashMap;

use tracing::debug;

use crate::tree::reconstruct;
use crate::types::{count_nodes, Node};

/// Every known node, keyed by identifier.
///
/// Stored nodes never carry children; [`NodeRegistry::snapshot`] builds a
/// fresh forest from clones on each call.
#[derive(Debug, Default)]
pub struct NodeRegistry {
    /// id → (first insertion sequence, node)
    entries: HashMap<String, (usize, Node)>,
    next_seq: usize,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite by identifier, last write wins. An overwritten
    /// node keeps its original insertion position for tie-breaking.
    pub fn upsert(&mut self, mut node: Node) {
        node.children.clear();
        match self.entries.get_mut(&node.id) {
            Some((_, existing)) => *existing = node,
            None => {
                let seq = self.next_seq;
                self.next_seq += 1;
                self.entries.insert(node.id.clone(), (seq, node));
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&Node> {
        self.entries.get(id).map(|(_, node)| node)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.next_seq = 0;
    }

    /// The fully reorganized tree over the current entries.
    pub fn snapshot(&self) -> Vec<Node> {
        let mut ordered: Vec<&(usize, Node)> = self.entries.values().collect();
        ordered.sort_by_key(|(seq, _)| *seq);
        let tree = reconstruct(ordered.into_iter().map(|(_, node)| node.clone()).collect());
        let placed = count_nodes(&tree);
        if placed < self.entries.len() {
            debug!(
                known = self.entries.len(),
                placed,
                "orphaned tool results left out of tree"
            );
        }
        tree
    }
}
