// crates/core/src/tree.rs
//! Tree reconstruction.
//!
//! The whole forest is rebuilt from the flat node set on every call; nothing
//! from a previous pass is reused. Nodes live in an index arena and edges are
//! recomputed into fresh adjacency lists, so a node re-parented between
//! passes can never alias an old child list.
//!
//! Two phases:
//!
//! - **Raw linkage**: each node hangs off its declared parent when that
//!   parent is known, otherwise it is a root.
//! - **Display reorganization**: nodes are regrouped into turns. Each
//!   `user`/`system` node opens a turn; the last `assistant` node of the turn
//!   becomes its primary response and collects the turn's thinking,
//!   invocations (with their results), and earlier assistant segments.
//!
//! When the set has no turn starter, raw linkage is the answer.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDateTime};

use crate::types::{Node, NodeKind};

/// Timestamp order with unparsable timestamps last, ties broken by
/// insertion order.
type SortKey = (bool, i64, usize);

fn sort_key(node: &Node, seq: usize) -> SortKey {
    match timestamp_millis(&node.timestamp) {
        Some(millis) => (false, millis, seq),
        None => (true, 0, seq),
    }
}

/// RFC 3339, or ISO 8601 without an offset read as UTC.
fn timestamp_millis(ts: &str) -> Option<i64> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(ts) {
        return Some(parsed.timestamp_millis());
    }
    NaiveDateTime::parse_from_str(ts, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc().timestamp_millis())
}

/// Arena-backed shape of one output subtree.
struct Draft {
    index: usize,
    children: Vec<Draft>,
}

impl Draft {
    fn leaf(index: usize) -> Self {
        Self {
            index,
            children: Vec::new(),
        }
    }
}

struct Arena {
    nodes: Vec<Option<Node>>,
    keys: Vec<SortKey>,
    /// Indices in timestamp order.
    order: Vec<usize>,
}

impl Arena {
    fn new(nodes: Vec<Node>) -> Self {
        let keys: Vec<SortKey> = nodes.iter().enumerate().map(|(i, n)| sort_key(n, i)).collect();
        let mut order: Vec<usize> = (0..nodes.len()).collect();
        order.sort_by_key(|&i| keys[i]);
        let nodes = nodes
            .into_iter()
            .map(|mut n| {
                n.children.clear();
                Some(n)
            })
            .collect();
        Self { nodes, keys, order }
    }

    fn node(&self, index: usize) -> Option<&Node> {
        self.nodes.get(index).and_then(Option::as_ref)
    }

    fn kind(&self, index: usize) -> Option<NodeKind> {
        self.node(index).map(|n| n.kind)
    }

    /// Move drafted nodes out of the arena into owned trees. Each index is
    /// taken once; a second visit yields nothing.
    fn materialize(&mut self, drafts: Vec<Draft>) -> Vec<Node> {
        drafts
            .into_iter()
            .filter_map(|draft| {
                let mut node = self.nodes.get_mut(draft.index)?.take()?;
                node.children = self.materialize(draft.children);
                Some(node)
            })
            .collect()
    }
}

/// Rebuild the display forest from `nodes`, given in insertion order.
pub fn reconstruct(nodes: Vec<Node>) -> Vec<Node> {
    let mut arena = Arena::new(nodes);
    let starters: Vec<usize> = arena
        .order
        .iter()
        .enumerate()
        .filter(|(_, &i)| arena.kind(i).is_some_and(NodeKind::is_turn_starter))
        .map(|(pos, _)| pos)
        .collect();

    let drafts = if starters.is_empty() {
        link(&arena)
    } else {
        reorganize(&arena, &starters)
    };
    arena.materialize(drafts)
}

/// Raw linkage by declared parent.
fn link(arena: &Arena) -> Vec<Draft> {
    let len = arena.nodes.len();
    let by_id: HashMap<&str, usize> = (0..len)
        .filter_map(|i| arena.node(i).map(|n| (n.id.as_str(), i)))
        .collect();

    let mut parent: Vec<Option<usize>> = vec![None; len];
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); len];
    let mut roots = Vec::new();
    for &i in &arena.order {
        let declared = arena
            .node(i)
            .and_then(|n| n.parent_id.as_deref())
            .and_then(|p| by_id.get(p).copied())
            .filter(|&p| p != i);
        match declared {
            Some(p) => {
                parent[i] = Some(p);
                children[p].push(i);
            }
            None => roots.push(i),
        }
    }

    let mut reached = vec![false; len];
    for &root in &roots {
        mark_reached(root, &children, &mut reached);
    }
    // Parent cycles leave whole groups unreachable: cut each at its earliest
    // member and promote that member to a root.
    for &i in &arena.order {
        if reached[i] {
            continue;
        }
        if let Some(p) = parent[i].take() {
            children[p].retain(|&c| c != i);
        }
        roots.push(i);
        mark_reached(i, &children, &mut reached);
    }
    roots.sort_by_key(|&i| arena.keys[i]);

    roots
        .into_iter()
        .map(|root| linked_draft(root, &children))
        .collect()
}

fn mark_reached(start: usize, children: &[Vec<usize>], reached: &mut [bool]) {
    let mut stack = vec![start];
    while let Some(i) = stack.pop() {
        if std::mem::replace(&mut reached[i], true) {
            continue;
        }
        stack.extend(children[i].iter().copied());
    }
}

fn linked_draft(index: usize, children: &[Vec<usize>]) -> Draft {
    Draft {
        index,
        children: children[index]
            .iter()
            .map(|&c| linked_draft(c, children))
            .collect(),
    }
}

/// Turn-based regrouping. `starters` are positions in `arena.order`.
fn reorganize(arena: &Arena, starters: &[usize]) -> Vec<Draft> {
    let order = &arena.order;
    let mut consumed = vec![false; arena.nodes.len()];

    // Tool results keyed by the invocation they answer, in timestamp order.
    let mut results: HashMap<&str, Vec<usize>> = HashMap::new();
    for &i in order {
        if let Some(node) = arena.node(i).filter(|n| n.kind == NodeKind::ToolResult) {
            if let Some(parent) = node.parent_id.as_deref() {
                results.entry(parent).or_default().push(i);
            }
        }
    }

    let mut roots = Vec::new();

    // Anything before the first turn is emitted root by root.
    let preamble: Vec<usize> = order[..starters[0]].to_vec();
    roots.extend(loose_roots(arena, &preamble, &results, &mut consumed));

    for (k, &start) in starters.iter().enumerate() {
        let end = starters.get(k + 1).copied().unwrap_or(order.len());
        let turn = order[start];
        consumed[turn] = true;
        roots.push(Draft::leaf(turn));

        let working: Vec<usize> = order[start + 1..end]
            .iter()
            .copied()
            .filter(|&i| !consumed[i])
            .collect();

        let primary = working
            .iter()
            .rev()
            .copied()
            .find(|&i| arena.kind(i) == Some(NodeKind::Assistant));
        let Some(primary) = primary else {
            roots.extend(loose_roots(arena, &working, &results, &mut consumed));
            continue;
        };

        consumed[primary] = true;
        let mut response = Draft::leaf(primary);
        for &i in &working {
            if consumed[i] {
                continue;
            }
            let Some(kind) = arena.kind(i) else { continue };
            if kind == NodeKind::Thinking || kind == NodeKind::Assistant {
                consumed[i] = true;
                response.children.push(Draft::leaf(i));
            } else if kind.is_invocation() {
                response
                    .children
                    .push(invocation_draft(arena, i, &results, &mut consumed));
            }
        }
        roots.push(response);
    }
    roots
}

/// Every non-result node of `set` as its own root.
fn loose_roots(
    arena: &Arena,
    set: &[usize],
    results: &HashMap<&str, Vec<usize>>,
    consumed: &mut [bool],
) -> Vec<Draft> {
    let mut roots = Vec::new();
    for &i in set {
        if consumed[i] || arena.kind(i) == Some(NodeKind::ToolResult) {
            continue;
        }
        roots.push(invocation_draft(arena, i, results, consumed));
    }
    roots
}

/// Consume `index` together with the unconsumed results that answer it.
fn invocation_draft(
    arena: &Arena,
    index: usize,
    results: &HashMap<&str, Vec<usize>>,
    consumed: &mut [bool],
) -> Draft {
    consumed[index] = true;
    let mut draft = Draft::leaf(index);
    let matched = arena
        .node(index)
        .and_then(|n| results.get(n.id.as_str()))
        .map(Vec::as_slice)
        .unwrap_or_default();
    for &r in matched {
        if !consumed[r] && r != index {
            consumed[r] = true;
            draft.children.push(Draft::leaf(r));
        }
    }
    draft
}
