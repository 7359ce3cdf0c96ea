#![no_main]
//! Arbitrary bytes must never panic the line classifier, the incremental
//! tracker, or tree reconstruction.

use libfuzzer_sys::fuzz_target;
use tailview_core::{classify_line, LogSession, Node};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    for line in text.lines() {
        let _ = classify_line(line);
    }

    let mut session = LogSession::new();
    session.ingest_text(text);
    // Orphaned tool results may be dropped, but nothing appears twice.
    let tree = session.snapshot();
    let mut ids = std::collections::HashSet::new();
    let mut stack: Vec<&Node> = tree.iter().collect();
    while let Some(node) = stack.pop() {
        assert!(ids.insert(node.id.as_str()), "duplicate node {}", node.id);
        stack.extend(node.children.iter());
    }
    assert!(ids.len() <= session.node_count());

    // Re-reading unchanged content adds nothing.
    assert_eq!(session.ingest_text(text), 0);
});
