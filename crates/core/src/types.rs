// crates/core/src/types.rs
use std::sync::Arc;

use serde::{Serialize, Serializer};
use ts_rs::TS;

/// One content segment of an assistant message.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentSegment {
    Text(String),
    Thinking(String),
    ToolUse {
        id: Option<String>,
        name: String,
        input: serde_json::Value,
    },
    ToolResult(ToolResultSegment),
}

/// A `tool_result` block, either inside a user record or embedded in an
/// assistant message.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResultSegment {
    pub tool_use_id: String,
    pub content: serde_json::Value,
    pub is_error: bool,
}

/// Kind-specific body of a [`LogRecord`].
#[derive(Debug, Clone, PartialEq)]
pub enum RecordPayload {
    /// Free-form user message body: a string, or an array of blocks.
    User {
        content: serde_json::Value,
        tool_use_result: Option<serde_json::Value>,
    },
    Assistant {
        segments: Vec<ContentSegment>,
    },
    FileSnapshot {
        message_id: Option<String>,
    },
}

/// A single classified line of the log. Immutable once parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    /// Dedup identity: the record's `uuid`, `snapshot-<messageId>`, or a
    /// hash of the raw line.
    pub fingerprint: String,
    pub uuid: Option<String>,
    pub parent_id: Option<String>,
    pub timestamp: String,
    pub payload: RecordPayload,
    /// The line exactly as parsed, kept for raw-data inspection.
    pub raw: serde_json::Value,
}

impl LogRecord {
    /// Stable identifier nodes derive their ids from.
    pub fn id(&self) -> &str {
        self.uuid.as_deref().unwrap_or(&self.fingerprint)
    }
}

/// Display kind of a [`Node`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, TS)]
#[cfg_attr(feature = "codegen", ts(export, export_to = "../../../src/types/generated/"))]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    User,
    Assistant,
    Thinking,
    ToolCall,
    ToolResult,
    Agent,
    Skill,
    Command,
    System,
}

impl NodeKind {
    /// `user` and `system` nodes open a new turn.
    pub fn is_turn_starter(self) -> bool {
        matches!(self, NodeKind::User | NodeKind::System)
    }

    /// The assistant invoking some capability.
    pub fn is_invocation(self) -> bool {
        matches!(
            self,
            NodeKind::ToolCall | NodeKind::Agent | NodeKind::Skill | NodeKind::Command
        )
    }
}

/// Result of a tool execution, as reported alongside a tool result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, TS)]
#[cfg_attr(feature = "codegen", ts(export, export_to = "../../../src/types/generated/"))]
#[serde(rename_all = "camelCase")]
pub struct ToolExecution {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
}

/// The unit of display.
///
/// `children` is always rebuilt from scratch by the tree reconstructor; the
/// registry stores nodes with an empty child list.
#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[cfg_attr(feature = "codegen", ts(export, export_to = "../../../src/types/generated/"))]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: String,
    pub parent_id: Option<String>,
    pub timestamp: String,
    pub kind: NodeKind,
    pub summary: String,
    pub content: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_input: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_result: Option<ToolExecution>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skill_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command_name: Option<String>,
    pub children: Vec<Node>,
    #[serde(rename = "raw", serialize_with = "serialize_raw")]
    #[ts(type = "unknown")]
    pub record: Arc<LogRecord>,
}

fn serialize_raw<S: Serializer>(record: &Arc<LogRecord>, serializer: S) -> Result<S::Ok, S::Error> {
    record.raw.serialize(serializer)
}

impl Node {
    /// A childless node owned by `record`, with every optional field empty.
    pub fn new(
        id: impl Into<String>,
        kind: NodeKind,
        record: &Arc<LogRecord>,
        summary: impl Into<String>,
        content: serde_json::Value,
    ) -> Self {
        Self {
            id: id.into(),
            parent_id: record.parent_id.clone(),
            timestamp: record.timestamp.clone(),
            kind,
            summary: summary.into(),
            content,
            tool_name: None,
            tool_input: None,
            tool_result: None,
            agent_type: None,
            skill_name: None,
            command_name: None,
            children: Vec::new(),
            record: Arc::clone(record),
        }
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    /// Number of nodes in this subtree, including `self`.
    pub fn subtree_len(&self) -> usize {
        1 + self.children.iter().map(Node::subtree_len).sum::<usize>()
    }
}

/// One log available for watching, as returned by the listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[cfg_attr(feature = "codegen", ts(export, export_to = "../../../src/types/generated/"))]
#[serde(rename_all = "camelCase")]
pub struct LogSummary {
    /// File name without extension.
    pub id: String,
    /// Decoded from the containing directory name.
    pub project: String,
    pub path: String,
    #[ts(type = "number")]
    pub size_bytes: u64,
    /// Unix epoch seconds.
    #[ts(type = "number")]
    pub modified_at: i64,
    pub preview: Option<String>,
    pub started_at: Option<String>,
    pub cwd: Option<String>,
    pub git_branch: Option<String>,
    pub lines_scanned: usize,
}

/// Count every node in a forest.
pub fn count_nodes(tree: &[Node]) -> usize {
    tree.iter().map(Node::subtree_len).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record() -> Arc<LogRecord> {
        Arc::new(LogRecord {
            fingerprint: "r1".into(),
            uuid: Some("r1".into()),
            parent_id: Some("p0".into()),
            timestamp: "2026-01-01T00:00:00Z".into(),
            payload: RecordPayload::User {
                content: json!("hi"),
                tool_use_result: None,
            },
            raw: json!({"type": "user", "uuid": "r1"}),
        })
    }

    #[test]
    fn test_node_kind_families() {
        assert!(NodeKind::User.is_turn_starter());
        assert!(NodeKind::System.is_turn_starter());
        assert!(!NodeKind::Assistant.is_turn_starter());
        for kind in [NodeKind::ToolCall, NodeKind::Agent, NodeKind::Skill, NodeKind::Command] {
            assert!(kind.is_invocation());
        }
        assert!(!NodeKind::ToolResult.is_invocation());
    }

    #[test]
    fn test_node_inherits_record_fields() {
        let rec = record();
        let node = Node::new("r1", NodeKind::User, &rec, "hi", json!("hi"));
        assert_eq!(node.parent_id.as_deref(), Some("p0"));
        assert_eq!(node.timestamp, "2026-01-01T00:00:00Z");
        assert!(node.children.is_empty());
        assert_eq!(rec.id(), "r1");
    }

    #[test]
    fn test_node_serialization_shape() {
        let rec = record();
        let node = Node::new("r1", NodeKind::ToolCall, &rec, "Bash: ls", json!({}));
        let value = serde_json::to_value(&node).unwrap();
        assert_eq!(value["kind"], "tool_call");
        assert_eq!(value["parentId"], "p0");
        assert_eq!(value["raw"]["uuid"], "r1");
        assert!(value.get("toolName").is_none());
        assert!(value["children"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_count_nodes() {
        let rec = record();
        let mut root = Node::new("a", NodeKind::Assistant, &rec, "", json!(null));
        let mut call = Node::new("b", NodeKind::ToolCall, &rec, "", json!(null));
        call.children.push(Node::new("c", NodeKind::ToolResult, &rec, "", json!(null)));
        root.children.push(call);
        let tree = vec![Node::new("u", NodeKind::User, &rec, "", json!(null)), root];
        assert_eq!(count_nodes(&tree), 4);
    }
}
