// crates/core/src/classifier.rs
//! Record classification and node expansion.
//!
//! [`classify_line`] turns one raw log line into a typed [`LogRecord`] (or
//! nothing), and [`expand_record`] turns a record into the zero or more
//! display [`Node`]s it owns.
//!
//! Producer lines look like:
//! ```json
//! {"type": "user", "uuid": "...", "parentUuid": "...", "timestamp": "...", "message": {"role": "user", "content": "..."}}
//! {"type": "assistant", "uuid": "...", "message": {"content": [{"type": "thinking", ...}, {"type": "tool_use", ...}]}}
//! {"type": "file-history-snapshot", "messageId": "...", "snapshot": {...}}
//! ```

use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use crate::boilerplate::{classify_user_content, Verdict, SUMMARY_CHARS};
use crate::tracker::fingerprint;
use crate::types::{
    ContentSegment, LogRecord, Node, NodeKind, RecordPayload, ToolExecution, ToolResultSegment,
};

/// Input keys tried, in order, when summarizing a tool invocation.
const SALIENT_INPUT_KEYS: &[&str] = &[
    "command",
    "skill",
    "file_path",
    "path",
    "pattern",
    "url",
    "query",
    "description",
];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope {
    #[serde(rename = "type")]
    kind: Option<String>,
    uuid: Option<String>,
    parent_uuid: Option<String>,
    timestamp: Option<String>,
    message: Option<MessageBody>,
    message_id: Option<String>,
    tool_use_result: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct MessageBody {
    #[serde(default)]
    content: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RawSegment {
    Text {
        #[serde(default)]
        text: String,
    },
    Thinking {
        #[serde(default)]
        thinking: String,
    },
    ToolUse {
        id: Option<String>,
        #[serde(default)]
        name: String,
        #[serde(default)]
        input: serde_json::Value,
    },
    ToolResult {
        tool_use_id: String,
        #[serde(default)]
        content: serde_json::Value,
        #[serde(default)]
        is_error: Option<bool>,
    },
    #[serde(other)]
    Other,
}

/// Classify one trimmed, non-empty line.
///
/// Returns `None` for anything that is not a complete JSON object (writes
/// still in flight), for unknown or missing discriminators, and for known
/// discriminators with an unexpected payload shape. None of these are
/// errors.
pub fn classify_line(line: &str) -> Option<LogRecord> {
    let line = line.trim();
    if !(line.starts_with('{') && line.ends_with('}')) {
        return None;
    }
    let raw: serde_json::Value = serde_json::from_str(line).ok()?;
    let envelope = match Envelope::deserialize(&raw) {
        Ok(e) => e,
        Err(e) => {
            debug!(error = %e, "dropping record with unexpected shape");
            return None;
        }
    };

    let payload = match envelope.kind.as_deref() {
        Some("user") => {
            let content = envelope.message?.content;
            if content.is_null() {
                return None;
            }
            RecordPayload::User {
                content,
                tool_use_result: envelope.tool_use_result,
            }
        }
        Some("assistant") => RecordPayload::Assistant {
            segments: parse_segments(&envelope.message?.content),
        },
        Some("file-history-snapshot") | Some("file-snapshot") => RecordPayload::FileSnapshot {
            message_id: envelope.message_id,
        },
        other => {
            debug!(kind = ?other, "dropping unrecognized record");
            return None;
        }
    };

    let fingerprint = fingerprint(envelope.uuid.as_deref(), &payload, line);
    Some(LogRecord {
        fingerprint,
        uuid: envelope.uuid,
        parent_id: envelope.parent_uuid,
        timestamp: envelope.timestamp.unwrap_or_default(),
        payload,
        raw,
    })
}

fn parse_segments(content: &serde_json::Value) -> Vec<ContentSegment> {
    let blocks = match content {
        serde_json::Value::String(s) if !s.trim().is_empty() => {
            return vec![ContentSegment::Text(s.clone())];
        }
        serde_json::Value::Array(blocks) => blocks,
        _ => return Vec::new(),
    };

    blocks
        .iter()
        .filter_map(|block| RawSegment::deserialize(block).ok())
        .filter_map(|segment| match segment {
            RawSegment::Text { text } if !text.trim().is_empty() => Some(ContentSegment::Text(text)),
            RawSegment::Thinking { thinking } if !thinking.trim().is_empty() => {
                Some(ContentSegment::Thinking(thinking))
            }
            RawSegment::ToolUse { id, name, input } => Some(ContentSegment::ToolUse { id, name, input }),
            RawSegment::ToolResult {
                tool_use_id,
                content,
                is_error,
            } => Some(ContentSegment::ToolResult(ToolResultSegment {
                tool_use_id,
                content,
                is_error: is_error.unwrap_or(false),
            })),
            _ => None,
        })
        .collect()
}

/// Tool-result blocks of a user body, if the body is a tool-result array.
fn user_tool_results(content: &serde_json::Value) -> Option<Vec<ToolResultSegment>> {
    let blocks = content.as_array()?;
    let has_tool_result = blocks
        .iter()
        .any(|b| b.get("type").and_then(|t| t.as_str()) == Some("tool_result"));
    if !has_tool_result {
        return None;
    }
    let results = parse_segments(content)
        .into_iter()
        .filter_map(|segment| match segment {
            ContentSegment::ToolResult(result) => Some(result),
            _ => None,
        })
        .collect();
    Some(results)
}

/// Expand a record into the nodes it owns.
///
/// File snapshots and suppressed boilerplate expand to nothing.
pub fn expand_record(record: &Arc<LogRecord>) -> Vec<Node> {
    match &record.payload {
        RecordPayload::FileSnapshot { .. } => Vec::new(),
        RecordPayload::User {
            content,
            tool_use_result,
        } => {
            if let Some(results) = user_tool_results(content) {
                return results
                    .iter()
                    .enumerate()
                    .map(|(i, result)| tool_result_node(record, i, result, tool_use_result.as_ref()))
                    .collect();
            }
            match classify_user_content(content) {
                Verdict::User { summary } => {
                    vec![Node::new(record.id(), NodeKind::User, record, summary, content.clone())]
                }
                Verdict::System { summary } => {
                    vec![Node::new(record.id(), NodeKind::System, record, summary, content.clone())]
                }
                Verdict::Suppress => Vec::new(),
            }
        }
        RecordPayload::Assistant { segments } => expand_assistant(record, segments),
    }
}

fn expand_assistant(record: &Arc<LogRecord>, segments: &[ContentSegment]) -> Vec<Node> {
    let plain_count = segments
        .iter()
        .filter(|s| matches!(s, ContentSegment::Text(_) | ContentSegment::Thinking(_)))
        .count();
    let plain_id = |kind: &str, index: usize| {
        if plain_count == 1 {
            record.id().to_string()
        } else {
            format!("{}:{kind}:{index}", record.id())
        }
    };

    segments
        .iter()
        .enumerate()
        .map(|(i, segment)| match segment {
            ContentSegment::Text(text) => Node::new(
                plain_id("text", i),
                NodeKind::Assistant,
                record,
                truncate_chars(text, SUMMARY_CHARS),
                serde_json::Value::String(text.clone()),
            ),
            ContentSegment::Thinking(thinking) => Node::new(
                plain_id("thinking", i),
                NodeKind::Thinking,
                record,
                truncate_chars(thinking, SUMMARY_CHARS),
                serde_json::Value::String(thinking.clone()),
            ),
            ContentSegment::ToolUse { id, name, input } => invocation_node(record, i, id, name, input),
            ContentSegment::ToolResult(result) => tool_result_node(record, i, result, None),
        })
        .collect()
}

fn invocation_node(
    record: &Arc<LogRecord>,
    index: usize,
    id: &Option<String>,
    name: &str,
    input: &serde_json::Value,
) -> Node {
    let node_id = id
        .clone()
        .unwrap_or_else(|| format!("{}:tool:{index}", record.id()));
    let input_str = |key: &str| input.get(key).and_then(|v| v.as_str()).map(String::from);

    let kind = match name {
        "Task" | "Agent" => NodeKind::Agent,
        "Skill" => NodeKind::Skill,
        "SlashCommand" => NodeKind::Command,
        _ => NodeKind::ToolCall,
    };

    let mut node = Node::new(
        node_id,
        kind,
        record,
        invocation_summary(name, input),
        input.clone(),
    );
    node.tool_name = Some(name.to_string());
    node.tool_input = Some(input.clone());
    match kind {
        NodeKind::Agent => node.agent_type = input_str("subagent_type"),
        NodeKind::Skill => node.skill_name = input_str("skill").or_else(|| input_str("command")),
        NodeKind::Command => node.command_name = input_str("command"),
        _ => {}
    }
    node
}

fn invocation_summary(name: &str, input: &serde_json::Value) -> String {
    let salient = SALIENT_INPUT_KEYS
        .iter()
        .find_map(|key| input.get(*key).and_then(|v| v.as_str()))
        .and_then(|v| v.lines().next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    match salient {
        Some(value) => truncate_chars(&format!("{name}: {value}"), SUMMARY_CHARS),
        None => name.to_string(),
    }
}

fn tool_result_node(
    record: &Arc<LogRecord>,
    index: usize,
    result: &ToolResultSegment,
    tool_use_result: Option<&serde_json::Value>,
) -> Node {
    let text = tool_result_text(&result.content);
    let summary = match text.lines().map(str::trim).find(|l| !l.is_empty()) {
        Some(line) => truncate_chars(line, SUMMARY_CHARS),
        None if result.is_error => "(error)".to_string(),
        None => "(no output)".to_string(),
    };
    let mut node = Node::new(
        format!("{}:result:{index}", record.id()),
        NodeKind::ToolResult,
        record,
        summary,
        result.content.clone(),
    )
    .with_parent(result.tool_use_id.clone());
    node.tool_result = execution(tool_use_result, result.is_error);
    node
}

fn tool_result_text(content: &serde_json::Value) -> String {
    match content {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Array(blocks) => blocks
            .iter()
            .filter_map(|b| b.get("text").and_then(|t| t.as_str()))
            .collect::<Vec<_>>()
            .join("\n"),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Standard-output / standard-error / exit-code triple for a tool result.
fn execution(tool_use_result: Option<&serde_json::Value>, is_error: bool) -> Option<ToolExecution> {
    let field = |key: &str| {
        tool_use_result
            .and_then(|r| r.get(key))
            .and_then(|v| v.as_str())
            .map(String::from)
    };
    let stdout = field("stdout");
    let stderr = field("stderr");
    let explicit_code = ["exitCode", "returnCode", "code"].iter().find_map(|key| {
        tool_use_result
            .and_then(|r| r.get(*key))
            .and_then(|v| v.as_i64())
            .and_then(|v| i32::try_from(v).ok())
    });
    let exit_code = explicit_code.or(if is_error {
        Some(1)
    } else if stdout.is_some() || stderr.is_some() {
        Some(0)
    } else {
        None
    });

    if stdout.is_none() && stderr.is_none() && exit_code.is_none() {
        return None;
    }
    Some(ToolExecution {
        stdout,
        stderr,
        exit_code,
    })
}

/// First `max` characters of `s`.
pub fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn expand_line(line: &str) -> Vec<Node> {
        let record = classify_line(line).expect("line classifies");
        expand_record(&Arc::new(record))
    }

    #[test]
    fn test_rejects_non_object_lines() {
        assert!(classify_line(r#"{"type":"use"#).is_none());
        assert!(classify_line("[1,2,3]").is_none());
        assert!(classify_line("plain text").is_none());
        assert!(classify_line(r#"{"type": "user", "message": }"#).is_none());
    }

    #[test]
    fn test_drops_unknown_and_missing_discriminator() {
        assert!(classify_line(r#"{"type":"summary","summary":"x","leafUuid":"a"}"#).is_none());
        assert!(classify_line(r#"{"type":"progress","data":{}}"#).is_none());
        assert!(classify_line(r#"{"uuid":"a","message":{"content":"hi"}}"#).is_none());
    }

    #[test]
    fn test_drops_unexpected_payload_shape() {
        // uuid must be a string
        assert!(classify_line(r#"{"type":"user","uuid":42,"message":{"content":"hi"}}"#).is_none());
        // user without a message body
        assert!(classify_line(r#"{"type":"user","uuid":"a","timestamp":"t"}"#).is_none());
    }

    #[test]
    fn test_classifies_user_record() {
        let record = classify_line(
            r#"{"type":"user","uuid":"u1","parentUuid":null,"timestamp":"2026-01-01T00:00:00Z","message":{"role":"user","content":"Fix the bug"}}"#,
        )
        .unwrap();
        assert_eq!(record.uuid.as_deref(), Some("u1"));
        assert_eq!(record.fingerprint, "u1");
        assert_eq!(record.parent_id, None);
        assert_eq!(record.timestamp, "2026-01-01T00:00:00Z");
        assert!(matches!(record.payload, RecordPayload::User { .. }));
        assert_eq!(record.raw["message"]["content"], "Fix the bug");
    }

    #[test]
    fn test_file_snapshot_acknowledged_but_no_nodes() {
        let line = r#"{"type":"file-history-snapshot","messageId":"m1","snapshot":{"trackedFileBackups":{}},"isSnapshotUpdate":false}"#;
        let record = classify_line(line).unwrap();
        assert_eq!(record.fingerprint, "snapshot-m1");
        assert!(expand_record(&Arc::new(record)).is_empty());

        let alias = classify_line(r#"{"type":"file-snapshot","messageId":"m2"}"#).unwrap();
        assert_eq!(alias.fingerprint, "snapshot-m2");
    }

    #[test]
    fn test_assistant_segments_expand_to_nodes() {
        let nodes = expand_line(
            r#"{"type":"assistant","uuid":"a1","parentUuid":"u1","timestamp":"2026-01-01T00:00:01Z","message":{"role":"assistant","content":[{"type":"thinking","thinking":"Let me look"},{"type":"tool_use","id":"abc","name":"Bash","input":{"command":"cargo test\n--all"}},{"type":"text","text":"Done."}]}}"#,
        );
        let summary: Vec<(&str, NodeKind, &str)> = nodes
            .iter()
            .map(|n| (n.id.as_str(), n.kind, n.summary.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("a1:thinking:0", NodeKind::Thinking, "Let me look"),
                ("abc", NodeKind::ToolCall, "Bash: cargo test"),
                ("a1:text:2", NodeKind::Assistant, "Done."),
            ]
        );
        assert!(nodes.iter().all(|n| n.parent_id.as_deref() == Some("u1")));
        assert_eq!(nodes[1].tool_name.as_deref(), Some("Bash"));
    }

    #[test]
    fn test_single_segment_uses_record_id() {
        let nodes = expand_line(
            r#"{"type":"assistant","uuid":"a1","timestamp":"t","message":{"content":[{"type":"text","text":"Hello"}]}}"#,
        );
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].id, "a1");

        let from_string = expand_line(
            r#"{"type":"assistant","uuid":"a2","timestamp":"t","message":{"content":"Plain string reply"}}"#,
        );
        assert_eq!(from_string[0].id, "a2");
        assert_eq!(from_string[0].kind, NodeKind::Assistant);
    }

    #[test]
    fn test_invocation_family_kinds() {
        let nodes = expand_line(
            r#"{"type":"assistant","uuid":"a1","timestamp":"t","message":{"content":[
                {"type":"tool_use","id":"t1","name":"Task","input":{"subagent_type":"Explore","description":"Find callers"}},
                {"type":"tool_use","id":"t2","name":"Skill","input":{"skill":"pdf"}},
                {"type":"tool_use","id":"t3","name":"SlashCommand","input":{"command":"/review"}},
                {"type":"tool_use","name":"Read","input":{"file_path":"/src/lib.rs"}}
            ]}}"#
            .replace('\n', "")
            .as_str(),
        );
        assert_eq!(nodes[0].kind, NodeKind::Agent);
        assert_eq!(nodes[0].agent_type.as_deref(), Some("Explore"));
        assert_eq!(nodes[0].summary, "Task: Find callers");
        assert_eq!(nodes[1].kind, NodeKind::Skill);
        assert_eq!(nodes[1].skill_name.as_deref(), Some("pdf"));
        assert_eq!(nodes[2].kind, NodeKind::Command);
        assert_eq!(nodes[2].command_name.as_deref(), Some("/review"));
        assert_eq!(nodes[3].kind, NodeKind::ToolCall);
        assert_eq!(nodes[3].id, "a1:tool:3");
        assert_eq!(nodes[3].summary, "Read: /src/lib.rs");
    }

    #[test]
    fn test_user_tool_result_links_to_invocation() {
        let nodes = expand_line(
            r#"{"type":"user","uuid":"u2","parentUuid":"a1","timestamp":"t","message":{"role":"user","content":[{"type":"tool_result","tool_use_id":"abc","content":"ok\nmore","is_error":false}]},"toolUseResult":{"stdout":"ok\nmore","stderr":"","interrupted":false}}"#,
        );
        assert_eq!(nodes.len(), 1);
        let result = &nodes[0];
        assert_eq!(result.kind, NodeKind::ToolResult);
        assert_eq!(result.id, "u2:result:0");
        assert_eq!(result.parent_id.as_deref(), Some("abc"));
        assert_eq!(result.summary, "ok");
        assert_eq!(
            result.tool_result,
            Some(ToolExecution {
                stdout: Some("ok\nmore".into()),
                stderr: Some(String::new()),
                exit_code: Some(0),
            })
        );
    }

    #[test]
    fn test_error_tool_result_exit_code() {
        let nodes = expand_line(
            r#"{"type":"user","uuid":"u3","timestamp":"t","message":{"content":[{"type":"tool_result","tool_use_id":"x","content":[{"type":"text","text":""}],"is_error":true}]},"toolUseResult":"Error: boom"}"#,
        );
        assert_eq!(nodes[0].summary, "(error)");
        assert_eq!(nodes[0].tool_result.as_ref().unwrap().exit_code, Some(1));
    }

    #[test]
    fn test_boilerplate_user_records() {
        assert!(expand_line(
            r#"{"type":"user","uuid":"u1","timestamp":"t","message":{"content":"<local-command-stdout></local-command-stdout>"}}"#
        )
        .is_empty());

        let system = expand_line(
            r#"{"type":"user","uuid":"u2","timestamp":"t","message":{"content":"<command-message>clear</command-message><command-name>/clear</command-name>"}}"#,
        );
        assert_eq!(system[0].kind, NodeKind::System);
        assert_eq!(system[0].summary, "Command: /clear");
    }

    #[test]
    fn test_record_without_uuid_uses_line_hash() {
        let line = r#"{"type":"user","timestamp":"t","message":{"content":"hi"}}"#;
        let a = classify_line(line).unwrap();
        let b = classify_line(line).unwrap();
        assert!(a.fingerprint.starts_with("line-"));
        assert_eq!(a.fingerprint, b.fingerprint);
        assert_eq!(a.id(), a.fingerprint);
    }

    #[test]
    fn test_truncate_chars_is_char_safe() {
        assert_eq!(truncate_chars("héllo wörld", 4), "héll");
        assert_eq!(truncate_chars("ab", 10), "ab");
    }
}
