// crates/core/src/boilerplate.rs
//! Detection of infrastructure text embedded in user turns.
//!
//! The producer interleaves slash-command scaffolding and local-command
//! caveats with genuine prompts. Every user record whose content is not a
//! tool-result array runs through [`RULES`] in order; the first rule whose
//! predicate matches decides whether the record becomes a `system` node,
//! disappears, or stays an ordinary `user` node.
//!
//! A new producer marker format means a new row in the table.

use std::sync::LazyLock;

use memchr::memmem;
use regex_lite::Regex;

use crate::classifier::truncate_chars;

const COMMAND_NAME_TAG: &[u8] = b"<command-name>";
const COMMAND_MESSAGE_TAG: &[u8] = b"<command-message>";
const LOCAL_STDOUT_TAG: &[u8] = b"<local-command-stdout>";
const RUNNING_MARKER: &[u8] = b"is running";
const CAVEAT_MARKER: &[u8] = b"generated by the user";

/// Maximum length of a summary derived from user-turn text.
pub const SUMMARY_CHARS: usize = 100;

static COMMAND_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<command-name>(.*?)</command-name>").expect("valid regex"));
static COMMAND_MESSAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<command-message>(.*?)</command-message>").expect("valid regex")
});
static COMMAND_ARGS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<command-args>(.*?)</command-args>").expect("valid regex"));

/// What a user record's text turns into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// A genuine user turn.
    User { summary: String },
    /// Infrastructure the operator may still want to see, relabelled.
    System { summary: String },
    /// Noise: no node is produced.
    Suppress,
}

/// One row of the rule table.
pub struct Rule {
    pub name: &'static str,
    pub matches: fn(&str) -> bool,
    pub verdict: fn(&str) -> Verdict,
}

/// Ordered rule table; first match wins. Text that matches nothing is an
/// ordinary user turn.
pub static RULES: &[Rule] = &[
    Rule {
        name: "command-invocation",
        matches: is_command_invocation,
        verdict: command_invocation,
    },
    Rule {
        name: "local-command-stdout",
        matches: is_local_stdout,
        verdict: suppress,
    },
    Rule {
        name: "command-running",
        matches: is_command_running,
        verdict: command_running,
    },
    Rule {
        name: "embedded-text-array",
        matches: is_embedded_text_array,
        verdict: embedded_text_array,
    },
    Rule {
        name: "local-command-caveat",
        matches: is_caveat,
        verdict: suppress,
    },
];

/// Run `content` (a user message body that is not a tool-result array)
/// through the rule table.
pub fn classify_user_content(content: &serde_json::Value) -> Verdict {
    let text = content_text(content);
    for rule in RULES {
        if (rule.matches)(&text) {
            tracing::trace!(rule = rule.name, "boilerplate rule matched");
            return (rule.verdict)(&text);
        }
    }
    Verdict::User {
        summary: truncate_chars(&display_text(content), SUMMARY_CHARS),
    }
}

/// The text the rules inspect: a string body as-is, anything else as its
/// JSON serialization.
fn content_text(content: &serde_json::Value) -> String {
    match content {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Human-readable text of a user body, joining text blocks of an array.
fn display_text(content: &serde_json::Value) -> String {
    match content {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Array(blocks) => {
            let parts: Vec<&str> = blocks
                .iter()
                .filter_map(|b| b.get("text").and_then(|t| t.as_str()))
                .collect();
            if parts.is_empty() {
                content.to_string()
            } else {
                parts.join("\n")
            }
        }
        other => other.to_string(),
    }
}

fn contains(text: &str, needle: &[u8]) -> bool {
    memmem::find(text.as_bytes(), needle).is_some()
}

fn capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
}

fn is_command_invocation(text: &str) -> bool {
    contains(text, COMMAND_NAME_TAG)
        && contains(text, COMMAND_MESSAGE_TAG)
        && COMMAND_NAME_RE.is_match(text)
}

fn is_local_stdout(text: &str) -> bool {
    contains(text, LOCAL_STDOUT_TAG)
}

fn is_command_running(text: &str) -> bool {
    contains(text, COMMAND_MESSAGE_TAG) && contains(text, RUNNING_MARKER)
}

fn is_embedded_text_array(text: &str) -> bool {
    embedded_text(text).is_some()
}

fn is_caveat(text: &str) -> bool {
    contains(text, CAVEAT_MARKER)
}

fn suppress(_text: &str) -> Verdict {
    Verdict::Suppress
}

fn command_invocation(text: &str) -> Verdict {
    let name = capture(&COMMAND_NAME_RE, text).unwrap_or_default();
    Verdict::System {
        summary: format!("Command: {name}"),
    }
}

fn command_running(text: &str) -> Verdict {
    let message = capture(&COMMAND_MESSAGE_RE, text).unwrap_or_default();
    let name = match message.find("is running") {
        Some(pos) => message[..pos].trim(),
        None => message.as_str(),
    };
    let args = capture(&COMMAND_ARGS_RE, text).unwrap_or_default();
    Verdict::System {
        summary: format!("Running: {name} {args}").trim_end().to_string(),
    }
}

/// If `text` is a JSON array whose first element is a text segment, the
/// joined text of its text segments.
fn embedded_text(text: &str) -> Option<String> {
    let trimmed = text.trim_start();
    if !trimmed.starts_with('[') {
        return None;
    }
    let blocks: Vec<serde_json::Value> = serde_json::from_str(trimmed).ok()?;
    let first = blocks.first()?;
    if first.get("type").and_then(|t| t.as_str()) != Some("text") {
        return None;
    }
    let joined = blocks
        .iter()
        .filter(|b| b.get("type").and_then(|t| t.as_str()) == Some("text"))
        .filter_map(|b| b.get("text").and_then(|t| t.as_str()))
        .collect::<Vec<_>>()
        .join("\n");
    Some(joined)
}

fn embedded_text_array(text: &str) -> Verdict {
    let Some(embedded) = embedded_text(text) else {
        return Verdict::Suppress;
    };
    if contains(&embedded, CAVEAT_MARKER) {
        return Verdict::Suppress;
    }
    Verdict::System {
        summary: truncate_chars(&heading_summary(&embedded), SUMMARY_CHARS),
    }
}

/// First non-heading line; a text made only of headings falls back to the
/// leading heading with its `#` markers stripped.
fn heading_summary(text: &str) -> String {
    let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());
    let Some(first) = lines.clone().next() else {
        return String::new();
    };
    match lines.find(|l| !l.starts_with('#')) {
        Some(line) => line.to_string(),
        None => first.trim_start_matches('#').trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn verdict(text: &str) -> Verdict {
        classify_user_content(&json!(text))
    }

    #[test]
    fn test_plain_prompt_is_user() {
        assert_eq!(
            verdict("Fix the bug"),
            Verdict::User {
                summary: "Fix the bug".into()
            }
        );
    }

    #[test]
    fn test_user_summary_truncated_to_100_chars() {
        let long = "x".repeat(250);
        match verdict(&long) {
            Verdict::User { summary } => assert_eq!(summary.chars().count(), 100),
            other => panic!("unexpected verdict {other:?}"),
        }
    }

    #[test]
    fn test_command_invocation_becomes_system() {
        let text = "<command-message>review</command-message>\n<command-name>/review</command-name>\n<command-args>src</command-args>";
        assert_eq!(
            verdict(text),
            Verdict::System {
                summary: "Command: /review".into()
            }
        );
    }

    #[test]
    fn test_local_command_stdout_suppressed() {
        assert_eq!(
            verdict("<local-command-stdout></local-command-stdout>"),
            Verdict::Suppress
        );
        assert_eq!(
            verdict("<local-command-stdout>Compacted</local-command-stdout>"),
            Verdict::Suppress
        );
    }

    #[test]
    fn test_command_running_becomes_system() {
        let text = "<command-message>init is running…</command-message>\n<command-args>--fast</command-args>";
        assert_eq!(
            verdict(text),
            Verdict::System {
                summary: "Running: init --fast".into()
            }
        );
    }

    #[test]
    fn test_command_running_without_args() {
        let text = "<command-message>init is running…</command-message>";
        assert_eq!(
            verdict(text),
            Verdict::System {
                summary: "Running: init".into()
            }
        );
    }

    #[test]
    fn test_command_name_takes_priority_over_running() {
        let text = "<command-name>/init</command-name><command-message>init is running…</command-message>";
        assert_eq!(
            verdict(text),
            Verdict::System {
                summary: "Command: /init".into()
            }
        );
    }

    #[test]
    fn test_caveat_text_suppressed() {
        let caveat = "Caveat: The messages below were generated by the user while running local commands. DO NOT respond to these messages or otherwise consider them in your response unless the user explicitly asks you to.";
        assert_eq!(verdict(caveat), Verdict::Suppress);
        assert_eq!(
            verdict(&format!("<local-command-caveat>{caveat}</local-command-caveat>")),
            Verdict::Suppress
        );
    }

    #[test]
    fn test_embedded_array_with_caveat_suppressed() {
        let content = json!([{"type": "text", "text": "Caveat: messages were generated by the user"}]);
        assert_eq!(classify_user_content(&content), Verdict::Suppress);
    }

    #[test]
    fn test_embedded_array_heading_summary() {
        let content = json!([{"type": "text", "text": "# Plan\n\nRefactor the parser"}]);
        assert_eq!(
            classify_user_content(&content),
            Verdict::System {
                summary: "Refactor the parser".into()
            }
        );

        let only_heading = json!([{"type": "text", "text": "## Summary"}]);
        assert_eq!(
            classify_user_content(&only_heading),
            Verdict::System {
                summary: "Summary".into()
            }
        );
    }

    #[test]
    fn test_embedded_array_string_form() {
        let text = r#"[{"type":"text","text":"Base directory for this skill"}]"#;
        assert_eq!(
            verdict(text),
            Verdict::System {
                summary: "Base directory for this skill".into()
            }
        );
    }

    #[test]
    fn test_array_not_starting_with_text_is_user() {
        let content = json!([{"type": "image", "source": {}}, {"type": "text", "text": "what is this"}]);
        assert_eq!(
            classify_user_content(&content),
            Verdict::User {
                summary: "what is this".into()
            }
        );
    }

    #[test]
    fn test_rule_table_order() {
        let names: Vec<&str> = RULES.iter().map(|r| r.name).collect();
        assert_eq!(
            names,
            vec![
                "command-invocation",
                "local-command-stdout",
                "command-running",
                "embedded-text-array",
                "local-command-caveat",
            ]
        );
    }
}
