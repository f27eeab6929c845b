use std::fmt;
use std::str::{self, FromStr, Utf8Error};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::EventError;

/// Maximum stored message length, in characters, marker included
pub const MESSAGE_LIMIT: usize = 100;
pub const TRUNCATION_MARKER: &str = "...";

/// Keys every record carries; extension fields may not reuse them
pub const RESERVED_KEYS: [&str; 6] = ["ts", "lvl", "cid", "aid", "evt", "msg"];

/// Tool inputs and results are clipped to this many characters
pub const TOOL_PAYLOAD_LIMIT: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
            Level::Fatal => "fatal",
        }
    }

    /// Levels that always survive compaction
    pub fn is_audit_critical(&self) -> bool {
        matches!(self, Level::Warn | Level::Error | Level::Fatal)
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = EventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(Level::Debug),
            "info" => Ok(Level::Info),
            "warn" | "warning" => Ok(Level::Warn),
            "error" => Ok(Level::Error),
            "fatal" => Ok(Level::Fatal),
            _ => Err(EventError::InvalidLevel(s.to_string())),
        }
    }
}

/// Escalation severity; `security` escalations are logged at error level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Blocked,
    Uncertain,
    Security,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Blocked => "blocked",
            Severity::Uncertain => "uncertain",
            Severity::Security => "security",
        }
    }

    pub fn level(&self) -> Level {
        match self {
            Severity::Security => Level::Error,
            Severity::Blocked | Severity::Uncertain => Level::Warn,
        }
    }
}

/// One persisted line of a session file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    #[serde(rename = "ts")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "lvl")]
    pub level: Level,
    #[serde(rename = "cid")]
    pub correlation_id: String,
    #[serde(rename = "aid")]
    pub agent_id: String,
    #[serde(rename = "evt")]
    pub event_type: String,
    #[serde(rename = "msg")]
    pub message: String,
    /// Event-type specific extension fields
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// Caller-side description of an event before the writer stamps it
#[derive(Debug, Clone)]
pub struct EventDraft {
    pub level: Level,
    pub event_type: String,
    pub message: String,
    pub correlation_id: Option<String>,
    pub fields: Map<String, Value>,
}

impl EventDraft {
    pub fn new(level: Level, event_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            event_type: event_type.into(),
            message: message.into(),
            correlation_id: None,
            fields: Map::new(),
        }
    }

    /// Reuse an existing correlation id instead of allocating a new one
    pub fn correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    pub fn field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn fields(mut self, fields: Map<String, Value>) -> Self {
        self.fields.extend(fields);
        self
    }

    fn optional_field(self, key: &str, value: Option<impl Into<Value>>) -> Self {
        match value {
            Some(value) => self.field(key, value),
            None => self,
        }
    }

    fn list_field(self, key: &str, items: &[&str]) -> Self {
        if items.is_empty() {
            self
        } else {
            self.field(key, items.to_vec())
        }
    }

    /// First extension key that shadows a required key, if any
    pub fn reserved_field(&self) -> Option<&str> {
        self.fields
            .keys()
            .map(String::as_str)
            .find(|key| RESERVED_KEYS.contains(key))
    }
}

/// Drafts for the well-known event types.
///
/// Each returns a plain [`EventDraft`], so callers can chain further
/// extension fields with [`EventDraft::field`] before appending.
impl EventDraft {
    pub fn task_started(description: &str) -> Self {
        Self::new(Level::Info, "task.started", description)
    }

    pub fn task_completed(description: &str) -> Self {
        Self::new(Level::Info, "task.completed", description)
    }

    pub fn decision_made(
        decision: &str,
        rationale: Option<&str>,
        alternatives: &[&str],
        thinking_budget: Option<u64>,
    ) -> Self {
        Self::new(Level::Info, "decision.made", decision)
            .optional_field("rationale", rationale)
            .list_field("alternatives", alternatives)
            .optional_field("thinking_budget", thinking_budget)
    }

    pub fn agent_spawned(
        child_agent_id: &str,
        task: Option<&str>,
        thinking_trigger: Option<&str>,
    ) -> Self {
        Self::new(
            Level::Info,
            "agent.spawned",
            format!("Spawned {}", child_agent_id),
        )
        .field("child_aid", child_agent_id)
        .optional_field("task", task)
        .optional_field("thinking_trigger", thinking_trigger)
    }

    pub fn handoff(
        target_agent_id: &str,
        critical_decisions: &[&str],
        open_questions: &[&str],
        files_to_review: &[&str],
        summary_tokens: Option<u64>,
    ) -> Self {
        Self::new(
            Level::Info,
            "handoff.initiated",
            format!("Handoff to {}", target_agent_id),
        )
        .field("target_aid", target_agent_id)
        .list_field("critical_decisions", critical_decisions)
        .list_field("open_questions", open_questions)
        .list_field("files_to_review", files_to_review)
        .optional_field("summary_tokens", summary_tokens)
    }

    pub fn escalation(reason: &str, severity: Severity, context: Option<&str>) -> Self {
        Self::new(severity.level(), "escalation.raised", reason)
            .field("severity", severity.as_str())
            .optional_field("context", context)
    }

    pub fn pre_tool(tool_name: &str, tool_input: &str) -> Self {
        Self::new(Level::Debug, "hook.pre_tool", format!("Executing {}", tool_name))
            .field("tool_name", tool_name)
            .field("tool_input", clip(tool_input, TOOL_PAYLOAD_LIMIT))
    }

    pub fn post_tool(tool_name: &str, tool_result: &str, duration_ms: Option<u64>) -> Self {
        Self::new(Level::Debug, "hook.post_tool", format!("Completed {}", tool_name))
            .field("tool_name", tool_name)
            .field("tool_result", clip(tool_result, TOOL_PAYLOAD_LIMIT))
            .optional_field("duration_ms", duration_ms)
    }

    pub fn context_compacted(
        tokens_before: u64,
        tokens_after: u64,
        preserved_decisions: &[&str],
    ) -> Self {
        Self::new(
            Level::Info,
            "context.compacted",
            format!("Compacted context: {} → {}", tokens_before, tokens_after),
        )
        .field("tokens_before", tokens_before)
        .field("tokens_after", tokens_after)
        .field("tokens_saved", tokens_before.saturating_sub(tokens_after))
        .field("preserved_decisions", preserved_decisions.to_vec())
    }

    pub fn session_started(session_id: &str) -> Self {
        Self::new(
            Level::Info,
            "hook.session_start",
            format!("Session {} started", session_id),
        )
    }

    /// Error level, with an `error` field, when `error` is given
    pub fn session_ended(session_id: &str, error: Option<&str>, duration_ms: i64) -> Self {
        let draft = match error {
            Some(error) => Self::new(
                Level::Error,
                "hook.session_end",
                format!("Session ended with error: {}", error),
            )
            .field("error", error),
            None => Self::new(
                Level::Info,
                "hook.session_end",
                format!("Session {} ended", session_id),
            ),
        };
        draft.field("duration_ms", duration_ms)
    }
}

/// Non-blank lines of a session file, trimmed.
///
/// Lines are decoded one at a time, so a line that is not UTF-8 surfaces as
/// its own `Err` and does not hide the lines around it.
pub fn record_lines(contents: &[u8]) -> impl Iterator<Item = Result<&str, Utf8Error>> {
    contents
        .split(|byte| *byte == b'\n')
        .map(<[u8]>::trim_ascii)
        .filter(|line| !line.is_empty())
        .map(str::from_utf8)
}

/// Bound a message to [`MESSAGE_LIMIT`] characters.
///
/// Longer messages keep their first 97 characters followed by the marker.
pub fn truncate_message(message: &str) -> String {
    if message.chars().count() <= MESSAGE_LIMIT {
        return message.to_string();
    }
    let keep = MESSAGE_LIMIT - TRUNCATION_MARKER.chars().count();
    let mut truncated: String = message.chars().take(keep).collect();
    truncated.push_str(TRUNCATION_MARKER);
    truncated
}

/// Hard cut at `limit` characters, no marker
pub fn clip(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_short_message_verbatim() {
        assert_eq!(truncate_message("hello"), "hello");

        let exact = "x".repeat(MESSAGE_LIMIT);
        assert_eq!(truncate_message(&exact), exact);
    }

    #[test]
    fn test_long_message_truncated() {
        let long = "a".repeat(250);
        let stored = truncate_message(&long);
        assert_eq!(stored.chars().count(), MESSAGE_LIMIT);
        assert!(stored.ends_with(TRUNCATION_MARKER));
        assert_eq!(&stored[..97], &long[..97]);
    }

    #[test]
    fn test_truncation_counts_characters() {
        let long = "é".repeat(101);
        let stored = truncate_message(&long);
        assert_eq!(stored.chars().count(), MESSAGE_LIMIT);
        assert_eq!(stored.chars().filter(|c| *c == 'é').count(), 97);
    }

    #[test]
    fn test_level_parse_and_order() {
        assert_eq!("WARN".parse::<Level>().unwrap(), Level::Warn);
        assert_eq!("warning".parse::<Level>().unwrap(), Level::Warn);
        assert!("trace".parse::<Level>().is_err());
        assert!(Level::Debug < Level::Info);
        assert!(Level::Error < Level::Fatal);
        assert!(Level::Warn.is_audit_critical());
        assert!(!Level::Info.is_audit_critical());
    }

    #[test]
    fn test_record_wire_keys() {
        let record = EventRecord {
            timestamp: "2026-01-05T10:00:00Z".parse().unwrap(),
            level: Level::Info,
            correlation_id: "corr_s1_001".to_string(),
            agent_id: "orch:default".to_string(),
            event_type: "decision.made".to_string(),
            message: "Using JWT".to_string(),
            fields: json!({"rationale": "stateless"}).as_object().unwrap().clone(),
        };

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["lvl"], "info");
        assert_eq!(value["cid"], "corr_s1_001");
        assert_eq!(value["aid"], "orch:default");
        assert_eq!(value["evt"], "decision.made");
        assert_eq!(value["msg"], "Using JWT");
        assert_eq!(value["rationale"], "stateless");
        assert!(value["ts"].as_str().unwrap().starts_with("2026-01-05T10:00:00"));

        let parsed: EventRecord = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn test_record_lines_isolate_bad_bytes() {
        let contents = b"{\"evt\":\"a\"}\r\n\xff\xfe\n\n  \n{\"evt\":\"b\"}";
        let lines: Vec<_> = record_lines(contents).collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], Ok("{\"evt\":\"a\"}"));
        assert!(lines[1].is_err());
        assert_eq!(lines[2], Ok("{\"evt\":\"b\"}"));
    }

    #[test]
    fn test_typed_drafts_take_optional_fields() {
        let draft = EventDraft::decision_made("Use JWT", None, &[], Some(8000));
        assert_eq!(draft.fields["thinking_budget"], 8000);
        assert!(!draft.fields.contains_key("rationale"));
        assert!(!draft.fields.contains_key("alternatives"));

        let draft = EventDraft::agent_spawned("spec:frontend", Some("ui"), Some("think hard"));
        assert_eq!(draft.message, "Spawned spec:frontend");
        assert_eq!(draft.fields["thinking_trigger"], "think hard");

        let draft = EventDraft::handoff("spec:qa", &[], &["retries?"], &[], Some(1200));
        assert_eq!(draft.fields["summary_tokens"], 1200);
        assert!(!draft.fields.contains_key("critical_decisions"));

        let draft = EventDraft::escalation("Leaked key", Severity::Security, Some("src/env.rs"));
        assert_eq!(draft.level, Level::Error);
        assert_eq!(draft.fields["context"], "src/env.rs");
        assert_eq!(EventDraft::escalation("Stuck", Severity::Blocked, None).level, Level::Warn);
    }

    #[test]
    fn test_reserved_field_detection() {
        let draft = EventDraft::new(Level::Info, "task.started", "go").field("msg", "shadow");
        assert_eq!(draft.reserved_field(), Some("msg"));

        let draft = EventDraft::new(Level::Info, "task.started", "go").field("task", "auth");
        assert_eq!(draft.reserved_field(), None);
    }
}
