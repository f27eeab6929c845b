use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde_json::Value;
use time::Date;
use tracing::debug;

use super::record::{EventDraft, EventRecord, Level, Severity, truncate_message};
use super::session::{
    format_correlation_id, generate_session_id, last_sequence, validate_session_id,
};
use super::{EventError, Result};
use crate::query::{self, QueryError, RecordFilter};
use crate::store::layout;

/// Append-only writer bound to one session file
///
/// The file lives at `{root}/{YYYY-MM-DD}/{session_id}.jsonl`, dated by the
/// UTC day the writer was opened. Every append opens the file in append mode,
/// writes one complete line with a single `write_all`, and closes it again.
/// The typed helpers cover the well-known event types; to add extension
/// fields, build the matching [`EventDraft`] and pass it to [`append`](EventWriter::append).
/// No lock is taken: concurrent appenders to the same session rely on the
/// platform's atomic small appends.
#[derive(Debug)]
pub struct EventWriter {
    root: PathBuf,
    partition: Date,
    session_id: String,
    agent_id: String,
    path: PathBuf,
    sequence: u64,
    last_timestamp: Option<DateTime<Utc>>,
    started_at: DateTime<Utc>,
}

impl EventWriter {
    /// Bind a writer to `session_id` under `root`.
    ///
    /// If today's file for the session already exists, correlation ids
    /// continue after the highest sequence found in it.
    pub fn open(
        root: impl AsRef<Path>,
        session_id: impl Into<String>,
        agent_id: impl Into<String>,
    ) -> Result<Self> {
        let session_id = session_id.into();
        validate_session_id(&session_id)?;

        let root = root.as_ref().to_path_buf();
        let partition = layout::today();
        let path = layout::session_path(&root, partition, &session_id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let sequence = last_sequence(&path, &session_id)?;

        debug!(session_id = %session_id, path = %path.display(), sequence, "Opened event writer");

        Ok(Self {
            root,
            partition,
            session_id,
            agent_id: agent_id.into(),
            path,
            sequence,
            last_timestamp: None,
            started_at: Utc::now(),
        })
    }

    /// Bind a writer to a freshly generated session id
    pub fn open_new(root: impl AsRef<Path>, agent_id: impl Into<String>) -> Result<Self> {
        Self::open(root, generate_session_id(), agent_id)
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn partition(&self) -> Date {
        self.partition
    }

    /// Append one record and return its correlation id
    pub fn append(&mut self, draft: EventDraft) -> Result<String> {
        if let Some(key) = draft.reserved_field() {
            return Err(EventError::ReservedField(key.to_string()));
        }

        let correlation_id = match draft.correlation_id {
            Some(cid) => cid,
            None => self.next_correlation_id(),
        };

        let record = EventRecord {
            timestamp: self.next_timestamp(),
            level: draft.level,
            correlation_id: correlation_id.clone(),
            agent_id: self.agent_id.clone(),
            event_type: draft.event_type,
            message: truncate_message(&draft.message),
            fields: draft.fields,
        };

        let mut line = serde_json::to_vec(&record)?;
        line.push(b'\n');

        // Retention may have removed an emptied partition since open
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(&line)?;

        debug!(
            cid = %correlation_id,
            evt = %record.event_type,
            lvl = %record.level,
            "Appended event"
        );
        Ok(correlation_id)
    }

    pub fn log(
        &mut self,
        level: Level,
        event_type: &str,
        message: impl Into<String>,
    ) -> Result<String> {
        self.append(EventDraft::new(level, event_type, message))
    }

    pub fn task_started(&mut self, description: &str) -> Result<String> {
        self.append(EventDraft::task_started(description))
    }

    pub fn task_completed(&mut self, description: &str) -> Result<String> {
        self.append(EventDraft::task_completed(description))
    }

    pub fn decision_made(
        &mut self,
        decision: &str,
        rationale: Option<&str>,
        alternatives: &[&str],
        thinking_budget: Option<u64>,
    ) -> Result<String> {
        self.append(EventDraft::decision_made(
            decision,
            rationale,
            alternatives,
            thinking_budget,
        ))
    }

    pub fn agent_spawned(
        &mut self,
        child_agent_id: &str,
        task: Option<&str>,
        thinking_trigger: Option<&str>,
    ) -> Result<String> {
        self.append(EventDraft::agent_spawned(child_agent_id, task, thinking_trigger))
    }

    pub fn handoff(
        &mut self,
        target_agent_id: &str,
        critical_decisions: &[&str],
        open_questions: &[&str],
        files_to_review: &[&str],
        summary_tokens: Option<u64>,
    ) -> Result<String> {
        self.append(EventDraft::handoff(
            target_agent_id,
            critical_decisions,
            open_questions,
            files_to_review,
            summary_tokens,
        ))
    }

    pub fn escalation(
        &mut self,
        reason: &str,
        severity: Severity,
        context: Option<&str>,
    ) -> Result<String> {
        self.append(EventDraft::escalation(reason, severity, context))
    }

    pub fn pre_tool(&mut self, tool_name: &str, tool_input: &str) -> Result<String> {
        self.append(EventDraft::pre_tool(tool_name, tool_input))
    }

    pub fn post_tool(
        &mut self,
        tool_name: &str,
        tool_result: &str,
        duration_ms: Option<u64>,
    ) -> Result<String> {
        self.append(EventDraft::post_tool(tool_name, tool_result, duration_ms))
    }

    pub fn context_compacted(
        &mut self,
        tokens_before: u64,
        tokens_after: u64,
        preserved_decisions: &[&str],
    ) -> Result<String> {
        self.append(EventDraft::context_compacted(
            tokens_before,
            tokens_after,
            preserved_decisions,
        ))
    }

    /// Record the start of the session and reset its duration clock
    pub fn session_started(&mut self) -> Result<String> {
        self.started_at = Utc::now();
        self.append(EventDraft::session_started(&self.session_id))
    }

    /// Record the end of the session, at error level when `error` is given
    pub fn session_ended(&mut self, error: Option<&str>) -> Result<String> {
        self.append(EventDraft::session_ended(
            &self.session_id,
            error,
            self.elapsed_ms(),
        ))
    }

    /// Milliseconds since the writer was opened or the session last started
    pub fn elapsed_ms(&self) -> i64 {
        (Utc::now() - self.started_at).num_milliseconds().max(0)
    }

    /// Filter this session's records
    pub fn query(&self, filter: &dyn RecordFilter) -> std::result::Result<Vec<Value>, QueryError> {
        query::query_session(&self.root, filter, &self.session_id, Some(self.partition))
    }

    fn next_correlation_id(&mut self) -> String {
        self.sequence += 1;
        format_correlation_id(&self.session_id, self.sequence)
    }

    /// Wall-clock time, never earlier than the previous record's
    fn next_timestamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let timestamp = match self.last_timestamp {
            Some(last) if last > now => last,
            _ => now,
        };
        self.last_timestamp = Some(timestamp);
        timestamp
    }
}
