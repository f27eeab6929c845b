//! Structured events for multi-agent sessions
//!
//! Every event is one JSON object per line in a session file:
//!
//! ```text
//! {"ts":"2026-01-05T10:00:00.000001Z","lvl":"info","cid":"corr_sess_..._001","aid":"orch:default","evt":"task.started","msg":"...","extra":1}
//! ```
//!
//! The required keys (`ts`, `lvl`, `cid`, `aid`, `evt`, `msg`) are the wire
//! contract shared by the writer, compaction and queries. Anything else is an
//! extension field owned by the event type.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use hublog::event::{EventDraft, EventWriter, Level};
//!
//! let mut writer = EventWriter::open_new("/tmp/logs", "spec:backend:auth01")?;
//! writer.task_started("Implementing auth")?;
//! writer.append(EventDraft::new(Level::Debug, "tool.call", "grep").field("pattern", "unwrap"))?;
//! writer.append(EventDraft::task_completed("Implementing auth").field("tests_passed", 42))?;
//! # Ok::<(), hublog::event::EventError>(())
//! ```

pub mod record;
pub mod session;
pub mod writer;

use thiserror::Error;

pub use record::{
    EventDraft, EventRecord, Level, MESSAGE_LIMIT, RESERVED_KEYS, Severity, TOOL_PAYLOAD_LIMIT,
    TRUNCATION_MARKER, record_lines,
};
pub use session::{format_correlation_id, generate_session_id};
pub use writer::EventWriter;

#[derive(Debug, Error)]
pub enum EventError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Extension field '{0}' collides with a required record key")]
    ReservedField(String),

    #[error("Invalid session id: {0:?}")]
    InvalidSessionId(String),

    #[error("Unknown level '{0}' (expected debug, info, warn, error or fatal)")]
    InvalidLevel(String),
}

pub type Result<T> = std::result::Result<T, EventError>;
