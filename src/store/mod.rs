/// Date-partitioned session store and its maintenance policies
///
/// A store is a directory tree:
///
/// ```text
/// {root}/
///   2026-01-04/
///     sess_20260104_091500_1a2b3c4d.jsonl
///   2026-01-05/
///     sess_20260105_120000_9f8e7d6c.jsonl
/// ```
///
/// The global store and each project store share this layout and policy.
///
/// ## Maintenance
///
/// - [`index`] scans the tree and reports aggregate statistics.
/// - [`retention`] deletes whole session files by age, total size and count.
/// - [`compaction`] rewrites old session files down to audit-critical records.
///
/// Both maintenance passes run synchronously when called and tolerate
/// per-file failures: a file that cannot be removed or rewritten is reported
/// as skipped and the batch carries on.

use std::path::PathBuf;

pub mod compaction;
pub mod error;
pub mod index;
pub mod layout;
pub mod retention;

pub use compaction::{
    CompactedFile, CompactionPolicy, CompactionReport, DEFAULT_COMPACT_AFTER_DAYS,
    PRESERVED_EVENTS,
};
pub use error::{Result, StoreError};
pub use index::{SessionFile, StoreIndex, StoreStats};
pub use retention::{
    DEFAULT_MAX_FILE_COUNT, DEFAULT_MAX_TOTAL_BYTES, DEFAULT_RETENTION_DAYS, EvictionCandidate,
    EvictionReason, HYSTERESIS_RATIO, RetentionPolicy, RetentionReport,
};

/// What happened to one file during a maintenance pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    Done,
    Skipped { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileResult {
    pub path: PathBuf,
    pub outcome: FileOutcome,
}

impl FileResult {
    pub fn done(path: PathBuf) -> Self {
        Self {
            path,
            outcome: FileOutcome::Done,
        }
    }

    pub fn skipped(path: PathBuf, reason: impl Into<String>) -> Self {
        Self {
            path,
            outcome: FileOutcome::Skipped {
                reason: reason.into(),
            },
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.outcome, FileOutcome::Skipped { .. })
    }
}
