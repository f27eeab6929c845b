/// Compaction: lossy rewrite of old session files
///
/// A record survives iff its event type is in [`PRESERVED_EVENTS`] or its
/// level is warn, error or fatal. Everything else, mostly debug hook and tool
/// traces, is dropped. Lines that do not parse as a JSON object are dropped
/// too.
///
/// Compaction only touches dated partitions older than the threshold, skips
/// files marked `_compacted`, never rewrites a file to zero records, and
/// leaves a file alone when there is nothing to drop. Re-running it is
/// therefore a no-op.
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use time::Date;
use tracing::{debug, info, warn};

use super::error::Result;
use super::index::{SessionFile, StoreIndex};
use super::layout;
use super::FileResult;
use crate::event::{Level, record_lines};

pub const DEFAULT_COMPACT_AFTER_DAYS: i64 = 3;

/// Event types kept regardless of level
pub const PRESERVED_EVENTS: [&str; 8] = [
    "decision.made",
    "escalation.raised",
    "handoff.initiated",
    "hook.session_start",
    "hook.session_end",
    "task.started",
    "task.completed",
    "context.compacted",
];

/// Whether a parsed line survives compaction.
///
/// Keys that are missing or not strings simply do not match, so an error
/// record with an odd `evt` is still kept for its level.
fn is_preserved(record: &Value) -> bool {
    let key = |name: &str| record.get(name).and_then(Value::as_str);
    key("evt").is_some_and(|evt| PRESERVED_EVENTS.contains(&evt))
        || key("lvl")
            .and_then(|lvl| lvl.parse::<Level>().ok())
            .is_some_and(|level| level.is_audit_critical())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactionPolicy {
    pub age_threshold_days: i64,
}

impl Default for CompactionPolicy {
    fn default() -> Self {
        Self {
            age_threshold_days: DEFAULT_COMPACT_AFTER_DAYS,
        }
    }
}

/// One file that was (or on a dry run would be) rewritten
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompactedFile {
    pub path: PathBuf,
    pub original_bytes: u64,
    pub compacted_bytes: u64,
    pub kept: usize,
    pub dropped: usize,
}

impl CompactedFile {
    pub fn saved_bytes(&self) -> u64 {
        self.original_bytes.saturating_sub(self.compacted_bytes)
    }
}

#[derive(Debug, Clone, Default)]
pub struct CompactionReport {
    pub dry_run: bool,
    pub compacted_count: usize,
    pub saved_bytes: u64,
    pub files: Vec<CompactedFile>,
    /// Eligible files left alone, with the reason
    pub skipped: Vec<FileResult>,
}

/// Rewrite computed for a single file
struct FilePlan {
    contents: String,
    summary: CompactedFile,
}

impl CompactionPolicy {
    pub fn new(age_threshold_days: i64) -> Self {
        Self { age_threshold_days }
    }

    /// Files old enough and not already marked compacted
    pub fn eligible<'a>(&self, files: &'a [SessionFile], today: Date) -> Vec<&'a SessionFile> {
        let cutoff = layout::cutoff(today, self.age_threshold_days);
        files
            .iter()
            .filter(|f| f.is_older_than(&cutoff) && !layout::is_compacted(&f.path))
            .collect()
    }

    pub fn compact(&self, root: impl AsRef<Path>, dry_run: bool) -> Result<CompactionReport> {
        self.compact_on(root, layout::today(), dry_run)
    }

    /// Compact as if today were `today`
    pub fn compact_on(
        &self,
        root: impl AsRef<Path>,
        today: Date,
        dry_run: bool,
    ) -> Result<CompactionReport> {
        let index = StoreIndex::scan(root)?;
        let mut report = CompactionReport {
            dry_run,
            ..Default::default()
        };

        for file in self.eligible(index.files(), today) {
            let plan = match plan_file(&file.path) {
                Ok(Some(plan)) => plan,
                Ok(None) => continue,
                Err(reason) => {
                    report.skipped.push(FileResult::skipped(file.path.clone(), reason));
                    continue;
                }
            };

            if !dry_run {
                if let Err(e) = rewrite(&file.path, &plan.contents) {
                    warn!(path = %file.path.display(), error = %e, "Could not rewrite log file");
                    report
                        .skipped
                        .push(FileResult::skipped(file.path.clone(), e.to_string()));
                    continue;
                }
            }

            debug!(
                path = %file.path.display(),
                kept = plan.summary.kept,
                dropped = plan.summary.dropped,
                dry_run,
                "Compacted session file"
            );
            report.compacted_count += 1;
            report.saved_bytes += plan.summary.saved_bytes();
            report.files.push(plan.summary);
        }

        info!(
            root = %index.root().display(),
            dry_run,
            compacted = report.compacted_count,
            saved_bytes = report.saved_bytes,
            skipped = report.skipped.len(),
            "Compaction pass complete"
        );
        Ok(report)
    }
}

/// Compaction with an explicit age threshold
pub fn compact(
    root: impl AsRef<Path>,
    age_threshold_days: i64,
    dry_run: bool,
) -> Result<CompactionReport> {
    CompactionPolicy::new(age_threshold_days).compact(root, dry_run)
}

/// Work out the compacted contents of one file.
///
/// `Ok(None)` means there is nothing to drop. `Err` carries the reason the
/// file is left untouched.
fn plan_file(path: &Path) -> std::result::Result<Option<FilePlan>, String> {
    let original = fs::read(path).map_err(|e| e.to_string())?;

    let mut kept_lines = Vec::new();
    let mut dropped = 0;
    for line in record_lines(&original) {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Dropping undecodable record");
                dropped += 1;
                continue;
            }
        };
        match serde_json::from_str::<Value>(line) {
            Ok(record) if record.is_object() && is_preserved(&record) => kept_lines.push(line),
            Ok(_) => dropped += 1,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Dropping malformed record");
                dropped += 1;
            }
        }
    }

    if kept_lines.is_empty() {
        return Err("no audit-critical records".to_string());
    }

    let mut contents = kept_lines.join("\n");
    contents.push('\n');
    if contents.as_bytes() == original.as_slice() {
        return Ok(None);
    }

    Ok(Some(FilePlan {
        summary: CompactedFile {
            path: path.to_path_buf(),
            original_bytes: original.len() as u64,
            compacted_bytes: contents.len() as u64,
            kept: kept_lines.len(),
            dropped,
        },
        contents,
    }))
}

/// Replace a file's contents via a sibling temp file and rename
fn rewrite(path: &Path, contents: &str) -> std::io::Result<()> {
    let temp = layout::rewrite_path(path);
    fs::write(&temp, contents)?;
    if let Err(e) = fs::rename(&temp, path) {
        let _ = fs::remove_file(&temp);
        return Err(e);
    }
    Ok(())
}
