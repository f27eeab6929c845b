/// Retention policy: whole-file eviction by age, total size and file count
///
/// Stages run in a fixed order, each over the files no earlier stage marked:
///
/// 1. Age: files in partitions older than `retention_days` are marked.
/// 2. Size: if the unmarked bytes exceed `max_total_bytes`, the oldest
///    unmarked files (by modification time) are marked until the unmarked
///    total is at most 80% of the limit.
/// 3. Count: if more than `max_file_count` files remain unmarked, the oldest
///    are marked until 80% of the limit remain.
///
/// Evicting down to 80% rather than to the limit keeps the next run from
/// triggering again immediately. Zero or negative limits are legal and evict
/// everything their stage covers.
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use time::Date;
use tracing::{debug, info, warn};

use super::error::Result;
use super::index::{SessionFile, StoreIndex};
use super::layout;
use super::FileResult;
use crate::humanize::ByteSize;

pub const DEFAULT_RETENTION_DAYS: i64 = 7;
pub const DEFAULT_MAX_TOTAL_BYTES: i64 = 50 * 1024 * 1024;
pub const DEFAULT_MAX_FILE_COUNT: i64 = 100;

/// Size and count stages evict down to this fraction of their limit
pub const HYSTERESIS_RATIO: f64 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub retention_days: i64,
    pub max_total_bytes: i64,
    pub max_file_count: i64,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            retention_days: DEFAULT_RETENTION_DAYS,
            max_total_bytes: DEFAULT_MAX_TOTAL_BYTES,
            max_file_count: DEFAULT_MAX_FILE_COUNT,
        }
    }
}

/// Why a file was selected for eviction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionReason {
    Age { retention_days: i64 },
    Size { max_total_bytes: i64 },
    Count { max_file_count: i64 },
}

impl fmt::Display for EvictionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            EvictionReason::Age { retention_days } => {
                write!(f, "older than {} days", retention_days)
            }
            EvictionReason::Size { max_total_bytes } if max_total_bytes >= 0 => {
                write!(f, "over size limit ({})", ByteSize(max_total_bytes as u64))
            }
            EvictionReason::Size { max_total_bytes } => {
                write!(f, "over size limit ({} bytes)", max_total_bytes)
            }
            EvictionReason::Count { max_file_count } => {
                write!(f, "over file limit ({})", max_file_count)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvictionCandidate {
    pub path: PathBuf,
    pub size: u64,
    pub reason: EvictionReason,
}

/// Result of one retention pass
#[derive(Debug, Clone, Default)]
pub struct RetentionReport {
    pub dry_run: bool,
    /// Files removed, or that would be removed on a dry run
    pub deleted_count: usize,
    /// Bytes reclaimed, or that would be reclaimed on a dry run
    pub freed_bytes: u64,
    /// Every file selected, in selection order
    pub candidates: Vec<EvictionCandidate>,
    /// Per-file outcome of the deletions; empty on a dry run
    pub results: Vec<FileResult>,
}

impl RetentionReport {
    pub fn skipped(&self) -> impl Iterator<Item = &FileResult> {
        self.results.iter().filter(|r| r.is_skipped())
    }
}

impl RetentionPolicy {
    pub fn new(retention_days: i64, max_total_bytes: i64, max_file_count: i64) -> Self {
        Self {
            retention_days,
            max_total_bytes,
            max_file_count,
        }
    }

    /// Select files to evict.
    ///
    /// `files` must be ordered oldest modification time first, as
    /// [`StoreIndex::files`] returns them.
    pub fn plan(&self, files: &[SessionFile], today: Date) -> Vec<EvictionCandidate> {
        let mut marked = vec![false; files.len()];
        let mut candidates = Vec::new();
        let mut mark = |i: usize, reason: EvictionReason, marked: &mut Vec<bool>| {
            marked[i] = true;
            candidates.push(EvictionCandidate {
                path: files[i].path.clone(),
                size: files[i].size,
                reason,
            });
        };

        // Age
        let cutoff = layout::cutoff(today, self.retention_days);
        for (i, file) in files.iter().enumerate() {
            if file.is_older_than(&cutoff) {
                mark(
                    i,
                    EvictionReason::Age {
                        retention_days: self.retention_days,
                    },
                    &mut marked,
                );
            }
        }

        // Size
        let mut remaining_bytes: u64 = files
            .iter()
            .zip(&marked)
            .filter(|(_, marked)| !**marked)
            .map(|(file, _)| file.size)
            .sum();
        if i128::from(remaining_bytes) > i128::from(self.max_total_bytes) {
            let target = self.max_total_bytes as f64 * HYSTERESIS_RATIO;
            for (i, file) in files.iter().enumerate() {
                if remaining_bytes as f64 <= target {
                    break;
                }
                if marked[i] {
                    continue;
                }
                mark(
                    i,
                    EvictionReason::Size {
                        max_total_bytes: self.max_total_bytes,
                    },
                    &mut marked,
                );
                remaining_bytes -= file.size;
            }
        }

        // Count
        let remaining_count = marked.iter().filter(|m| !**m).count();
        if i128::try_from(remaining_count).unwrap_or(i128::MAX) > i128::from(self.max_file_count) {
            let target = (self.max_file_count as f64 * HYSTERESIS_RATIO).max(0.0) as usize;
            let mut excess = remaining_count.saturating_sub(target);
            for i in 0..files.len() {
                if excess == 0 {
                    break;
                }
                if marked[i] {
                    continue;
                }
                mark(
                    i,
                    EvictionReason::Count {
                        max_file_count: self.max_file_count,
                    },
                    &mut marked,
                );
                excess -= 1;
            }
        }

        candidates
    }

    /// Run retention against the store at `root` using today's UTC date
    pub fn evaluate(&self, root: impl AsRef<Path>, dry_run: bool) -> Result<RetentionReport> {
        self.evaluate_on(root, layout::today(), dry_run)
    }

    /// Run retention as if today were `today`
    pub fn evaluate_on(
        &self,
        root: impl AsRef<Path>,
        today: Date,
        dry_run: bool,
    ) -> Result<RetentionReport> {
        let index = StoreIndex::scan(root)?;
        if index.is_empty() {
            return Ok(RetentionReport {
                dry_run,
                ..Default::default()
            });
        }

        let candidates = self.plan(index.files(), today);
        for candidate in &candidates {
            debug!(path = %candidate.path.display(), reason = %candidate.reason, "Selected for eviction");
        }

        let report = apply(index.root(), candidates, dry_run);
        info!(
            root = %index.root().display(),
            dry_run,
            deleted = report.deleted_count,
            freed_bytes = report.freed_bytes,
            skipped = report.skipped().count(),
            "Retention pass complete"
        );
        Ok(report)
    }
}

/// Retention with explicit thresholds
pub fn evaluate(
    root: impl AsRef<Path>,
    retention_days: i64,
    max_total_bytes: i64,
    max_file_count: i64,
    dry_run: bool,
) -> Result<RetentionReport> {
    RetentionPolicy::new(retention_days, max_total_bytes, max_file_count).evaluate(root, dry_run)
}

/// Delete candidates (unless `dry_run`) and prune emptied date partitions
pub(crate) fn apply(
    root: &Path,
    candidates: Vec<EvictionCandidate>,
    dry_run: bool,
) -> RetentionReport {
    if dry_run {
        return RetentionReport {
            dry_run,
            deleted_count: candidates.len(),
            freed_bytes: candidates.iter().map(|c| c.size).sum(),
            candidates,
            results: Vec::new(),
        };
    }

    let mut report = RetentionReport {
        dry_run,
        ..Default::default()
    };
    for candidate in &candidates {
        match fs::remove_file(&candidate.path) {
            Ok(()) => {
                report.deleted_count += 1;
                report.freed_bytes += candidate.size;
                report.results.push(FileResult::done(candidate.path.clone()));
            }
            Err(e) => {
                warn!(path = %candidate.path.display(), error = %e, "Could not delete log file");
                report
                    .results
                    .push(FileResult::skipped(candidate.path.clone(), e.to_string()));
            }
        }
    }
    report.candidates = candidates;

    remove_empty_partitions(root);
    report
}

fn remove_empty_partitions(root: &Path) {
    let Ok(entries) = fs::read_dir(root) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let is_partition = entry.file_type().map(|t| t.is_dir()).unwrap_or(false)
            && layout::looks_like_date(&entry.file_name().to_string_lossy());
        if !is_partition {
            continue;
        }
        let is_empty = fs::read_dir(&path)
            .map(|mut children| children.next().is_none())
            .unwrap_or(false);
        if is_empty {
            match fs::remove_dir(&path) {
                Ok(()) => debug!(dir = %path.display(), "Removed empty partition"),
                Err(e) => debug!(dir = %path.display(), error = %e, "Could not remove partition"),
            }
        }
    }
}
