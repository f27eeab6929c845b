use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::Serialize;
use tracing::{debug, warn};

use super::error::{Result, StoreError};
use super::layout;

/// One session file found by a scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionFile {
    pub path: PathBuf,
    /// Name of the directory holding the file
    pub partition: String,
    pub size: u64,
    pub modified: SystemTime,
}

impl SessionFile {
    pub fn session_id(&self) -> Option<&str> {
        self.path.file_stem().and_then(|stem| stem.to_str())
    }

    /// Whether the holding directory looks like a date partition
    pub fn is_dated(&self) -> bool {
        layout::looks_like_date(&self.partition)
    }

    /// Dated and strictly before `cutoff`
    pub fn is_older_than(&self, cutoff: &str) -> bool {
        self.is_dated() && self.partition.as_str() < cutoff
    }
}

/// Aggregate store statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub file_count: usize,
    pub total_bytes: u64,
    pub oldest_date: Option<String>,
    pub newest_date: Option<String>,
    /// Sorted, de-duplicated date partitions holding at least one file
    pub dates: Vec<String>,
}

/// Snapshot of every session file in a store
///
/// Files are ordered oldest modification time first (ties broken by path),
/// which is the eviction order retention uses.
#[derive(Debug, Clone)]
pub struct StoreIndex {
    root: PathBuf,
    files: Vec<SessionFile>,
}

impl StoreIndex {
    /// Scan `{root}/*/*.jsonl`.
    ///
    /// A missing root is an empty store. A root that exists but is not a
    /// directory is an error. Files that vanish or cannot be inspected
    /// mid-scan are left out.
    pub fn scan(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        let entries = match fs::read_dir(&root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(root = %root.display(), "Store root does not exist yet");
                return Ok(Self {
                    root,
                    files: Vec::new(),
                });
            }
            Err(_) if root.exists() && !root.is_dir() => {
                return Err(StoreError::InvalidRoot(root));
            }
            Err(e) => return Err(e.into()),
        };

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                continue;
            }
            let partition = entry.file_name().to_string_lossy().into_owned();
            scan_partition(&entry.path(), &partition, &mut files);
        }

        files.sort_by(|a, b| a.modified.cmp(&b.modified).then_with(|| a.path.cmp(&b.path)));
        debug!(root = %root.display(), files = files.len(), "Scanned store");

        Ok(Self { root, files })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn files(&self) -> &[SessionFile] {
        &self.files
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn total_bytes(&self) -> u64 {
        self.files.iter().map(|f| f.size).sum()
    }

    pub fn stats(&self) -> StoreStats {
        let dates: Vec<String> = self
            .files
            .iter()
            .filter(|f| f.is_dated())
            .map(|f| f.partition.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        StoreStats {
            file_count: self.files.len(),
            total_bytes: self.total_bytes(),
            oldest_date: dates.first().cloned(),
            newest_date: dates.last().cloned(),
            dates,
        }
    }
}

fn scan_partition(dir: &Path, partition: &str, files: &mut Vec<SessionFile>) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "Skipping unreadable partition");
            return;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if !layout::is_session_file(&path) {
            continue;
        }
        match entry.metadata() {
            Ok(meta) if meta.is_file() => files.push(SessionFile {
                size: meta.len(),
                modified: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
                partition: partition.to_string(),
                path,
            }),
            Ok(_) => {}
            Err(e) => debug!(path = %path.display(), error = %e, "Skipping unreadable file"),
        }
    }
}

/// Statistics for the store at `root`; zeroed when it does not exist
pub fn stats(root: impl AsRef<Path>) -> Result<StoreStats> {
    Ok(StoreIndex::scan(root)?.stats())
}
