//! Query engine over session files
//!
//! The engine locates session files, streams their records into a
//! [`RecordFilter`], and returns whatever the filter emits. The filter is an
//! injected capability: [`JqFilter`] shells out to `jq`, [`MatchFilter`]
//! evaluates simple field matches in-process.
//!
//! A missing file is not an error (there is simply nothing to match). A
//! filter that cannot run or fails is, and stays distinguishable from an
//! empty result.

mod filter;
mod jq;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;
use time::Date;
use tracing::debug;

use crate::event::record_lines;
use crate::event::session::validate_session_id;
use crate::store::{StoreError, StoreIndex, layout};

pub use filter::{MatchFilter, RecordFilter};
pub use jq::{DEFAULT_JQ_PROGRAM, JqFilter};

#[derive(Debug, Error)]
pub enum FilterError {
    #[error("'{program}' not found. Install it (brew install jq / apt install jq) or set filter.program")]
    ToolMissing { program: String },

    #[error("'{program}' failed: {stderr}")]
    Failed { program: String, stderr: String },

    #[error("Filter produced invalid JSON: {0}")]
    InvalidOutput(#[source] serde_json::Error),

    #[error("Could not encode records for the filter: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("I/O error talking to filter: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error("Could not read {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Invalid session id: {0:?}")]
    InvalidSession(String),
}

pub type Result<T> = std::result::Result<T, QueryError>;

/// Filter one session's records.
///
/// `date` selects the partition and defaults to today (UTC).
pub fn query_session(
    root: impl AsRef<Path>,
    filter: &dyn RecordFilter,
    session_id: &str,
    date: Option<Date>,
) -> Result<Vec<Value>> {
    validate_session_id(session_id).map_err(|_| QueryError::InvalidSession(session_id.to_string()))?;

    let date = date.unwrap_or_else(layout::today);
    let path = layout::session_path(root.as_ref(), date, session_id);
    query_file(&path, filter)
}

/// Filter the records of one file; empty if the file does not exist
pub fn query_file(path: &Path, filter: &dyn RecordFilter) -> Result<Vec<Value>> {
    let records = match read_records(path) {
        Ok(records) => records,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(QueryError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    Ok(filter.apply(records)?)
}

/// Filter every session file in a store.
///
/// `session_filter` keeps only files whose name contains it, ignoring case.
/// Returns `(path, matches)` for files with at least one match, by path.
pub fn query_store(
    root: impl AsRef<Path>,
    filter: &dyn RecordFilter,
    session_filter: Option<&str>,
) -> Result<Vec<(PathBuf, Vec<Value>)>> {
    let index = StoreIndex::scan(root)?;
    let needle = session_filter.map(str::to_lowercase);

    let mut paths: Vec<&Path> = index
        .files()
        .iter()
        .map(|f| f.path.as_path())
        .filter(|path| match &needle {
            Some(needle) => path
                .file_name()
                .is_some_and(|name| name.to_string_lossy().to_lowercase().contains(needle)),
            None => true,
        })
        .collect();
    paths.sort();

    let mut results = Vec::new();
    for path in paths {
        let matches = query_file(path, filter)?;
        if !matches.is_empty() {
            results.push((path.to_path_buf(), matches));
        }
    }
    Ok(results)
}

/// Parse a session file, skipping lines that are not JSON objects
pub fn read_records(path: &Path) -> io::Result<Vec<Value>> {
    let contents = fs::read(path)?;
    let mut records = Vec::new();
    for line in record_lines(&contents) {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Skipping undecodable line");
                continue;
            }
        };
        match serde_json::from_str::<Value>(line) {
            Ok(value) if value.is_object() => records.push(value),
            Ok(_) => debug!(path = %path.display(), "Skipping non-object line"),
            Err(e) => debug!(path = %path.display(), error = %e, "Skipping malformed line"),
        }
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventWriter, Level};
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_empty() {
        let temp = TempDir::new().unwrap();
        let filter = MatchFilter::default();
        let result = query_session(temp.path(), &filter, "nobody", None).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_missing_tool_is_distinct_error() {
        let temp = TempDir::new().unwrap();
        let mut writer = EventWriter::open(temp.path(), "s1", "orch:test").unwrap();
        writer.task_started("a").unwrap();

        let filter = JqFilter::with_program("hublog-test-no-such-binary", ".");
        let result = writer.query(&filter);
        assert!(matches!(
            result,
            Err(QueryError::Filter(FilterError::ToolMissing { .. }))
        ));
    }

    #[test]
    fn test_malformed_lines_skipped() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("s.jsonl");
        fs::write(
            &path,
            "{\"evt\":\"a\",\"lvl\":\"info\"}\ngarbage\n42\n\n{\"evt\":\"b\",\"lvl\":\"info\"}\n",
        )
        .unwrap();

        let records = read_records(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1]["evt"], "b");
    }

    #[test]
    fn test_invalid_utf8_line_skipped() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("s.jsonl");
        let mut contents = Vec::new();
        for i in 0..5 {
            contents.extend_from_slice(
                format!("{{\"evt\":\"hook.pre_tool\",\"lvl\":\"debug\",\"n\":{}}}\n", i).as_bytes(),
            );
        }
        contents.extend_from_slice(b"\xff\xfe\n");
        contents.extend_from_slice(b"{\"evt\":\"decision.made\",\"lvl\":\"info\"}\n");
        fs::write(&path, contents).unwrap();

        let all = query_file(&path, &MatchFilter::default()).unwrap();
        assert_eq!(all.len(), 6);
        assert_eq!(all[5]["evt"], "decision.made");
    }

    #[test]
    fn test_query_store_with_session_filter() {
        let temp = TempDir::new().unwrap();
        for session in ["sess_alpha", "sess_beta", "sess_gamma"] {
            let mut writer = EventWriter::open(temp.path(), session, "orch:test").unwrap();
            writer.log(Level::Warn, "tool.retry", session).unwrap();
            writer.log(Level::Debug, "hook.pre_tool", "noise").unwrap();
        }

        let filter = MatchFilter::builder().min_level(Level::Warn).build();

        let all = query_store(temp.path(), &filter, None).unwrap();
        assert_eq!(all.len(), 3);
        assert!(all.iter().all(|(_, matches)| matches.len() == 1));

        let beta = query_store(temp.path(), &filter, Some("BETA")).unwrap();
        assert_eq!(beta.len(), 1);
        assert_eq!(beta[0].1[0]["msg"], "sess_beta");
    }

    #[test]
    fn test_invalid_session_rejected() {
        let temp = TempDir::new().unwrap();
        let result = query_session(temp.path(), &MatchFilter::default(), "../x", None);
        assert!(matches!(result, Err(QueryError::InvalidSession(_))));
    }
}
