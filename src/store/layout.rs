/// Path layout for the date-partitioned store
///
/// - partition directory: `{root}/{YYYY-MM-DD}` (UTC date the session began)
/// - session file: `{partition}/{session_id}.jsonl`
/// - compacted archive: any session file whose stem ends in `_compacted`
///
/// Partition names are compared as strings. For `YYYY-MM-DD` that ordering
/// is the chronological one, so cutoffs are plain string comparisons.
use std::path::{Path, PathBuf};

use time::format_description::FormatItem;
use time::macros::format_description;
use time::{Date, Duration, OffsetDateTime};

pub const SESSION_EXTENSION: &str = "jsonl";
pub const COMPACTED_SUFFIX: &str = "_compacted";

const DATE_FORMAT: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");

/// Day offsets are clamped to this span before date arithmetic
const MAX_SPAN_DAYS: i64 = 3_650_000;

/// Sorts before every partition name: nothing is older than it
const EARLIEST_CUTOFF: &str = "";
/// Sorts after every partition name: everything is older than it
const LATEST_CUTOFF: &str = "9999-99-99";

/// Current UTC calendar date
pub fn today() -> Date {
    OffsetDateTime::now_utc().date()
}

/// Format a date as a partition name: `YYYY-MM-DD`
pub fn format_date(date: Date) -> String {
    date.format(DATE_FORMAT).unwrap_or_else(|_| {
        format!(
            "{:04}-{:02}-{:02}",
            date.year(),
            u8::from(date.month()),
            date.day()
        )
    })
}

/// Parse a partition name back into a date
pub fn parse_date(name: &str) -> Option<Date> {
    Date::parse(name, DATE_FORMAT).ok()
}

/// Prefix check for partition names, not full validation
pub fn looks_like_date(name: &str) -> bool {
    let bytes = name.as_bytes();
    bytes.len() >= 10 && bytes[..4].iter().all(u8::is_ascii_digit) && bytes[4] == b'-'
}

/// Partition name that is `days` before `today`.
///
/// A partition is "older than `days`" iff its name sorts strictly below the
/// returned string. Negative `days` move the cutoff into the future.
pub fn cutoff(today: Date, days: i64) -> String {
    let days = days.clamp(-MAX_SPAN_DAYS, MAX_SPAN_DAYS);
    match today.checked_sub(Duration::days(days)) {
        Some(date) => format_date(date),
        None if days > 0 => EARLIEST_CUTOFF.to_string(),
        None => LATEST_CUTOFF.to_string(),
    }
}

pub fn partition_dir(root: &Path, date: Date) -> PathBuf {
    root.join(format_date(date))
}

pub fn session_file_name(session_id: &str) -> String {
    format!("{}.{}", session_id, SESSION_EXTENSION)
}

pub fn session_path(root: &Path, date: Date, session_id: &str) -> PathBuf {
    partition_dir(root, date).join(session_file_name(session_id))
}

pub fn is_session_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == SESSION_EXTENSION)
}

pub fn is_compacted(path: &Path) -> bool {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .is_some_and(|stem| stem.ends_with(COMPACTED_SUFFIX))
}

/// Sibling path used while rewriting a session file
pub fn rewrite_path(path: &Path) -> PathBuf {
    path.with_extension(format!("{}.tmp", SESSION_EXTENSION))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn test_format_and_parse_date() {
        assert_eq!(format_date(date!(2026 - 01 - 05)), "2026-01-05");
        assert_eq!(parse_date("2026-01-05"), Some(date!(2026 - 01 - 05)));
        assert_eq!(parse_date("archive"), None);
    }

    #[test]
    fn test_looks_like_date() {
        assert!(looks_like_date("2026-01-05"));
        assert!(looks_like_date("2026-13-99"));
        assert!(!looks_like_date("archive"));
        assert!(!looks_like_date("2026"));
        assert!(!looks_like_date("20260105xx"));
    }

    #[test]
    fn test_cutoff() {
        let today = date!(2026 - 03 - 02);
        assert_eq!(cutoff(today, 7), "2026-02-23");
        assert_eq!(cutoff(today, 0), "2026-03-02");
        assert_eq!(cutoff(today, -1), "2026-03-03");
    }

    #[test]
    fn test_cutoff_extremes() {
        let today = date!(2026 - 03 - 02);
        let far_past = cutoff(today, i64::MAX);
        assert!(far_past.as_str() <= "2000-01-01");

        let far_future = cutoff(today, i64::MIN);
        assert!(far_future.as_str() > "2999-12-31");
    }

    #[test]
    fn test_session_paths() {
        let root = Path::new("/logs");
        let path = session_path(root, date!(2026 - 01 - 05), "sess_a");
        assert_eq!(path, PathBuf::from("/logs/2026-01-05/sess_a.jsonl"));
        assert!(is_session_file(&path));
        assert!(!is_compacted(&path));
        assert!(is_compacted(Path::new("/logs/2026-01-05/sess_a_compacted.jsonl")));
        assert!(!is_session_file(&rewrite_path(&path)));
        assert_eq!(
            rewrite_path(&path),
            PathBuf::from("/logs/2026-01-05/sess_a.jsonl.tmp")
        );
    }
}
