//! Session and correlation identifiers

use std::fs;
use std::io;
use std::path::Path;

use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use super::record::record_lines;
use super::{EventError, Result};

/// New session id: `sess_{YYYYmmdd_HHMMSS}_{8 hex}`
pub fn generate_session_id() -> String {
    let random = Uuid::new_v4().simple().to_string();
    format!(
        "sess_{}_{}",
        Utc::now().format("%Y%m%d_%H%M%S"),
        &random[..8]
    )
}

/// Session ids become file names, so they must be a single path component
pub fn validate_session_id(session_id: &str) -> Result<()> {
    let invalid = session_id.is_empty()
        || session_id == "."
        || session_id == ".."
        || session_id.contains(['/', '\\', '\0']);
    if invalid {
        return Err(EventError::InvalidSessionId(session_id.to_string()));
    }
    Ok(())
}

/// `corr_{session}_{seq:03}`; sequences past 999 simply grow wider
pub fn format_correlation_id(session_id: &str, sequence: u64) -> String {
    format!("corr_{}_{:03}", session_id, sequence)
}

/// Sequence number of an id generated for `session_id`, if it is one
pub fn parse_sequence(session_id: &str, correlation_id: &str) -> Option<u64> {
    correlation_id
        .strip_prefix("corr_")?
        .strip_prefix(session_id)?
        .strip_prefix('_')?
        .parse()
        .ok()
}

#[derive(Deserialize)]
struct CorrelationOnly {
    #[serde(default)]
    cid: String,
}

/// Highest generated sequence already present in a session file (0 if none)
pub fn last_sequence(path: &Path, session_id: &str) -> io::Result<u64> {
    let contents = match fs::read(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };

    Ok(record_lines(&contents)
        .filter_map(|line| serde_json::from_str::<CorrelationOnly>(line.ok()?).ok())
        .filter_map(|entry| parse_sequence(session_id, &entry.cid))
        .max()
        .unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_generated_session_id_shape() {
        let id = generate_session_id();
        let parts: Vec<&str> = id.split('_').collect();
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[0], "sess");
        assert_eq!(parts[1].len(), 8);
        assert_eq!(parts[2].len(), 6);
        assert_eq!(parts[3].len(), 8);
        assert!(parts[3].chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(id, generate_session_id());
    }

    #[test]
    fn test_correlation_id_padding() {
        assert_eq!(format_correlation_id("s1", 1), "corr_s1_001");
        assert_eq!(format_correlation_id("s1", 42), "corr_s1_042");
        assert_eq!(format_correlation_id("s1", 1000), "corr_s1_1000");
    }

    #[test]
    fn test_parse_sequence() {
        assert_eq!(parse_sequence("sess_a_b", "corr_sess_a_b_007"), Some(7));
        assert_eq!(parse_sequence("sess_a_b", "corr_sess_a_b_1234"), Some(1234));
        assert_eq!(parse_sequence("sess_a_b", "corr_other_007"), None);
        assert_eq!(parse_sequence("sess_a_b", "handoff-42"), None);
    }

    #[test]
    fn test_validate_session_id() {
        assert!(validate_session_id("sess_20260101_000000_abcd1234").is_ok());
        assert!(validate_session_id("").is_err());
        assert!(validate_session_id("..").is_err());
        assert!(validate_session_id("a/b").is_err());
    }

    #[test]
    fn test_last_sequence() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("s1.jsonl");

        assert_eq!(last_sequence(&path, "s1").unwrap(), 0);

        fs::write(
            &path,
            concat!(
                "{\"cid\":\"corr_s1_001\"}\n",
                "{\"cid\":\"corr_s1_009\"}\n",
                "not json\n",
                "{\"cid\":\"shared-handoff\"}\n",
                "{\"cid\":\"corr_s1_003\"}\n",
            ),
        )
        .unwrap();

        assert_eq!(last_sequence(&path, "s1").unwrap(), 9);
    }

    #[test]
    fn test_last_sequence_past_invalid_utf8() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("s1.jsonl");
        fs::write(
            &path,
            b"{\"cid\":\"corr_s1_004\"}\n\xff\xfe\n{\"cid\":\"corr_s1_005\"}\n",
        )
        .unwrap();

        assert_eq!(last_sequence(&path, "s1").unwrap(), 5);
    }
}
