//! Retention scenarios against a real store on disk
//!
//! Sizes are produced with `File::set_len` (sparse files), eviction order with
//! `File::set_modified`.

use hublog::store::{
    EvictionReason, HYSTERESIS_RATIO, RetentionPolicy, StoreIndex, layout, retention,
};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tempfile::TempDir;
use time::Date;

const MB: u64 = 1024 * 1024;

fn days_ago(today: Date, days: i64) -> String {
    layout::format_date(today - time::Duration::days(days))
}

/// Create `{root}/{partition}/{name}` of `size` bytes, modified `order` seconds after a fixed base
fn session_file(root: &Path, partition: &str, name: &str, size: u64, order: u64) -> PathBuf {
    let dir = root.join(partition);
    fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    let file = File::create(&path).unwrap();
    file.set_len(size).unwrap();
    let base = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
    file.set_modified(base + Duration::from_secs(order)).unwrap();
    path
}

/// Path -> contents of every file under `root`
fn snapshot(root: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    let mut files = BTreeMap::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in fs::read_dir(&dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                stack.push(path);
            } else {
                files.insert(path.clone(), fs::read(&path).unwrap());
            }
        }
    }
    files
}

#[test]
fn test_age_only_eviction() {
    let temp = TempDir::new().unwrap();
    let today = layout::today();
    let old = days_ago(today, 8);
    let recent = days_ago(today, 1);

    // 10 files, 4MB each (40MB total); 3 are eight days old
    for i in 0..3 {
        session_file(temp.path(), &old, &format!("old_{}.jsonl", i), 4 * MB, i);
    }
    for i in 0..7 {
        session_file(temp.path(), &recent, &format!("new_{}.jsonl", i), 4 * MB, 10 + i);
    }

    let report = RetentionPolicy::new(7, 50 * MB as i64, 100)
        .evaluate_on(temp.path(), today, false)
        .unwrap();

    assert_eq!(report.deleted_count, 3);
    assert_eq!(report.freed_bytes, 12 * MB);
    assert!(
        report
            .candidates
            .iter()
            .all(|c| matches!(c.reason, EvictionReason::Age { retention_days: 7 }))
    );

    let index = StoreIndex::scan(temp.path()).unwrap();
    assert_eq!(index.files().len(), 7);
    assert!(!temp.path().join(&old).exists());
}

#[test]
fn test_size_hysteresis() {
    let temp = TempDir::new().unwrap();
    let today = layout::today();
    let partition = days_ago(today, 0);
    let limit = 50 * MB;

    // 10 x 10MB = 100MB, all recent
    let mut paths = Vec::new();
    for i in 0..10 {
        paths.push(session_file(
            temp.path(),
            &partition,
            &format!("s{:02}.jsonl", i),
            10 * MB,
            i,
        ));
    }

    let report = RetentionPolicy::new(7, limit as i64, 100)
        .evaluate_on(temp.path(), today, false)
        .unwrap();

    let remaining = StoreIndex::scan(temp.path()).unwrap();
    assert!(remaining.total_bytes() as f64 <= limit as f64 * HYSTERESIS_RATIO);
    assert_eq!(remaining.total_bytes(), 40 * MB);

    // Oldest modification first
    assert_eq!(report.deleted_count, 6);
    for path in &paths[..6] {
        assert!(!path.exists());
    }
    for path in &paths[6..] {
        assert!(path.exists());
    }

    let deleted: u64 = report.candidates.iter().map(|c| c.size).sum();
    assert_eq!(report.freed_bytes, deleted);
}

#[test]
fn test_count_hysteresis() {
    let temp = TempDir::new().unwrap();
    let today = layout::today();
    let partition = days_ago(today, 0);

    for i in 0..12 {
        session_file(temp.path(), &partition, &format!("s{:02}.jsonl", i), 10, i);
    }

    let report = RetentionPolicy::new(7, 50 * MB as i64, 10)
        .evaluate_on(temp.path(), today, false)
        .unwrap();

    // 12 files over a limit of 10: evict down to 8
    assert_eq!(report.deleted_count, 4);
    assert_eq!(StoreIndex::scan(temp.path()).unwrap().files().len(), 8);
}

#[test]
fn test_dry_run_changes_nothing() {
    let temp = TempDir::new().unwrap();
    let today = layout::today();
    let old = days_ago(today, 30);
    let recent = days_ago(today, 0);

    for i in 0..4 {
        let path = session_file(temp.path(), &old, &format!("old_{}.jsonl", i), 0, i);
        fs::write(&path, format!("{{\"evt\":\"task.started\",\"n\":{}}}\n", i)).unwrap();
    }
    for i in 0..20 {
        session_file(temp.path(), &recent, &format!("new_{:02}.jsonl", i), 3 * 1024, 10 + i);
    }

    let before = snapshot(temp.path());
    let policy = RetentionPolicy::new(7, 50 * 1024, 10);

    let dry = policy.evaluate_on(temp.path(), today, true).unwrap();
    assert!(dry.dry_run);
    assert!(dry.deleted_count > 0);
    assert!(dry.results.is_empty());
    assert_eq!(snapshot(temp.path()), before);

    // A real run selects exactly what the dry run reported
    let real = policy.evaluate_on(temp.path(), today, false).unwrap();
    assert_eq!(real.candidates, dry.candidates);
    assert_eq!(real.freed_bytes, dry.freed_bytes);
}

#[test]
fn test_eviction_is_idempotent() {
    let temp = TempDir::new().unwrap();
    let today = layout::today();
    let partition = days_ago(today, 0);

    for i in 0..10 {
        session_file(temp.path(), &partition, &format!("s{:02}.jsonl", i), 10 * MB, i);
    }

    let first = retention::evaluate(temp.path(), 7, 50 * MB as i64, 100, false).unwrap();
    assert!(first.deleted_count > 0);

    let second = retention::evaluate(temp.path(), 7, 50 * MB as i64, 100, false).unwrap();
    assert_eq!(second.deleted_count, 0);
    assert_eq!(second.freed_bytes, 0);
}

#[test]
fn test_missing_store_is_empty() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("never-created");

    let report = RetentionPolicy::default().evaluate(&root, false).unwrap();
    assert_eq!(report.deleted_count, 0);
    assert!(report.candidates.is_empty());
    assert!(!root.exists());
}
