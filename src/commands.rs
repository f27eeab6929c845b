use std::collections::HashSet;
use std::error::Error;
use std::path::Path;

use hublog::LogHub;
use hublog::config::{Config, Scope};
use hublog::event::EventDraft;
use hublog::humanize::ByteSize;
use hublog::query::JqFilter;
use hublog::store::{
    CompactionPolicy, CompactionReport, FileOutcome, FileResult, RetentionPolicy, RetentionReport,
    StoreStats, layout,
};
use serde_json::{Map, Value};
use tracing::debug;

use crate::cli::{CleanupArgs, LogArgs, QueryArgs};

pub type CommandResult = Result<(), Box<dyn Error + Send + Sync>>;

/// Candidates listed by a dry run before the rest are summarised
const DRY_RUN_LISTING: usize = 10;

pub fn cleanup(config: &Config, args: CleanupArgs) -> CommandResult {
    let hub = LogHub::from_config(config, args.scope.map(Scope::from))?;

    if args.status {
        print_stats(&hub.stats()?);
        return Ok(());
    }

    if args.compact {
        let days = args
            .compact_days
            .unwrap_or(hub.compaction().age_threshold_days);
        let report = hub
            .with_compaction(CompactionPolicy::new(days))
            .compact(args.dry_run)?;
        print_compaction(&report);
        return Ok(());
    }

    let defaults = *hub.retention();
    let policy = RetentionPolicy::new(
        args.retention.unwrap_or(defaults.retention_days),
        args.max_size
            .map(|mb| ByteSize::from_megabytes(mb).as_i64())
            .unwrap_or(defaults.max_total_bytes),
        args.max_files.unwrap_or(defaults.max_file_count),
    );
    let report = hub.with_retention(policy).cleanup(args.dry_run)?;
    print_retention(&report);
    Ok(())
}

fn print_stats(stats: &StoreStats) {
    let size = ByteSize(stats.total_bytes);
    println!("Log Statistics:");
    println!("  Files: {}", stats.file_count);
    println!("  Size: {:.2}MB ({:.1}KB)", size.as_megabytes(), size.as_kilobytes());
    println!("  Oldest: {}", stats.oldest_date.as_deref().unwrap_or("N/A"));
    println!("  Newest: {}", stats.newest_date.as_deref().unwrap_or("N/A"));
    if !stats.dates.is_empty() {
        println!("  Dates: {} days of logs", stats.dates.len());
    }
}

fn print_retention(report: &RetentionReport) {
    let action = if report.dry_run { "Would delete" } else { "Deleted" };
    println!(
        "{} {} files, freed {:.1}KB",
        action,
        report.deleted_count,
        ByteSize(report.freed_bytes).as_kilobytes()
    );

    if report.dry_run && !report.candidates.is_empty() {
        println!("\nFiles to delete:");
        for candidate in report.candidates.iter().take(DRY_RUN_LISTING) {
            println!("  {} ({})", candidate.path.display(), candidate.reason);
        }
        if report.candidates.len() > DRY_RUN_LISTING {
            println!("  ... and {} more", report.candidates.len() - DRY_RUN_LISTING);
        }
    }

    print_skipped(report.skipped());
}

fn print_compaction(report: &CompactionReport) {
    let action = if report.dry_run { "Would compact" } else { "Compacted" };
    println!(
        "{} {} files, saved {:.1}KB",
        action,
        report.compacted_count,
        ByteSize(report.saved_bytes).as_kilobytes()
    );
    print_skipped(&report.skipped);
}

fn print_skipped<'a>(results: impl IntoIterator<Item = &'a FileResult>) {
    for result in results {
        if let FileOutcome::Skipped { reason } = &result.outcome {
            eprintln!("  skipped: {} ({})", result.path.display(), reason);
        }
    }
}

pub fn query(config: &Config, args: QueryArgs) -> CommandResult {
    // An empty store never runs the filter, so check the tool up front
    JqFilter::with_program(&config.filter.program, &args.filter).ensure_available()?;

    let scopes: &[Scope] = if args.global_only {
        &[Scope::Global]
    } else if args.project_only {
        &[Scope::Project]
    } else {
        &[Scope::Global, Scope::Project]
    };

    let mut seen = HashSet::new();
    let mut hubs = Vec::new();
    for &scope in scopes {
        match LogHub::from_config(config, Some(scope)) {
            Ok(hub) => {
                if seen.insert(hub.root().to_path_buf()) {
                    hubs.push(hub);
                }
            }
            // Searching both: a missing project store is not an error
            Err(e) if scopes.len() > 1 => debug!(scope = %scope, error = %e, "Skipping store"),
            Err(e) => return Err(e.into()),
        }
    }

    if let Some(date) = &args.date {
        let date = layout::parse_date(date)
            .ok_or_else(|| format!("invalid date '{}', expected YYYY-MM-DD", date))?;
        let session = args.session.as_deref().unwrap_or_default();
        for hub in &hubs {
            let records = hub.query(&args.filter, session, Some(date))?;
            if !records.is_empty() {
                print_matches(&layout::session_path(hub.root(), date, session), &records)?;
            }
        }
        return Ok(());
    }

    let mut files = 0;
    for hub in &hubs {
        files += hub.stats()?.file_count;
        for (path, records) in hub.query_all(&args.filter, args.session.as_deref())? {
            print_matches(&path, &records)?;
        }
    }
    if files == 0 {
        eprintln!("no log files found");
    }
    Ok(())
}

fn print_matches(path: &Path, records: &[Value]) -> CommandResult {
    eprintln!("# {}", path.display());
    for record in records {
        println!("{}", serde_json::to_string(record)?);
    }
    Ok(())
}

pub fn log(config: &Config, args: LogArgs) -> CommandResult {
    let mut hub = LogHub::from_config(config, args.scope.map(Scope::from))?;
    if let Some(agent) = args.agent {
        hub = hub.with_agent_id(agent);
    }

    let mut writer = hub.writer(args.session)?;

    let fields: Map<String, Value> = args.fields.into_iter().collect();
    let mut draft = EventDraft::new(args.level, args.event, args.message).fields(fields);
    if let Some(cid) = args.cid {
        draft = draft.correlation_id(cid);
    }

    let cid = writer.append(draft)?;
    debug!(path = %writer.path().display(), "Event appended");
    println!("{}", cid);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hublog::query::FilterError;
    use tempfile::TempDir;

    #[test]
    fn test_query_reports_missing_tool_on_empty_store() {
        let temp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.store.global_root = Some(temp.path().join("logs"));
        config.filter.program = "hublog-test-no-such-binary".to_string();

        let args = QueryArgs {
            filter: ".".to_string(),
            session: None,
            global_only: true,
            project_only: false,
            date: None,
        };

        let err = query(&config, args).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<FilterError>(),
            Some(FilterError::ToolMissing { .. })
        ));
    }
}
