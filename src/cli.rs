use clap::{Args, Parser, Subcommand, ValueEnum};
use hublog::config::Scope;
use hublog::event::Level;
use serde_json::Value;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "hublog")]
#[command(about = "Structured session logs for cooperating agents", long_about = None)]
pub struct Cli {
    /// Configuration file (default: $HUBLOG_CONFIG or config/hublog.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Enforce retention, compact old sessions, or show store statistics
    Cleanup(CleanupArgs),
    /// Search session logs with a jq expression
    Query(QueryArgs),
    /// Append one event to a session
    Log(LogArgs),
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum ScopeArg {
    Global,
    Project,
}

impl From<ScopeArg> for Scope {
    fn from(arg: ScopeArg) -> Self {
        match arg {
            ScopeArg::Global => Scope::Global,
            ScopeArg::Project => Scope::Project,
        }
    }
}

#[derive(Args, Debug)]
pub struct CleanupArgs {
    /// Show log statistics
    #[arg(long)]
    pub status: bool,

    /// Preview without deleting or rewriting
    #[arg(long)]
    pub dry_run: bool,

    /// Compact old logs instead of deleting
    #[arg(long)]
    pub compact: bool,

    /// Days to retain (default: retention.retention_days)
    #[arg(long, allow_negative_numbers = true)]
    pub retention: Option<i64>,

    /// Max total size in MB (default: retention.max_total_bytes)
    #[arg(long, allow_negative_numbers = true)]
    pub max_size: Option<f64>,

    /// Max number of files (default: retention.max_file_count)
    #[arg(long, allow_negative_numbers = true)]
    pub max_files: Option<i64>,

    /// Compact logs older than N days (default: retention.compact_after_days)
    #[arg(long, allow_negative_numbers = true)]
    pub compact_days: Option<i64>,

    /// Store to operate on (default: project if inside one, else global)
    #[arg(long, value_enum)]
    pub scope: Option<ScopeArg>,
}

#[derive(Args, Debug)]
pub struct QueryArgs {
    /// jq expression
    pub filter: String,

    /// Only files whose name contains this (case-insensitive)
    pub session: Option<String>,

    /// Search only the global store
    #[arg(long = "global", conflicts_with = "project_only")]
    pub global_only: bool,

    /// Search only the project store
    #[arg(long = "project")]
    pub project_only: bool,

    /// Query exactly SESSION in this date partition (YYYY-MM-DD)
    #[arg(long, requires = "session")]
    pub date: Option<String>,
}

#[derive(Args, Debug)]
pub struct LogArgs {
    /// Event type, e.g. decision.made
    #[arg(long)]
    pub event: String,

    #[arg(long)]
    pub message: String,

    #[arg(long, default_value = "info")]
    pub level: Level,

    /// Existing session id (default: start a new session)
    #[arg(long)]
    pub session: Option<String>,

    /// Agent id (default: writer.agent_id)
    #[arg(long)]
    pub agent: Option<String>,

    /// Correlation id to reuse instead of generating one
    #[arg(long)]
    pub cid: Option<String>,

    /// Extension field; VALUE is parsed as JSON, else kept as a string
    #[arg(long = "field", value_name = "KEY=VALUE", value_parser = parse_field)]
    pub fields: Vec<(String, Value)>,

    #[arg(long, value_enum)]
    pub scope: Option<ScopeArg>,
}

fn parse_field(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", raw))?;
    if key.is_empty() {
        return Err(format!("empty key in '{}'", raw));
    }
    let value =
        serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}
