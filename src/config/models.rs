use crate::humanize::ByteSize;
use crate::query::DEFAULT_JQ_PROGRAM;
use crate::store::{
    CompactionPolicy, DEFAULT_COMPACT_AFTER_DAYS, DEFAULT_MAX_FILE_COUNT, DEFAULT_MAX_TOTAL_BYTES,
    DEFAULT_RETENTION_DAYS, RetentionPolicy,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
    #[serde(default)]
    pub writer: WriterConfig,
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Where stores live
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    /// Overrides `$HOME/.claude/logs`
    pub global_root: Option<PathBuf>,
    /// Use the project store when the working directory is inside a project
    #[serde(default = "default_prefer_project")]
    pub prefer_project: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            global_root: None,
            prefer_project: default_prefer_project(),
        }
    }
}

fn default_prefer_project() -> bool {
    true
}

/// Retention and compaction thresholds.
///
/// Zero or negative day and count thresholds are accepted and evict
/// everything the corresponding stage looks at.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetentionConfig {
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
    #[serde(default = "default_max_total_bytes")]
    pub max_total_bytes: ByteSize,
    #[serde(default = "default_max_file_count")]
    pub max_file_count: i64,
    #[serde(default = "default_compact_after_days")]
    pub compact_after_days: i64,
    /// Run cleanup whenever a writer is opened
    #[serde(default = "default_auto_cleanup")]
    pub auto_cleanup: bool,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            retention_days: default_retention_days(),
            max_total_bytes: default_max_total_bytes(),
            max_file_count: default_max_file_count(),
            compact_after_days: default_compact_after_days(),
            auto_cleanup: default_auto_cleanup(),
        }
    }
}

fn default_retention_days() -> i64 {
    DEFAULT_RETENTION_DAYS
}

fn default_max_total_bytes() -> ByteSize {
    ByteSize(DEFAULT_MAX_TOTAL_BYTES as u64) // 50 MB
}

fn default_max_file_count() -> i64 {
    DEFAULT_MAX_FILE_COUNT
}

fn default_compact_after_days() -> i64 {
    DEFAULT_COMPACT_AFTER_DAYS
}

fn default_auto_cleanup() -> bool {
    true
}

impl From<&RetentionConfig> for RetentionPolicy {
    fn from(config: &RetentionConfig) -> Self {
        RetentionPolicy::new(
            config.retention_days,
            config.max_total_bytes.as_i64(),
            config.max_file_count,
        )
    }
}

impl From<&RetentionConfig> for CompactionPolicy {
    fn from(config: &RetentionConfig) -> Self {
        CompactionPolicy::new(config.compact_after_days)
    }
}

/// Defaults for new writers
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WriterConfig {
    #[serde(default = "default_agent_id")]
    pub agent_id: String,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            agent_id: default_agent_id(),
        }
    }
}

fn default_agent_id() -> String {
    "orch:default".to_string()
}

/// External filter tool used by queries
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FilterConfig {
    #[serde(default = "default_filter_program")]
    pub program: String,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            program: default_filter_program(),
        }
    }
}

fn default_filter_program() -> String {
    DEFAULT_JQ_PROGRAM.to_string()
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TelemetryConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter(),
        }
    }
}

fn default_log_filter() -> String {
    "warn".to_string()
}
