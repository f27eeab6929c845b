//! One store plus the policy that governs it
//!
//! [`LogHub`] is what the binary and embedding code hold on to: it knows
//! the store root, the retention and compaction thresholds, the default agent
//! id and the filter program, and exposes the engine's operations against
//! that store.

use std::path::{Path, PathBuf};

use serde_json::Value;
use time::Date;
use tracing::{debug, warn};

use crate::config::{Config, ConfigError, Scope};
use crate::event::{self, EventWriter};
use crate::query::{self, JqFilter, QueryError, RecordFilter};
use crate::store::{self, CompactionPolicy, CompactionReport, RetentionPolicy, RetentionReport, StoreStats};

#[derive(Debug, Clone)]
pub struct LogHub {
    root: PathBuf,
    scope: Option<Scope>,
    retention: RetentionPolicy,
    compaction: CompactionPolicy,
    auto_cleanup: bool,
    agent_id: String,
    filter_program: String,
}

impl LogHub {
    /// Hub over `root` with default policies and no automatic cleanup
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let config = Config::default();
        Self {
            root: root.into(),
            scope: None,
            retention: RetentionPolicy::default(),
            compaction: CompactionPolicy::default(),
            auto_cleanup: false,
            agent_id: config.writer.agent_id,
            filter_program: config.filter.program,
        }
    }

    /// Hub over the store `scope` resolves to, or the preferred store
    pub fn from_config(config: &Config, scope: Option<Scope>) -> Result<Self, ConfigError> {
        let resolver = config.scope_resolver()?;
        let (scope, root) = match scope {
            Some(scope) => (scope, resolver.resolve(scope)?),
            None => resolver.preferred(config.store.prefer_project)?,
        };
        debug!(scope = %scope, root = %root.display(), "Resolved log store");

        Ok(Self {
            root,
            scope: Some(scope),
            retention: RetentionPolicy::from(&config.retention),
            compaction: CompactionPolicy::from(&config.retention),
            auto_cleanup: config.retention.auto_cleanup,
            agent_id: config.writer.agent_id.clone(),
            filter_program: config.filter.program.clone(),
        })
    }

    pub fn with_retention(mut self, retention: RetentionPolicy) -> Self {
        self.retention = retention;
        self
    }

    pub fn with_compaction(mut self, compaction: CompactionPolicy) -> Self {
        self.compaction = compaction;
        self
    }

    pub fn with_agent_id(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = agent_id.into();
        self
    }

    pub fn with_auto_cleanup(mut self, auto_cleanup: bool) -> Self {
        self.auto_cleanup = auto_cleanup;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn scope(&self) -> Option<Scope> {
        self.scope
    }

    pub fn retention(&self) -> &RetentionPolicy {
        &self.retention
    }

    pub fn compaction(&self) -> &CompactionPolicy {
        &self.compaction
    }

    /// Open a writer for `session_id` (or a new session).
    ///
    /// With auto cleanup on, a retention pass runs first; its failure is
    /// logged and never blocks the writer.
    pub fn writer(&self, session_id: Option<String>) -> event::Result<EventWriter> {
        if self.auto_cleanup {
            match self.retention.evaluate(&self.root, false) {
                Ok(report) if report.deleted_count > 0 => debug!(
                    deleted = report.deleted_count,
                    freed_bytes = report.freed_bytes,
                    "Automatic cleanup removed old logs"
                ),
                Ok(_) => {}
                Err(e) => warn!(root = %self.root.display(), error = %e, "Automatic cleanup failed"),
            }
        }

        match session_id {
            Some(id) => EventWriter::open(&self.root, id, self.agent_id.clone()),
            None => EventWriter::open_new(&self.root, self.agent_id.clone()),
        }
    }

    pub fn stats(&self) -> store::Result<StoreStats> {
        store::index::stats(&self.root)
    }

    pub fn cleanup(&self, dry_run: bool) -> store::Result<RetentionReport> {
        self.retention.evaluate(&self.root, dry_run)
    }

    pub fn compact(&self, dry_run: bool) -> store::Result<CompactionReport> {
        self.compaction.compact(&self.root, dry_run)
    }

    /// Filter for `expression` using the configured program
    pub fn filter(&self, expression: &str) -> JqFilter {
        JqFilter::with_program(&self.filter_program, expression)
    }

    /// Run `expression` over one session, today's partition unless `date`
    pub fn query(
        &self,
        expression: &str,
        session_id: &str,
        date: Option<Date>,
    ) -> Result<Vec<Value>, QueryError> {
        query::query_session(&self.root, &self.filter(expression), session_id, date)
    }

    /// Run `expression` over every session file whose name contains `session_filter`
    pub fn query_all(
        &self,
        expression: &str,
        session_filter: Option<&str>,
    ) -> Result<Vec<(PathBuf, Vec<Value>)>, QueryError> {
        self.query_with(&self.filter(expression), session_filter)
    }

    /// Like [`LogHub::query_all`] with any filter
    pub fn query_with(
        &self,
        filter: &dyn RecordFilter,
        session_filter: Option<&str>,
    ) -> Result<Vec<(PathBuf, Vec<Value>)>, QueryError> {
        query::query_store(&self.root, filter, session_filter)
    }
}
