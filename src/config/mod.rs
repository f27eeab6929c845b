//! Configuration management for hublog
//!
//! This module provides a layered configuration system that loads settings from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. `.env` file
//! 4. Environment variables (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use hublog::config::Config;
//!
//! let config = Config::load().expect("Failed to load configuration");
//! println!("Keeping logs for {} days", config.retention.retention_days);
//! ```
//!
//! # Environment Variables
//!
//! Configuration can be overridden using environment variables with the pattern:
//! `HUBLOG__<section>__<key>`
//!
//! Examples:
//! - `HUBLOG__RETENTION__RETENTION_DAYS=14`
//! - `HUBLOG__RETENTION__MAX_TOTAL_BYTES=100MB`
//! - `HUBLOG__WRITER__AGENT_ID=spec:backend:auth01`
//!
//! # Configuration File
//!
//! By default, the configuration is loaded from `config/hublog.toml`.
//! This can be overridden using the `HUBLOG_CONFIG` environment variable
//! or the `--config` flag of the binary.

mod models;
mod resolver;
mod sources;
mod validation;

pub use crate::humanize::ByteSize;
pub use models::{
    Config, FilterConfig, RetentionConfig, StoreConfig, TelemetryConfig, WriterConfig,
};
pub use resolver::{ResolverError, Scope, ScopeResolver};
pub use validation::ValidationError;

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),

    #[error("Store resolution failed: {0}")]
    ResolverError(#[from] ResolverError),
}

impl Config {
    /// Load configuration from all sources (file + environment)
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file is malformed or validation
    /// fails.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(None)
    }

    /// Like [`Config::load`], reading the TOML file from `path` when given
    pub fn load_with(path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let config = sources::load(path)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path, skipping `.env`
    ///
    /// Useful for testing with custom configuration files.
    pub fn load_from_path(path: PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Scope resolver for the current process
    pub fn scope_resolver(&self) -> Result<ScopeResolver, ConfigError> {
        Ok(ScopeResolver::from_env(self.store.global_root.clone())?)
    }
}
