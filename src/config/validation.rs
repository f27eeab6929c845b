use super::models::Config;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("writer.agent_id must not be empty")]
    EmptyAgentId,

    #[error("filter.program must not be empty")]
    EmptyFilterProgram,

    #[error("store.global_root exists but is not a directory: {}", .0.display())]
    GlobalRootNotDirectory(PathBuf),
}

/// Validate the entire configuration
///
/// Thresholds are not checked: zero and negative values are
/// meaningful (evict everything the stage looks at).
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_store(config)?;
    validate_writer(config)?;
    validate_filter(config)?;
    Ok(())
}

fn validate_store(config: &Config) -> Result<(), ValidationError> {
    if let Some(root) = &config.store.global_root {
        if root.exists() && !root.is_dir() {
            return Err(ValidationError::GlobalRootNotDirectory(root.clone()));
        }
    }
    Ok(())
}

fn validate_writer(config: &Config) -> Result<(), ValidationError> {
    if config.writer.agent_id.trim().is_empty() {
        return Err(ValidationError::EmptyAgentId);
    }
    Ok(())
}

fn validate_filter(config: &Config) -> Result<(), ValidationError> {
    if config.filter.program.trim().is_empty() {
        return Err(ValidationError::EmptyFilterProgram);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_are_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_negative_thresholds_are_valid() {
        let mut config = Config::default();
        config.retention.retention_days = -3;
        config.retention.max_file_count = 0;
        config.retention.compact_after_days = -1;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_empty_agent_id() {
        let mut config = Config::default();
        config.writer.agent_id = "  ".to_string();
        assert!(matches!(validate(&config), Err(ValidationError::EmptyAgentId)));
    }

    #[test]
    fn test_empty_filter_program() {
        let mut config = Config::default();
        config.filter.program = String::new();
        assert!(matches!(
            validate(&config),
            Err(ValidationError::EmptyFilterProgram)
        ));
    }

    #[test]
    fn test_global_root_is_file() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("logs");
        fs::write(&file, "not a dir").unwrap();

        let mut config = Config::default();
        config.store.global_root = Some(file);
        assert!(matches!(
            validate(&config),
            Err(ValidationError::GlobalRootNotDirectory(_))
        ));

        // Not existing yet is fine, the writer creates it
        config.store.global_root = Some(temp_dir.path().join("later"));
        assert!(validate(&config).is_ok());
    }
}
