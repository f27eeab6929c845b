use std::io::{self, Write};
use std::process::{Command, Stdio};
use std::thread;

use serde_json::Value;
use tracing::debug;

use super::FilterError;
use super::filter::RecordFilter;

pub const DEFAULT_JQ_PROGRAM: &str = "jq";

/// Runs a jq expression over records as compact JSON lines
#[derive(Debug, Clone)]
pub struct JqFilter {
    program: String,
    expression: String,
}

impl JqFilter {
    pub fn new(expression: impl Into<String>) -> Self {
        Self::with_program(DEFAULT_JQ_PROGRAM, expression)
    }

    pub fn with_program(program: impl Into<String>, expression: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            expression: expression.into(),
        }
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Run `{program} --version`, so a missing tool is reported even when
    /// there are no records to filter
    pub fn ensure_available(&self) -> Result<(), FilterError> {
        let output = Command::new(&self.program)
            .arg("--version")
            .stdin(Stdio::null())
            .output()
            .map_err(|e| self.spawn_error(e))?;

        if !output.status.success() {
            return Err(FilterError::Failed {
                program: self.program.clone(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        debug!(
            program = %self.program,
            version = %String::from_utf8_lossy(&output.stdout).trim(),
            "Filter program available"
        );
        Ok(())
    }

    fn spawn_error(&self, e: io::Error) -> FilterError {
        match e.kind() {
            io::ErrorKind::NotFound => FilterError::ToolMissing {
                program: self.program.clone(),
            },
            _ => FilterError::Io(e),
        }
    }
}

impl RecordFilter for JqFilter {
    fn apply(&self, records: Vec<Value>) -> Result<Vec<Value>, FilterError> {
        let mut input = Vec::new();
        for record in &records {
            serde_json::to_writer(&mut input, record).map_err(FilterError::Encode)?;
            input.push(b'\n');
        }

        let mut child = Command::new(&self.program)
            .arg("-c")
            .arg(&self.expression)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        // Feed stdin from a separate thread so a large output cannot deadlock us
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| io::Error::other("filter stdin unavailable"))?;
        let feeder = thread::spawn(move || stdin.write_all(&input));

        let output = child.wait_with_output()?;
        if let Ok(Err(e)) = feeder.join() {
            // jq may legitimately stop reading early
            if e.kind() != io::ErrorKind::BrokenPipe {
                return Err(FilterError::Io(e));
            }
        }

        if !output.status.success() {
            return Err(FilterError::Failed {
                program: self.program.clone(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let values = serde_json::Deserializer::from_slice(&output.stdout)
            .into_iter::<Value>()
            .collect::<Result<Vec<_>, _>>()
            .map_err(FilterError::InvalidOutput)?;
        debug!(
            expression = %self.expression,
            input = records.len(),
            output = values.len(),
            "jq filter applied"
        );
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_program() {
        let filter = JqFilter::with_program("hublog-test-no-such-binary", ".");
        let result = filter.apply(vec![json!({"evt": "a"})]);
        match result {
            Err(FilterError::ToolMissing { program }) => {
                assert_eq!(program, "hublog-test-no-such-binary")
            }
            other => panic!("expected ToolMissing, got {:?}", other),
        }
    }

    #[test]
    fn test_ensure_available_reports_missing_program() {
        let filter = JqFilter::with_program("hublog-test-no-such-binary", ".");
        assert!(matches!(
            filter.ensure_available(),
            Err(FilterError::ToolMissing { .. })
        ));
    }

    #[test]
    fn test_default_program() {
        let filter = JqFilter::new("select(.evt == \"decision.made\")");
        assert_eq!(filter.program, DEFAULT_JQ_PROGRAM);
        assert_eq!(filter.expression(), "select(.evt == \"decision.made\")");
    }
}
