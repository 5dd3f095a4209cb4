use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Single structured error shape used across the core, the tracker shell and the CLI.
///
/// Codes are grouped by prefix (`PARSE_*`, `IO_*`, `CONFIG_*`, `THRESHOLD_*`, `TRACKER_*`,
/// `AGGREGATE_*`) so callers can branch on the family without string matching on messages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppError {
    pub code: String,
    pub message: String,
    pub details: Option<String>,
    pub retryable: bool,
}

impl AppError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            retryable: false,
        }
    }

    /// Structurally invalid artifact. `details` always carries the offending path.
    pub fn parse(code: impl Into<String>, path: &Path, err: impl fmt::Display) -> Self {
        Self::new(code, "Failed to parse test artifact")
            .with_details(format!("path={}; err={err}", path.display()))
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    pub fn is_parse_error(&self) -> bool {
        self.code.starts_with("PARSE_")
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(details) = &self.details {
            write!(f, " ({details})")?;
        }
        Ok(())
    }
}

impl std::error::Error for AppError {}

pub(crate) fn read_file(path: &Path) -> Result<String, AppError> {
    std::fs::read_to_string(path).map_err(|e| {
        AppError::new("IO_READ_FAILED", "Failed to read file")
            .with_details(format!("path={}; err={e}", path.display()))
    })
}
