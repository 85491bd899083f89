//! CLI command implementations.
//!
//! Each command renders its output into a string so it can be checked
//! against an in-memory database.

pub mod inspect;
pub mod run_script;
pub mod verify;

use crate::error::{CliError, CliResult};
use serde::Serialize;

/// Output format of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Human-readable text.
    Text,
    /// Pretty-printed JSON.
    Json,
}

impl Format {
    /// Parses a `--format` value.
    pub fn parse(format: &str) -> CliResult<Self> {
        match format {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(CliError::Usage(format!(
                "unknown format {other:?}, expected text or json"
            ))),
        }
    }
}

/// Renders `value` as pretty JSON followed by a newline.
pub fn to_json<T: Serialize>(value: &T) -> CliResult<String> {
    Ok(format!("{}\n", serde_json::to_string_pretty(value)?))
}
