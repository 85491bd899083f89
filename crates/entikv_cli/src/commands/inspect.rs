//! Inspect command implementation.

use super::{to_json, Format};
use crate::error::CliResult;
use entikv_core::{inspect, Database, ModelStats};
use std::fmt::Write;

/// Runs the inspect command and returns its output.
pub fn run(db: &Database, models: &[String], format: &str) -> CliResult<String> {
    let format = Format::parse(format)?;
    let stats = models
        .iter()
        .map(|model| inspect(db, model))
        .collect::<Result<Vec<_>, _>>()?;

    match format {
        Format::Json => to_json(&stats),
        Format::Text => Ok(stats.iter().map(render_text).collect()),
    }
}

fn render_text(stats: &ModelStats) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== {} ===", stats.model);
    let _ = writeln!(out, "Members:   {}", stats.members);
    let _ = writeln!(out, "Last id:   {}", stats.last_id);
    for (attribute, sets) in &stats.index_sets {
        let _ = writeln!(out, "Index:     {attribute} ({sets} values)");
    }
    for (attribute, entries) in &stats.unique_entries {
        let _ = writeln!(out, "Unique:    {attribute} ({entries} entries)");
    }
    if stats.temp_keys > 0 {
        let _ = writeln!(out, "Temp keys: {} (left by an interrupted query)", stats.temp_keys);
    }
    out
}
