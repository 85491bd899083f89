//! Verify command implementation.

use super::{to_json, Format};
use crate::error::CliResult;
use entikv_core::{inspect, verify, Database, Schema, VerifyReport};
use std::fmt::Write;

/// Runs the verify command.
///
/// The schema is rebuilt from the given attributes, or from the index and
/// unique keys found in the keyspace when none are given. Computed
/// attributes cannot be rebuilt this way and must not be passed.
///
/// Returns the output and whether the model is consistent.
pub fn run(
    db: &Database,
    model: &str,
    indices: &[String],
    uniques: &[String],
    format: &str,
) -> CliResult<(String, bool)> {
    let format = Format::parse(format)?;
    let (indices, uniques) = if indices.is_empty() && uniques.is_empty() {
        let stats = inspect(db, model)?;
        (
            stats.index_sets.into_keys().collect(),
            stats.unique_entries.into_keys().collect(),
        )
    } else {
        (indices.to_vec(), uniques.to_vec())
    };

    let schema = declared_schema(model, &indices, &uniques)?;
    let report = verify(db, &schema)?;
    let ok = report.is_ok();
    let output = match format {
        Format::Json => to_json(&report)?,
        Format::Text => render_text(&report, &indices, &uniques),
    };
    Ok((output, ok))
}

fn declared_schema(
    model: &str,
    indices: &[String],
    uniques: &[String],
) -> CliResult<std::sync::Arc<Schema>> {
    let mut builder = Schema::builder(model);
    let mut declared = Vec::new();
    for attribute in indices.iter().chain(uniques) {
        if !declared.contains(attribute) {
            builder = builder.attribute(attribute.as_str());
            declared.push(attribute.clone());
        }
    }
    for attribute in indices {
        builder = builder.index(attribute.as_str());
    }
    for attribute in uniques {
        builder = builder.unique(attribute.as_str());
    }
    Ok(builder.build()?)
}

fn render_text(report: &VerifyReport, indices: &[String], uniques: &[String]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Verifying {}", report.model);
    let _ = writeln!(out, "  indices: {}", list(indices));
    let _ = writeln!(out, "  uniques: {}", list(uniques));
    let _ = writeln!(out);
    let _ = writeln!(out, "Members checked: {}", report.checked);
    let _ = writeln!(out, "Without hash:    {}", report.without_hash);
    if report.is_ok() {
        let _ = writeln!(out, "\n✓ No inconsistencies found");
    } else {
        let _ = writeln!(out, "\n✗ {} inconsistencies:", report.findings.len());
        for finding in &report.findings {
            let _ = writeln!(out, "  - {finding}");
        }
    }
    out
}

fn list(names: &[String]) -> String {
    if names.is_empty() {
        "(none)".into()
    } else {
        names.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use entikv_core::Entity;
    use entikv_testkit::{create_user, register_samples};

    #[test]
    fn discovers_indices_from_the_keyspace() {
        let db = Database::in_memory();
        let accounts = db
            .register(
                Schema::builder("Account")
                    .attribute("email")
                    .attribute("fname")
                    .unique("email")
                    .index("fname")
                    .build()
                    .unwrap(),
            )
            .unwrap();
        Entity::create(&db, accounts, [("email", "ann@x.io"), ("fname", "Ann")]).unwrap();

        let (text, ok) = run(&db, "Account", &[], &[], "text").unwrap();
        assert!(ok, "{text}");
        assert!(text.contains("indices: fname"));
        assert!(text.contains("uniques: email"));
        assert!(text.contains("Members checked: 1"));
    }

    #[test]
    fn reports_stale_entries() {
        let db = Database::in_memory();
        let users = register_samples(&db).users;
        let mut ann = create_user(&db, &users, "ann@x.io", "Ann");
        ann.set(&db, "fname", Some("Anna")).unwrap();

        let fname = ["fname".to_string()];
        let (json, ok) = run(&db, "User", &fname, &[], "json").unwrap();
        assert!(!ok);
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let kinds: Vec<_> = value["findings"]
            .as_array()
            .unwrap()
            .iter()
            .map(|f| f["kind"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(kinds, vec!["stale_index", "missing_index"]);
    }
}
