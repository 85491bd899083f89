//! Run-script command implementation.

use crate::error::CliResult;
use entikv_core::Database;
use entikv_store::ScriptValue;

/// Runs a named script on the connection of the first key's model, or of
/// the `scripts` context when no key is given, and renders the reply.
pub fn run(db: &Database, name: &str, keys: &[String], args: &[String]) -> CliResult<String> {
    let context = keys
        .first()
        .and_then(|k| k.split(':').next())
        .unwrap_or("scripts");
    let reply = db.run_script(context, name, keys, args)?;
    Ok(render(&reply))
}

fn render(value: &ScriptValue) -> String {
    match value {
        ScriptValue::Nil => "(nil)".into(),
        ScriptValue::Int(n) => format!("(integer) {n}"),
        ScriptValue::Bulk(s) => format!("{s:?}"),
        ScriptValue::Status(s) => s.clone(),
        ScriptValue::Array(items) if items.is_empty() => "(empty array)".into(),
        ScriptValue::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, item)| format!("{}) {}", i + 1, render(item)))
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use entikv_core::Config;
    use entikv_store::{Endpoint, MemoryServer};
    use tempfile::TempDir;

    #[test]
    fn runs_a_script_from_the_directory() {
        const BODY: &str = "return {ARGV[1], 2}";
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("pair.lua"), BODY).unwrap();
        let server = MemoryServer::new();
        server.define_script(BODY, |_, _, args| {
            Ok(ScriptValue::Array(vec![
                ScriptValue::Bulk(args[0].clone()),
                ScriptValue::Int(2),
            ]))
        });
        let db = Database::open(
            Config::new()
                .endpoint(Endpoint::Memory(server))
                .script_dir(dir.path()),
        );

        let out = run(&db, "pair", &["User:1".to_string()], &["a".to_string()]).unwrap();
        assert_eq!(out, "1) \"a\"\n2) (integer) 2");
    }

    #[test]
    fn renders_scalars() {
        assert_eq!(render(&ScriptValue::Nil), "(nil)");
        assert_eq!(render(&ScriptValue::Status("OK".into())), "OK");
        assert_eq!(render(&ScriptValue::Array(vec![])), "(empty array)");
    }
}
