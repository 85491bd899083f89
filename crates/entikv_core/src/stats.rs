//! Model statistics.
//!
//! A read-only look at the keys one model occupies, for tooling:
//!
//! ```rust
//! use entikv_core::{inspect, Database};
//!
//! let db = Database::in_memory();
//! let stats = inspect(&db, "User").unwrap();
//! assert_eq!(stats.members, 0);
//! assert_eq!(stats.last_id, 0);
//! ```

use crate::database::Database;
use crate::error::CoreResult;
use crate::key::{self, SEPARATOR};
use serde::Serialize;
use std::collections::BTreeMap;

/// Key usage of one model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ModelStats {
    /// Model name.
    pub model: String,
    /// Members of `<Model>:all`.
    pub members: usize,
    /// Last id handed out by `<Model>:id`; 0 if none yet.
    pub last_id: i64,
    /// Number of index sets per indexed attribute.
    pub index_sets: BTreeMap<String, usize>,
    /// Number of entries per unique attribute.
    pub unique_entries: BTreeMap<String, usize>,
    /// Leftover `<Model>:temp:*` keys; always 0 unless a process died
    /// mid-query.
    pub temp_keys: usize,
}

/// Collects [`ModelStats`] for `model`.
///
/// Works without a registered schema: indices and uniques are discovered
/// from the keyspace, which makes this a `KEYS` scan and unsuitable for hot
/// paths.
///
/// # Errors
///
/// Returns a store error.
pub fn inspect(db: &Database, model: &str) -> CoreResult<ModelStats> {
    let store = db.connection(model)?;
    let last_id = match store.get(key::id_sequence(model).as_str())? {
        Some(raw) => raw.parse().unwrap_or_default(),
        None => 0,
    };

    let mut index_sets = BTreeMap::new();
    let prefix = format!("{model}{SEPARATOR}indices{SEPARATOR}");
    for key in store.keys(&format!("{prefix}*"))? {
        if let Some((attribute, _)) = key[prefix.len()..].split_once(SEPARATOR) {
            *index_sets.entry(attribute.to_string()).or_insert(0) += 1;
        }
    }

    let mut unique_entries = BTreeMap::new();
    let prefix = format!("{model}{SEPARATOR}uniques{SEPARATOR}");
    for key in store.keys(&format!("{prefix}*"))? {
        let entries = store.hgetall(&key)?.len();
        unique_entries.insert(key[prefix.len()..].to_string(), entries);
    }

    Ok(ModelStats {
        model: model.to_string(),
        members: store.scard(key::all(model).as_str())?,
        last_id,
        index_sets,
        unique_entries,
        temp_keys: store
            .keys(&format!("{model}{SEPARATOR}temp{SEPARATOR}*"))?
            .len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Entity, Schema};

    #[test]
    fn counts_model_keys() {
        let db = Database::in_memory();
        let users = db
            .register(
                Schema::builder("User")
                    .attribute("email")
                    .attribute("fname")
                    .unique("email")
                    .index("fname")
                    .build()
                    .unwrap(),
            )
            .unwrap();
        for (email, fname) in [("a@x.io", "Ann"), ("b@x.io", "Bob"), ("c@x.io", "Ann")] {
            Entity::create(&db, users.clone(), [("email", email), ("fname", fname)]).unwrap();
        }

        let stats = inspect(&db, "User").unwrap();
        assert_eq!(stats.members, 3);
        assert_eq!(stats.last_id, 3);
        assert_eq!(stats.index_sets.get("fname"), Some(&2));
        assert_eq!(stats.unique_entries.get("email"), Some(&3));
        assert_eq!(stats.temp_keys, 0);

        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["members"], 3);
    }
}
