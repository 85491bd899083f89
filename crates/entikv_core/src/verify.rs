//! Index consistency checks.

use crate::database::Database;
use crate::error::CoreResult;
use crate::index::IndexSnapshot;
use crate::key::{self, SEPARATOR};
use crate::schema::{Attributes, Schema};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::warn;

/// One inconsistency found by [`verify`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Finding {
    /// An index set holds an id that is not a member.
    DanglingIndex {
        /// Index set key.
        key: String,
        /// The id.
        id: String,
    },
    /// An index set holds a member whose stored value differs.
    StaleIndex {
        /// Index set key.
        key: String,
        /// The id.
        id: String,
    },
    /// A member's stored value is missing from its index set.
    MissingIndex {
        /// Index set key that should hold the id.
        key: String,
        /// The id.
        id: String,
    },
    /// A unique entry points at an id that is not a member, or at a member
    /// whose stored value differs.
    StaleUnique {
        /// Unique attribute.
        attribute: String,
        /// The value.
        value: String,
        /// The id it maps to.
        id: String,
    },
    /// A member's unique value has no entry pointing back at it.
    MissingUnique {
        /// Unique attribute.
        attribute: String,
        /// The value.
        value: String,
        /// The id.
        id: String,
    },
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DanglingIndex { key, id } => write!(f, "{key} holds non-member {id}"),
            Self::StaleIndex { key, id } => write!(f, "{key} holds {id} but its value changed"),
            Self::MissingIndex { key, id } => write!(f, "{key} is missing {id}"),
            Self::StaleUnique {
                attribute,
                value,
                id,
            } => write!(f, "unique {attribute}={value:?} points at stale id {id}"),
            Self::MissingUnique {
                attribute,
                value,
                id,
            } => write!(f, "unique {attribute}={value:?} has no entry for {id}"),
        }
    }
}

/// Result of [`verify`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VerifyReport {
    /// Model name.
    pub model: String,
    /// Number of members checked.
    pub checked: usize,
    /// Members without an attribute hash. Not an error: an instance saved
    /// without attributes has no hash.
    pub without_hash: usize,
    /// Every inconsistency found.
    pub findings: Vec<Finding>,
}

impl VerifyReport {
    /// Returns true if no inconsistency was found.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.findings.is_empty()
    }
}

/// Cross-checks the index and unique entries of a model against the stored
/// attribute hashes of its members.
///
/// Scans the keyspace; meant for maintenance, not for hot paths.
///
/// # Errors
///
/// Returns a store error.
pub fn verify(db: &Database, schema: &Schema) -> CoreResult<VerifyReport> {
    let model = schema.name();
    let store = db.connection(model)?;

    let members = store.smembers(key::all(model).as_str())?;
    let hash_keys: Vec<String> = members
        .iter()
        .map(|id| key::attributes(model, id).into_string())
        .collect();
    let rows = store.hgetall_many(&hash_keys)?;

    let mut report = VerifyReport {
        model: model.to_string(),
        checked: members.len(),
        ..VerifyReport::default()
    };
    let mut snapshots = HashMap::with_capacity(members.len());
    for (id, row) in members.iter().zip(rows) {
        if row.is_empty() {
            report.without_hash += 1;
        }
        let attributes: Attributes = row.into_iter().collect();
        snapshots.insert(id.as_str(), IndexSnapshot::capture(schema, &attributes));
    }

    for attribute in schema.indices() {
        let prefix = format!("{model}{SEPARATOR}indices{SEPARATOR}{attribute}{SEPARATOR}");
        let mut seen = HashSet::new();
        for index_key in store.keys(&format!("{prefix}*"))? {
            let value = &index_key[prefix.len()..];
            for id in store.smembers(&index_key)? {
                match snapshots.get(id.as_str()) {
                    None => report.findings.push(Finding::DanglingIndex {
                        key: index_key.clone(),
                        id,
                    }),
                    Some(snapshot) if !snapshot.has_index_value(attribute, value) => {
                        report.findings.push(Finding::StaleIndex {
                            key: index_key.clone(),
                            id,
                        });
                    }
                    Some(_) => {
                        seen.insert((value.to_string(), id));
                    }
                }
            }
        }
        for (id, snapshot) in &snapshots {
            for value in snapshot.index_values(attribute) {
                if !seen.contains(&(value.to_string(), (*id).to_string())) {
                    report.findings.push(Finding::MissingIndex {
                        key: key::index(model, attribute, value).into_string(),
                        id: (*id).to_string(),
                    });
                }
            }
        }
    }

    for attribute in schema.uniques() {
        let entries = store.hgetall(key::uniques(model, attribute).as_str())?;
        for (value, id) in &entries {
            let live = snapshots
                .get(id.as_str())
                .is_some_and(|s| s.unique_value(attribute) == Some(value.as_str()));
            if !live {
                report.findings.push(Finding::StaleUnique {
                    attribute: attribute.clone(),
                    value: value.clone(),
                    id: id.clone(),
                });
            }
        }
        for (id, snapshot) in &snapshots {
            if let Some(value) = snapshot.unique_value(attribute) {
                if entries.get(value).map(String::as_str) != Some(*id) {
                    report.findings.push(Finding::MissingUnique {
                        attribute: attribute.clone(),
                        value: value.to_string(),
                        id: (*id).to_string(),
                    });
                }
            }
        }
    }

    for finding in &report.findings {
        warn!(model, %finding, "index inconsistency");
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Entity;
    use entikv_store::Command;
    use std::sync::Arc;

    fn setup() -> (Database, Arc<Schema>) {
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
        (db, users)
    }

    #[test]
    fn consistent_model_verifies() {
        let (db, users) = setup();
        let mut ann = Entity::create(&db, users.clone(), [("email", "a@x.io"), ("fname", "Ann")]).unwrap();
        Entity::create(&db, users.clone(), [("email", "b@x.io"), ("fname", "Bob")]).unwrap();
        ann.update(&db, [("fname", "Anna"), ("email", "anna@x.io")]).unwrap();

        let report = verify(&db, &users).unwrap();
        assert!(report.is_ok(), "{:?}", report.findings);
        assert_eq!(report.checked, 2);
    }

    #[test]
    fn raw_set_leaves_stale_entries() {
        let (db, users) = setup();
        let mut ann = Entity::create(&db, users.clone(), [("email", "a@x.io"), ("fname", "Ann")]).unwrap();
        ann.set(&db, "fname", Some("Anna")).unwrap();

        let report = verify(&db, &users).unwrap();
        assert!(report.findings.contains(&Finding::StaleIndex {
            key: "User:indices:fname:Ann".into(),
            id: "1".into(),
        }));
        assert!(report.findings.contains(&Finding::MissingIndex {
            key: "User:indices:fname:Anna".into(),
            id: "1".into(),
        }));
    }

    #[test]
    fn dangling_entries_are_reported() {
        let (db, users) = setup();
        let store = db.connection("User").unwrap();
        store
            .apply(vec![
                Command::SAdd {
                    key: "User:indices:fname:Ghost".into(),
                    members: vec!["9".into()],
                },
                Command::HSet {
                    key: "User:uniques:email".into(),
                    field: "g@x.io".into(),
                    value: "9".into(),
                },
            ])
            .unwrap();

        let report = verify(&db, &users).unwrap();
        assert_eq!(report.findings.len(), 2);
        assert!(!report.is_ok());
    }
}
