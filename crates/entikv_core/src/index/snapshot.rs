//! Index snapshots.

use crate::schema::{Attributes, Schema};
use std::collections::{BTreeMap, BTreeSet};

/// The index and unique values derived from one attribute map.
///
/// Capturing the stored attributes and the attributes about to be written
/// gives the two sides of the diff a save applies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexSnapshot {
    indices: BTreeMap<String, BTreeSet<String>>,
    uniques: BTreeMap<String, String>,
}

impl IndexSnapshot {
    /// Derives every declared index and unique value from `attributes`.
    ///
    /// A unique on a multi-valued computed attribute is keyed by its first
    /// value.
    #[must_use]
    pub fn capture(schema: &Schema, attributes: &Attributes) -> Self {
        let indices = schema
            .indices()
            .iter()
            .map(|attr| {
                let values = schema.values_of(attr, attributes).into_iter().collect();
                (attr.clone(), values)
            })
            .collect();
        let uniques = schema
            .uniques()
            .iter()
            .filter_map(|attr| {
                schema
                    .values_of(attr, attributes)
                    .into_iter()
                    .next()
                    .map(|value| (attr.clone(), value))
            })
            .collect();
        Self { indices, uniques }
    }

    /// Returns the indexed values of `attribute`.
    pub fn index_values(&self, attribute: &str) -> impl Iterator<Item = &str> {
        self.indices
            .get(attribute)
            .into_iter()
            .flatten()
            .map(String::as_str)
    }

    /// Returns true if `value` is indexed under `attribute`.
    #[must_use]
    pub fn has_index_value(&self, attribute: &str, value: &str) -> bool {
        self.indices
            .get(attribute)
            .is_some_and(|values| values.contains(value))
    }

    /// Returns the unique value of `attribute`.
    #[must_use]
    pub fn unique_value(&self, attribute: &str) -> Option<&str> {
        self.uniques.get(attribute).map(String::as_str)
    }

    /// Returns every `(attribute, value)` unique pair.
    pub fn uniques(&self) -> impl Iterator<Item = (&str, &str)> {
        self.uniques.iter().map(|(a, v)| (a.as_str(), v.as_str()))
    }

    /// Returns true if nothing is indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.uniques.is_empty() && self.indices.values().all(BTreeSet::is_empty)
    }
}
