//! Query filters.

use crate::error::{CoreError, CoreResult};
use crate::key;
use crate::schema::Schema;

/// The value side of a filter: one value, or several values that must all
/// match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterValue {
    /// A single value.
    One(String),
    /// Every listed value must match.
    All(Vec<String>),
}

impl FilterValue {
    fn into_values(self) -> Vec<String> {
        match self {
            Self::One(v) => vec![v],
            Self::All(vs) => vs,
        }
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        Self::One(value.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        Self::One(value)
    }
}

impl From<&String> for FilterValue {
    fn from(value: &String) -> Self {
        Self::One(value.clone())
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        Self::One(value.to_string())
    }
}

impl From<Vec<String>> for FilterValue {
    fn from(values: Vec<String>) -> Self {
        Self::All(values)
    }
}

impl From<Vec<&str>> for FilterValue {
    fn from(values: Vec<&str>) -> Self {
        Self::All(values.into_iter().map(str::to_string).collect())
    }
}

impl<const N: usize> From<[&str; N]> for FilterValue {
    fn from(values: [&str; N]) -> Self {
        Self::All(values.into_iter().map(str::to_string).collect())
    }
}

/// An attribute to value mapping used by `find`, `except` and `union`.
///
/// # Example
///
/// ```rust
/// use entikv_core::Filters;
///
/// let filters = Filters::new().eq("fname", "John").eq("tag", ["rust", "db"]);
/// assert_eq!(filters.len(), 2);
///
/// let same: Filters = [("fname", "John")].into();
/// assert!(!same.is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filters {
    clauses: Vec<(String, Vec<String>)>,
}

impl Filters {
    /// Creates an empty filter set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a clause.
    #[must_use]
    pub fn eq(mut self, attribute: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        self.clauses
            .push((attribute.into(), value.into().into_values()));
        self
    }

    /// Returns the number of clauses.
    #[must_use]
    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    /// Returns true if there are no clauses.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Resolves the filters into the index keys to intersect.
    ///
    /// # Errors
    ///
    /// - [`CoreError::InvalidQuery`] for an empty filter set, an empty
    ///   attribute name or an empty value list
    /// - [`CoreError::IndexNotFound`] for an attribute without an index
    pub fn index_keys(&self, schema: &Schema) -> CoreResult<Vec<String>> {
        if self.clauses.is_empty() {
            return Err(CoreError::invalid_query(format!(
                "{}: empty filter",
                schema.name()
            )));
        }
        let mut keys = Vec::new();
        for (attribute, values) in &self.clauses {
            if attribute.is_empty() {
                return Err(CoreError::invalid_query("empty attribute name"));
            }
            if values.is_empty() {
                return Err(CoreError::invalid_query(format!(
                    "no value given for {attribute}"
                )));
            }
            if !schema.is_index(attribute) {
                return Err(CoreError::index_not_found(schema.name(), attribute));
            }
            keys.extend(
                values
                    .iter()
                    .map(|value| key::index(schema.name(), attribute, value).into_string()),
            );
        }
        Ok(keys)
    }
}

impl<K, V, const N: usize> From<[(K, V); N]> for Filters
where
    K: Into<String>,
    V: Into<FilterValue>,
{
    fn from(clauses: [(K, V); N]) -> Self {
        clauses.into_iter().collect()
    }
}

impl<K, V> FromIterator<(K, V)> for Filters
where
    K: Into<String>,
    V: Into<FilterValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Self::new(), |filters, (k, v)| filters.eq(k, v))
    }
}
