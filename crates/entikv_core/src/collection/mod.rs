//! Query collections.
//!
//! A collection is a query value, never persisted itself: [`Set`] wraps one
//! stored set key, [`MultiSet`] a deferred intersection / difference / union
//! that is materialized into a scratch key only for the duration of one
//! operation. Both read through the [`Collection`] trait, whose default
//! methods only need [`Collection::with_key`].

mod filter;
mod multi;
mod set;

pub use filter::{FilterValue, Filters};
pub use multi::MultiSet;
pub use set::Set;

use crate::entity::Entity;
use crate::error::{CoreError, CoreResult};
use crate::key;
use crate::schema::Schema;
use entikv_store::{SortArgs, Store};
use std::sync::Arc;

/// Options of a sort.
///
/// # Example
///
/// ```rust
/// use entikv_core::SortOptions;
///
/// let opts = SortOptions::new()
///     .by("User:*->fname")
///     .order("ALPHA DESC")
///     .limit(0, 10);
/// let args = opts.to_args().unwrap();
/// assert!(args.alpha && args.desc);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortOptions {
    by: Option<String>,
    order: Option<String>,
    limit: Option<(usize, usize)>,
}

impl SortOptions {
    /// Sorts numerically by raw id, ascending.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sorts by an external key pattern, e.g. `User:*->fname`.
    #[must_use]
    pub fn by(mut self, pattern: impl Into<String>) -> Self {
        self.by = Some(pattern.into());
        self
    }

    /// Sets the ordering literal, any combination of `ASC`, `DESC` and
    /// `ALPHA`.
    #[must_use]
    pub fn order(mut self, order: impl Into<String>) -> Self {
        self.order = Some(order.into());
        self
    }

    /// Returns at most `count` ids starting at `offset`.
    #[must_use]
    pub fn limit(mut self, offset: usize, count: usize) -> Self {
        self.limit = Some((offset, count));
        self
    }

    /// Converts the options into store arguments.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidQuery`] for an unknown ordering token.
    pub fn to_args(&self) -> CoreResult<SortArgs> {
        let mut args = SortArgs {
            by: self.by.clone(),
            limit: self.limit,
            ..SortArgs::default()
        };
        for token in self.order.iter().flat_map(|o| o.split_whitespace()) {
            match token.to_ascii_uppercase().as_str() {
                "ASC" => args.desc = false,
                "DESC" => args.desc = true,
                "ALPHA" => args.alpha = true,
                other => {
                    return Err(CoreError::invalid_query(format!(
                        "unknown sort order token {other:?}"
                    )))
                }
            }
        }
        Ok(args)
    }
}

/// Loads the attribute hashes of `ids` in one pipelined round trip.
///
/// Results are paired with ids by position.
///
/// # Errors
///
/// Returns a store error if the batch fails.
pub fn hydrate(store: &dyn Store, schema: &Arc<Schema>, ids: Vec<String>) -> CoreResult<Vec<Entity>> {
    let keys: Vec<String> = ids
        .iter()
        .map(|id| key::attributes(schema.name(), id).into_string())
        .collect();
    let rows = store.hgetall_many(&keys)?;
    Ok(ids
        .into_iter()
        .zip(rows)
        .map(|(id, row)| Entity::hydrate(Arc::clone(schema), id, row))
        .collect())
}

/// Read operations shared by [`Set`] and [`MultiSet`].
pub trait Collection {
    /// Returns the schema of the members.
    fn schema(&self) -> &Arc<Schema>;

    /// Returns the connection the collection reads through.
    fn store(&self) -> &dyn Store;

    /// Runs `f` against the key holding the collection's members.
    ///
    /// # Errors
    ///
    /// Propagates any error from materializing the key or from `f`.
    fn with_key<T, F>(&self, f: F) -> CoreResult<T>
    where
        F: FnOnce(&dyn Store, &str) -> CoreResult<T>;

    /// Returns the number of members.
    fn size(&self) -> CoreResult<usize> {
        self.with_key(|store, key| Ok(store.scard(key)?))
    }

    /// Returns true if there are no members.
    fn is_empty(&self) -> CoreResult<bool> {
        Ok(self.size()? == 0)
    }

    /// Returns true if `id` is a member.
    fn contains(&self, id: &str) -> CoreResult<bool> {
        self.with_key(|store, key| Ok(store.sismember(key, id)?))
    }

    /// Returns every member id, in no particular order.
    fn ids(&self) -> CoreResult<Vec<String>> {
        self.with_key(|store, key| Ok(store.smembers(key)?))
    }

    /// Loads the member `id`, or `None` if it is not a member.
    fn get(&self, id: &str) -> CoreResult<Option<Entity>> {
        if !self.contains(id)? {
            return Ok(None);
        }
        let row = self
            .store()
            .hgetall(key::attributes(self.schema().name(), id).as_str())?;
        Ok(Some(Entity::hydrate(Arc::clone(self.schema()), id.to_string(), row)))
    }

    /// Loads every member.
    fn fetch_all(&self) -> CoreResult<Vec<Entity>> {
        let ids = self.ids()?;
        hydrate(self.store(), self.schema(), ids)
    }

    /// Returns member ids in sorted order.
    fn sort_ids(&self, options: &SortOptions) -> CoreResult<Vec<String>> {
        let args = options.to_args()?;
        self.with_key(|store, key| Ok(store.sort(key, &args)?))
    }

    /// Loads members in sorted order.
    fn sort(&self, options: &SortOptions) -> CoreResult<Vec<Entity>> {
        let ids = self.sort_ids(options)?;
        hydrate(self.store(), self.schema(), ids)
    }

    /// Sorts by a stored attribute or a counter.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownField`] if `attribute` is neither.
    fn sort_by(&self, attribute: &str, options: &SortOptions) -> CoreResult<Vec<Entity>> {
        let schema = self.schema();
        let pattern = if schema.is_counter(attribute) {
            key::sort_by_counter(schema.name(), attribute)
        } else if schema.is_attribute(attribute) {
            key::sort_by_attribute(schema.name(), attribute)
        } else {
            return Err(CoreError::unknown_field(schema.name(), attribute));
        };
        self.sort(&options.clone().by(pattern))
    }

    /// Returns the first member under `options`.
    fn first(&self, options: &SortOptions) -> CoreResult<Option<Entity>> {
        Ok(self
            .sort(&options.clone().limit(0, 1))?
            .into_iter()
            .next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_order_is_numeric_ascending() {
        assert_eq!(SortOptions::new().to_args().unwrap(), SortArgs::default());
    }

    #[test]
    fn order_tokens_are_case_insensitive() {
        let args = SortOptions::new().order("alpha desc").to_args().unwrap();
        assert!(args.alpha);
        assert!(args.desc);
        let args = SortOptions::new().order("DESC ASC").to_args().unwrap();
        assert!(!args.desc);
    }

    #[test]
    fn unknown_order_token_is_invalid_query() {
        let err = SortOptions::new().order("RANDOM").to_args().unwrap_err();
        assert!(matches!(err, CoreError::InvalidQuery { .. }));
    }

    #[test]
    fn limit_and_pattern_are_forwarded() {
        let args = SortOptions::new()
            .by("User:*->age")
            .limit(5, 10)
            .to_args()
            .unwrap();
        assert_eq!(args.by.as_deref(), Some("User:*->age"));
        assert_eq!(args.limit, Some((5, 10)));
    }
}
