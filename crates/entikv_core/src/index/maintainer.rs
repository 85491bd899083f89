//! Index maintenance inside transactions.

use crate::error::{CoreError, CoreResult};
use crate::index::IndexSnapshot;
use crate::key;
use crate::schema::Schema;
use crate::transaction::WriteBatch;
use entikv_store::Store;

/// Computes index and unique commands for one model.
#[derive(Debug, Clone, Copy)]
pub struct IndexMaintainer<'s> {
    schema: &'s Schema,
}

impl<'s> IndexMaintainer<'s> {
    /// Creates a maintainer for `schema`.
    #[must_use]
    pub fn new(schema: &'s Schema) -> Self {
        Self { schema }
    }

    /// Returns every unique hash key; saves watch them all.
    #[must_use]
    pub fn unique_keys(&self) -> Vec<String> {
        self.schema
            .uniques()
            .iter()
            .map(|attr| key::uniques(self.schema.name(), attr).into_string())
            .collect()
    }

    /// Fails if a unique value of `current` belongs to an id other than `id`.
    ///
    /// Runs in the read phase, so a violation aborts before any write.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UniqueIndexViolation`] naming the first taken
    /// attribute.
    pub fn check_uniques(
        &self,
        store: &dyn Store,
        id: &str,
        current: &IndexSnapshot,
    ) -> CoreResult<()> {
        let model = self.schema.name();
        for (attr, value) in current.uniques() {
            let owner = store.hget(key::uniques(model, attr).as_str(), value)?;
            if owner.is_some_and(|owner| owner != id) {
                return Err(CoreError::UniqueIndexViolation {
                    model: model.to_string(),
                    attribute: attr.to_string(),
                    value: value.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Queues the transition from `previous` to `current` for `id`.
    ///
    /// Stale index memberships and unique values are removed; every current
    /// one is (re)written, which also repairs entries lost out of band.
    pub fn write_save(
        &self,
        batch: &mut WriteBatch,
        id: &str,
        previous: &IndexSnapshot,
        current: &IndexSnapshot,
    ) {
        let model = self.schema.name();
        for attr in self.schema.indices() {
            for value in previous.index_values(attr) {
                if !current.has_index_value(attr, value) {
                    batch.srem(&key::index(model, attr, value), id);
                }
            }
            for value in current.index_values(attr) {
                batch.sadd(&key::index(model, attr, value), id);
            }
        }
        for attr in self.schema.uniques() {
            let uniques = key::uniques(model, attr);
            let old = previous.unique_value(attr);
            let new = current.unique_value(attr);
            if let Some(old) = old.filter(|old| Some(*old) != new) {
                batch.hdel(&uniques, old);
            }
            if let Some(new) = new {
                batch.hset(&uniques, new, id);
            }
        }
    }

    /// Queues the removal of every entry in `previous` for `id`.
    pub fn write_delete(&self, batch: &mut WriteBatch, id: &str, previous: &IndexSnapshot) {
        let model = self.schema.name();
        for attr in self.schema.indices() {
            for value in previous.index_values(attr) {
                batch.srem(&key::index(model, attr, value), id);
            }
        }
        for (attr, value) in previous.uniques() {
            batch.hdel(&key::uniques(model, attr), value);
        }
    }
}
