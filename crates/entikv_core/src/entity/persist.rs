//! Saving, deleting and single-field store access.

use crate::database::Database;
use crate::entity::Entity;
use crate::error::{CoreError, CoreResult};
use crate::index::{IndexMaintainer, IndexSnapshot};
use crate::key;
use crate::schema::{Attributes, Schema};
use crate::transaction::Transaction;
use entikv_store::{Command, Store, StoreError};
use std::sync::Arc;
use tracing::debug;

/// Scratch state of a save.
#[derive(Default)]
struct SaveState {
    id: Option<String>,
    previous: IndexSnapshot,
}

impl SaveState {
    fn id(&self) -> CoreResult<&str> {
        self.id
            .as_deref()
            .ok_or_else(|| CoreError::invalid_operation("save ran without an id"))
    }
}

/// Reads the stored attributes of `id` and derives their index snapshot.
fn stored_snapshot(store: &dyn Store, schema: &Schema, id: &str) -> CoreResult<IndexSnapshot> {
    let stored: Attributes = store
        .hgetall(key::attributes(schema.name(), id).as_str())?
        .into_iter()
        .collect();
    Ok(IndexSnapshot::capture(schema, &stored))
}

impl Entity {
    /// Builds and saves a new instance.
    ///
    /// # Errors
    ///
    /// See [`Entity::new`] and [`Entity::save`].
    pub fn create<I, K, V>(db: &Database, schema: Arc<Schema>, attributes: I) -> CoreResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut entity = Self::new(schema, attributes)?;
        entity.save(db)?;
        Ok(entity)
    }

    /// Validates, then persists the instance.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ValidationFailed`] without touching the store
    /// when validation fails; otherwise see [`Entity::save_unchecked`].
    pub fn save(&mut self, db: &Database) -> CoreResult<()> {
        let errors = self.validate();
        if !errors.is_empty() {
            return Err(CoreError::ValidationFailed {
                model: self.model().to_string(),
                errors,
            });
        }
        self.save_unchecked(db)
    }

    /// Persists the instance without validating it.
    ///
    /// One transaction watches every unique hash (and the attribute hash of
    /// an already persisted instance), assigns an id on first save, checks
    /// uniqueness against the stored state and then rewrites the hash,
    /// membership, indices and uniques in one atomic block.
    ///
    /// An id consumed by a save that fails is skipped for good; the
    /// instance stays unsaved.
    ///
    /// # Errors
    ///
    /// - [`CoreError::UniqueIndexViolation`] if a unique value is taken;
    ///   nothing was written
    /// - [`CoreError::Conflict`] if a watched key changed concurrently;
    ///   nothing was written
    pub fn save_unchecked(&mut self, db: &Database) -> CoreResult<()> {
        let schema = Arc::clone(&self.schema);
        let model = schema.name();
        let store = db.connection(model)?;
        let maintainer = IndexMaintainer::new(&schema);
        let current = IndexSnapshot::capture(&schema, &self.attributes);
        let existing = self.id.clone();
        let attributes = &self.attributes;

        let mut txn: Transaction<'_, SaveState> = Transaction::new(model);
        txn.watch(maintainer.unique_keys());
        if let Some(id) = &existing {
            txn.watch([key::attributes(model, id)]);
        }
        txn.before(|store, state| {
            let id = match &existing {
                Some(id) => id.clone(),
                None => store.incr(key::id_sequence(model).as_str())?.to_string(),
            };
            state.id = Some(id);
            Ok(())
        })
        .read(|store, state| {
            if let Some(id) = &existing {
                state.previous = stored_snapshot(store, &schema, id)?;
            }
            maintainer.check_uniques(store, state.id()?, &current)
        })
        .write(|state, batch| {
            let id = state.id()?;
            let hash = key::attributes(model, id);
            batch.del([hash.clone()]).hmset(&hash, attributes);
            batch.sadd(&key::all(model), id);
            maintainer.write_save(batch, id, &state.previous, &current);
            Ok(())
        });

        let state = txn.commit(store.as_ref())?;
        if self.id.is_none() {
            self.id = state.id;
            debug!(model, id = ?self.id, "assigned id");
        }
        Ok(())
    }

    /// Merges `attributes`, then saves.
    ///
    /// # Errors
    ///
    /// See [`Entity::merge`] and [`Entity::save`].
    pub fn update<I, K, V>(&mut self, db: &Database, attributes: I) -> CoreResult<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.merge(attributes)?;
        self.save(db)
    }

    /// Removes every trace of the instance from the store: attribute hash,
    /// counters, declared sets, membership, and the index and unique entries
    /// derived from the stored snapshot.
    ///
    /// The instance keeps its id and attributes locally.
    ///
    /// # Errors
    ///
    /// - [`CoreError::MissingId`] if the instance was never saved
    /// - [`CoreError::Conflict`] if a watched key changed concurrently
    pub fn delete(&mut self, db: &Database) -> CoreResult<()> {
        let schema = Arc::clone(&self.schema);
        let model = schema.name();
        let id = self.id()?.to_string();
        let store = db.connection(model)?;
        let maintainer = IndexMaintainer::new(&schema);

        let mut txn: Transaction<'_, IndexSnapshot> = Transaction::new(model);
        txn.watch([key::attributes(model, &id)])
            .watch(maintainer.unique_keys())
            .read(|store, previous| {
                *previous = stored_snapshot(store, &schema, &id)?;
                Ok(())
            })
            .write(|previous, batch| {
                let mut keys = vec![key::attributes(model, &id), key::counters(model, &id)];
                keys.extend(schema.set_names().map(|name| key::collection(model, &id, name)));
                batch.del(keys);
                batch.srem(&key::all(model), &id);
                maintainer.write_delete(batch, &id, previous);
                Ok(())
            });
        txn.commit(store.as_ref())?;

        self.relations.clear();
        debug!(model, id = %id, "deleted");
        Ok(())
    }

    /// Reads one attribute straight from the store and refreshes the local
    /// copy.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownField`] or [`CoreError::MissingId`].
    pub fn get(&mut self, db: &Database, attribute: &str) -> CoreResult<Option<String>> {
        self.ensure_attribute(attribute)?;
        let key = self.key()?;
        let value = db.connection(self.model())?.hget(key.as_str(), attribute)?;
        match &value {
            Some(v) => self.attributes.insert(attribute.to_string(), v.clone()),
            None => self.attributes.remove(attribute),
        };
        Ok(value)
    }

    /// Writes one attribute straight to the store, or removes it for
    /// `None`, and updates the local copy.
    ///
    /// This bypasses index and unique maintenance: using it on an indexed
    /// or unique attribute leaves those entries stale.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownField`] or [`CoreError::MissingId`].
    pub fn set(&mut self, db: &Database, attribute: &str, value: Option<&str>) -> CoreResult<()> {
        self.ensure_attribute(attribute)?;
        let key = self.key()?.into_string();
        let command = match value {
            Some(v) => Command::HSet {
                key,
                field: attribute.to_string(),
                value: v.to_string(),
            },
            None => Command::HDel {
                key,
                field: attribute.to_string(),
            },
        };
        db.connection(self.model())?.apply(vec![command])?;
        match value {
            Some(v) => self.set_attr(attribute, v),
            None => self.remove_attr(attribute).map(drop),
        }
    }

    /// Atomically adds `by` to a counter and returns the new value.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownField`] if `counter` is not declared, or
    /// [`CoreError::MissingId`].
    pub fn incr(&self, db: &Database, counter: &str, by: i64) -> CoreResult<i64> {
        let key = self.counters_key(counter)?;
        Ok(db
            .connection(self.model())?
            .hincrby(key.as_str(), counter, by)?)
    }

    /// Atomically subtracts `by` from a counter and returns the new value.
    ///
    /// # Errors
    ///
    /// See [`Entity::incr`]. Returns a store error if the result leaves the
    /// `i64` range.
    pub fn decr(&self, db: &Database, counter: &str, by: i64) -> CoreResult<i64> {
        let by = by.checked_neg().ok_or_else(StoreError::overflow)?;
        self.incr(db, counter, by)
    }

    /// Reads a counter; an untouched counter is 0.
    ///
    /// # Errors
    ///
    /// See [`Entity::incr`].
    pub fn counter(&self, db: &Database, counter: &str) -> CoreResult<i64> {
        let key = self.counters_key(counter)?;
        let raw = db.connection(self.model())?.hget(key.as_str(), counter)?;
        raw.map_or(Ok(0), |v| {
            v.parse().map_err(|_| {
                CoreError::Store(StoreError::NotInteger {
                    key: format!("{key}->{counter}"),
                })
            })
        })
    }

    fn counters_key(&self, counter: &str) -> CoreResult<key::Key> {
        if !self.schema.is_counter(counter) {
            return Err(CoreError::unknown_field(self.model(), counter));
        }
        Ok(key::counters(self.model(), self.id()?))
    }
}
