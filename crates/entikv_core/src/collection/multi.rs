//! Deferred set algebra.

use crate::collection::{Collection, Filters};
use crate::error::CoreResult;
use crate::key::{self, Key};
use crate::schema::Schema;
use entikv_store::{Command, Store};
use std::fmt;
use std::sync::Arc;
use tracing::{trace, warn};

/// An intersection of index sets, minus the `except` sets, plus the
/// `union` sets.
///
/// Chaining never mutates the receiver: every `find`, `except` and `union`
/// returns a new value, so a `MultiSet` can be shared and refined freely.
/// Nothing is stored until an operation runs; each operation materializes
/// the result into a fresh `<Model>:temp:<uuid>` key and deletes it again
/// before returning.
#[derive(Clone)]
pub struct MultiSet {
    schema: Arc<Schema>,
    store: Arc<dyn Store>,
    keys: Vec<String>,
    except: Vec<Vec<String>>,
    union: Vec<Vec<String>>,
}

impl MultiSet {
    /// Creates the intersection of `keys`.
    #[must_use]
    pub fn new(schema: Arc<Schema>, store: Arc<dyn Store>, keys: Vec<String>) -> Self {
        Self {
            schema,
            store,
            keys,
            except: Vec::new(),
            union: Vec::new(),
        }
    }

    /// Returns the intersected keys.
    #[must_use]
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Narrows to members matching every filter.
    ///
    /// # Errors
    ///
    /// See [`Filters::index_keys`].
    pub fn find(&self, filters: impl Into<Filters>) -> CoreResult<Self> {
        let keys = filters.into().index_keys(&self.schema)?;
        let mut next = self.clone();
        next.keys.extend(keys);
        Ok(next)
    }

    /// Removes members matching every filter.
    ///
    /// # Errors
    ///
    /// See [`Filters::index_keys`].
    pub fn except(&self, filters: impl Into<Filters>) -> CoreResult<Self> {
        let keys = filters.into().index_keys(&self.schema)?;
        let mut next = self.clone();
        next.except.push(keys);
        Ok(next)
    }

    /// Adds every instance matching all filters.
    ///
    /// # Errors
    ///
    /// See [`Filters::index_keys`].
    pub fn union(&self, filters: impl Into<Filters>) -> CoreResult<Self> {
        let keys = filters.into().index_keys(&self.schema)?;
        let mut next = self.clone();
        next.union.push(keys);
        Ok(next)
    }

    /// Commands that build the result into `dest`.
    ///
    /// Each `except`/`union` clause is itself an intersection of its
    /// filters, so it is staged in `scratch` before being combined.
    fn materialize(&self, dest: &Key, scratch: &Key) -> Vec<Command> {
        let dest = dest.to_string();
        let mut commands = vec![Command::SInterStore {
            dest: dest.clone(),
            keys: self.keys.clone(),
        }];
        for (clauses, diff) in [(&self.except, true), (&self.union, false)] {
            for keys in clauses {
                commands.push(Command::SInterStore {
                    dest: scratch.to_string(),
                    keys: keys.clone(),
                });
                let keys = vec![dest.clone(), scratch.to_string()];
                commands.push(if diff {
                    Command::SDiffStore {
                        dest: dest.clone(),
                        keys,
                    }
                } else {
                    Command::SUnionStore {
                        dest: dest.clone(),
                        keys,
                    }
                });
            }
        }
        commands
    }
}

impl Collection for MultiSet {
    fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    fn with_key<T, F>(&self, f: F) -> CoreResult<T>
    where
        F: FnOnce(&dyn Store, &str) -> CoreResult<T>,
    {
        let store = self.store.as_ref();
        let dest = TempKey::new(store, self.schema.name());
        let scratch = TempKey::new(store, self.schema.name());
        store.apply(self.materialize(&dest.key, &scratch.key))?;
        f(store, dest.key.as_str())
    }
}

impl fmt::Debug for MultiSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiSet")
            .field("model", &self.schema.name())
            .field("keys", &self.keys)
            .field("except", &self.except)
            .field("union", &self.union)
            .finish_non_exhaustive()
    }
}

/// A scratch key deleted when dropped, on every exit path.
struct TempKey<'s> {
    store: &'s dyn Store,
    key: Key,
}

impl<'s> TempKey<'s> {
    fn new(store: &'s dyn Store, model: &str) -> Self {
        Self {
            store,
            key: key::temp(model),
        }
    }
}

impl Drop for TempKey<'_> {
    fn drop(&mut self) {
        let del = Command::Del {
            keys: vec![self.key.to_string()],
        };
        match self.store.apply(vec![del]) {
            Ok(()) => trace!(key = %self.key, "released temp key"),
            Err(e) => warn!(key = %self.key, error = %e, "failed to release temp key"),
        }
    }
}
