//! Stored sets.

use crate::collection::{Collection, Filters, MultiSet};
use crate::entity::Entity;
use crate::error::{CoreError, CoreResult};
use crate::key::Key;
use crate::schema::Schema;
use entikv_store::{Command, Store};
use std::fmt;
use std::sync::Arc;

/// A collection backed by one stored set, such as `<Model>:all` or a
/// declared sub-collection `<Model>:<id>:<name>`.
#[derive(Clone)]
pub struct Set {
    key: Key,
    schema: Arc<Schema>,
    store: Arc<dyn Store>,
}

impl Set {
    /// Wraps the set at `key` whose members are instances of `schema`.
    #[must_use]
    pub fn new(key: Key, schema: Arc<Schema>, store: Arc<dyn Store>) -> Self {
        Self { key, schema, store }
    }

    /// Returns the set key.
    #[must_use]
    pub fn key(&self) -> &Key {
        &self.key
    }

    /// Adds a persisted instance.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::MissingId`] if `entity` was never saved.
    pub fn add(&self, entity: &Entity) -> CoreResult<()> {
        let id = self.member_id(entity)?;
        self.store.apply(vec![Command::SAdd {
            key: self.key.to_string(),
            members: vec![id],
        }])?;
        Ok(())
    }

    /// Removes an instance.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::MissingId`] if `entity` was never saved.
    pub fn delete(&self, entity: &Entity) -> CoreResult<()> {
        let id = self.member_id(entity)?;
        self.store.apply(vec![Command::SRem {
            key: self.key.to_string(),
            members: vec![id],
        }])?;
        Ok(())
    }

    /// Replaces the members with `entities` in one atomic block.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::MissingId`] if any entity was never saved, in
    /// which case the set is left untouched.
    pub fn replace(&self, entities: &[Entity]) -> CoreResult<()> {
        let ids = entities
            .iter()
            .map(|e| self.member_id(e))
            .collect::<CoreResult<Vec<_>>>()?;
        let mut commands = vec![Command::Del {
            keys: vec![self.key.to_string()],
        }];
        if !ids.is_empty() {
            commands.push(Command::SAdd {
                key: self.key.to_string(),
                members: ids,
            });
        }
        if !self.store.exec(commands)? {
            return Err(CoreError::Conflict {
                model: self.schema.name().to_string(),
                keys: vec![self.key.to_string()],
            });
        }
        Ok(())
    }

    /// Narrows the set to members matching every filter.
    ///
    /// # Errors
    ///
    /// See [`Filters::index_keys`].
    pub fn find(&self, filters: impl Into<Filters>) -> CoreResult<MultiSet> {
        self.as_multi().find(filters)
    }

    /// Removes members matching every filter.
    ///
    /// # Errors
    ///
    /// See [`Filters::index_keys`].
    pub fn except(&self, filters: impl Into<Filters>) -> CoreResult<MultiSet> {
        self.as_multi().except(filters)
    }

    /// Adds every instance matching the filters.
    ///
    /// # Errors
    ///
    /// See [`Filters::index_keys`].
    pub fn union(&self, filters: impl Into<Filters>) -> CoreResult<MultiSet> {
        self.as_multi().union(filters)
    }

    fn as_multi(&self) -> MultiSet {
        MultiSet::new(
            Arc::clone(&self.schema),
            Arc::clone(&self.store),
            vec![self.key.to_string()],
        )
    }

    fn member_id(&self, entity: &Entity) -> CoreResult<String> {
        if entity.model() != self.schema.name() {
            return Err(CoreError::invalid_operation(format!(
                "{} cannot hold {} instances",
                self.key,
                entity.model()
            )));
        }
        entity.id().map(str::to_string)
    }
}

impl Collection for Set {
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
        f(self.store.as_ref(), self.key.as_str())
    }
}

impl fmt::Debug for Set {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Set")
            .field("key", &self.key)
            .field("model", &self.schema.name())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key;
    use entikv_store::InMemoryStore;

    fn schema() -> Arc<Schema> {
        Schema::builder("Post")
            .attribute("title")
            .build()
            .unwrap()
    }

    fn persisted(schema: &Arc<Schema>, id: &str, store: &dyn Store) -> Entity {
        let mut attrs = std::collections::HashMap::new();
        attrs.insert("title".to_string(), format!("post {id}"));
        store
            .apply(vec![
                Command::HSet {
                    key: key::attributes("Post", id).into_string(),
                    field: "title".into(),
                    value: format!("post {id}"),
                },
                Command::SAdd {
                    key: key::all("Post").into_string(),
                    members: vec![id.to_string()],
                },
            ])
            .unwrap();
        Entity::hydrate(Arc::clone(schema), id.to_string(), attrs)
    }

    fn set() -> (Set, Arc<Schema>) {
        let schema = schema();
        let set = Set::new(
            key::collection("User", "1", "posts"),
            Arc::clone(&schema),
            Arc::new(InMemoryStore::new()),
        );
        (set, schema)
    }

    #[test]
    fn add_and_delete_members() {
        let (set, schema) = set();
        let a = persisted(&schema, "1", set.store());
        let b = persisted(&schema, "2", set.store());
        set.add(&a).unwrap();
        set.add(&b).unwrap();
        set.add(&a).unwrap();
        assert_eq!(set.size().unwrap(), 2);

        set.delete(&a).unwrap();
        assert!(!set.contains("1").unwrap());
        assert_eq!(set.fetch_all().unwrap(), vec![b]);
    }

    #[test]
    fn replace_swaps_members_atomically() {
        let (set, schema) = set();
        let a = persisted(&schema, "1", set.store());
        let b = persisted(&schema, "2", set.store());
        let c = persisted(&schema, "3", set.store());
        set.replace(&[a.clone(), b]).unwrap();
        set.replace(&[c.clone()]).unwrap();
        assert_eq!(set.ids().unwrap(), vec!["3".to_string()]);

        let unsaved = Entity::new(Arc::clone(&schema), [("title", "draft")]).unwrap();
        let err = set.replace(&[a, unsaved]).unwrap_err();
        assert!(matches!(err, CoreError::MissingId { .. }));
        assert_eq!(set.fetch_all().unwrap(), vec![c]);

        set.replace(&[]).unwrap();
        assert!(set.is_empty().unwrap());
    }

    #[test]
    fn rejects_other_models() {
        let (set, _) = set();
        let other = Schema::builder("User").build().unwrap();
        let user = Entity::hydrate(other, "1".into(), std::collections::HashMap::new());
        let err = set.add(&user).unwrap_err();
        assert!(matches!(err, CoreError::InvalidOperation { .. }));
    }

    #[test]
    fn get_requires_membership() {
        let (set, schema) = set();
        let a = persisted(&schema, "1", set.store());
        assert!(set.get("1").unwrap().is_none());
        set.add(&a).unwrap();
        assert_eq!(set.get("1").unwrap(), Some(a));
    }
}
