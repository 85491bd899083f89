//! Database handle.

use crate::collection::{hydrate, Collection, Filters, MultiSet, Set};
use crate::config::Config;
use crate::connection::ConnectionManager;
use crate::entity::Entity;
use crate::error::{CoreError, CoreResult};
use crate::key;
use crate::registry::Registry;
use crate::schema::Schema;
use crate::script::{DirectoryScripts, ScriptRunner, ScriptSource, StaticScripts};
use entikv_store::{ScriptValue, Store};
use std::fmt;
use std::sync::Arc;

/// The main database handle.
///
/// `Database` ties together the configuration, the per-thread connection
/// cache, the model registry and the script runner. It is cheap to clone;
/// clones share all of them.
///
/// # Example
///
/// ```rust
/// use entikv_core::{Collection, Database, Entity, Schema};
///
/// let db = Database::in_memory();
/// let users = db
///     .register(
///         Schema::builder("User")
///             .attribute("email")
///             .attribute("fname")
///             .unique("email")
///             .index("fname")
///             .build()
///             .unwrap(),
///     )
///     .unwrap();
///
/// let ann = Entity::create(&db, users.clone(), [("email", "ann@x.io"), ("fname", "Ann")]).unwrap();
///
/// let found = db.find(&users, [("fname", "Ann")]).unwrap();
/// assert_eq!(found.ids().unwrap(), vec![ann.id().unwrap().to_string()]);
/// assert_eq!(db.with(&users, "email", "ann@x.io").unwrap(), Some(ann));
/// ```
#[derive(Clone)]
pub struct Database {
    inner: Arc<Inner>,
}

struct Inner {
    config: Arc<Config>,
    connections: ConnectionManager,
    registry: Registry,
    scripts: ScriptRunner,
}

impl Database {
    /// Opens a database handle.
    ///
    /// Scripts are read from the configured script directory, if any.
    /// No connection is opened until first use.
    #[must_use]
    pub fn open(config: Config) -> Self {
        let scripts: Arc<dyn ScriptSource> = match &config.script_dir {
            Some(dir) => Arc::new(DirectoryScripts::new(dir)),
            None => Arc::new(StaticScripts::new()),
        };
        Self::with_scripts(config, scripts)
    }

    /// Opens a database handle reading scripts from `scripts`.
    #[must_use]
    pub fn with_scripts(config: Config, scripts: Arc<dyn ScriptSource>) -> Self {
        let config = Arc::new(config);
        Self {
            inner: Arc::new(Inner {
                connections: ConnectionManager::new(Arc::clone(&config)),
                config,
                registry: Registry::new(),
                scripts: ScriptRunner::new(scripts),
            }),
        }
    }

    /// Opens a handle over a private in-memory store.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::open(Config::default())
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Registers a model so references to it can be resolved.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidSchema`] if another schema is registered
    /// under the same name.
    pub fn register(&self, schema: Arc<Schema>) -> CoreResult<Arc<Schema>> {
        self.inner.registry.register(schema)
    }

    /// Looks a registered model up by name.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ModelNotFound`] for an unknown name.
    pub fn schema(&self, name: &str) -> CoreResult<Arc<Schema>> {
        self.inner.registry.resolve(name)
    }

    /// Returns every registered model name, sorted.
    #[must_use]
    pub fn models(&self) -> Vec<String> {
        self.inner.registry.names()
    }

    /// Returns the current thread's connection for a model.
    ///
    /// # Errors
    ///
    /// Returns a store error if the endpoint cannot be reached.
    pub fn connection(&self, model: &str) -> CoreResult<Arc<dyn Store>> {
        self.inner.connections.get(model)
    }

    /// Drops the current thread's connection for a model.
    pub fn reset_connection(&self, model: &str) {
        self.inner.connections.reset(model);
    }

    /// Drops every cached connection.
    pub fn reset_connections(&self) {
        self.inner.connections.reset_all();
    }

    /// Returns true if `id` is a live instance, i.e. a member of
    /// `<Model>:all`.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub fn exists(&self, schema: &Schema, id: &str) -> CoreResult<bool> {
        let store = self.connection(schema.name())?;
        Ok(store.sismember(key::all(schema.name()).as_str(), id)?)
    }

    /// Loads an instance, or `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub fn fetch(&self, schema: &Arc<Schema>, id: &str) -> CoreResult<Option<Entity>> {
        self.all(schema)?.get(id)
    }

    /// Loads several instances in one round trip, skipping ids without a
    /// stored hash.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub fn fetch_many(&self, schema: &Arc<Schema>, ids: &[String]) -> CoreResult<Vec<Entity>> {
        let store = self.connection(schema.name())?;
        let entities = hydrate(store.as_ref(), schema, ids.to_vec())?;
        Ok(entities
            .into_iter()
            .filter(|e| !e.attributes().is_empty())
            .collect())
    }

    /// Returns the set of every instance.
    ///
    /// # Errors
    ///
    /// Returns a store error if no connection can be opened.
    pub fn all(&self, schema: &Arc<Schema>) -> CoreResult<Set> {
        Ok(Set::new(
            key::all(schema.name()),
            Arc::clone(schema),
            self.connection(schema.name())?,
        ))
    }

    /// Returns the instances matching every filter.
    ///
    /// # Errors
    ///
    /// See [`Filters::index_keys`].
    pub fn find(&self, schema: &Arc<Schema>, filters: impl Into<Filters>) -> CoreResult<MultiSet> {
        let keys = filters.into().index_keys(schema)?;
        Ok(MultiSet::new(
            Arc::clone(schema),
            self.connection(schema.name())?,
            keys,
        ))
    }

    /// Looks an instance up by a unique attribute.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::IndexNotFound`] if `attribute` is not unique.
    pub fn with(
        &self,
        schema: &Arc<Schema>,
        attribute: &str,
        value: &str,
    ) -> CoreResult<Option<Entity>> {
        if !schema.is_unique(attribute) {
            return Err(CoreError::index_not_found(schema.name(), attribute));
        }
        let store = self.connection(schema.name())?;
        match store.hget(key::uniques(schema.name(), attribute).as_str(), value)? {
            Some(id) => self.fetch(schema, &id),
            None => Ok(None),
        }
    }

    /// Runs a named script on the connection of `context`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ScriptLoad`] or a store error.
    pub fn run_script(
        &self,
        context: &str,
        name: &str,
        keys: &[String],
        args: &[String],
    ) -> CoreResult<ScriptValue> {
        let store = self.connection(context)?;
        self.inner.scripts.run(store.as_ref(), name, keys, args)
    }

    /// Returns the script runner.
    #[must_use]
    pub fn scripts(&self) -> &ScriptRunner {
        &self.inner.scripts
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("config", &self.inner.config)
            .field("models", &self.models())
            .field("connections", &self.inner.connections.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use entikv_store::{Endpoint, MemoryServer};

    fn user_schema() -> Arc<Schema> {
        Schema::builder("User")
            .attribute("email")
            .attribute("fname")
            .unique("email")
            .index("fname")
            .build()
            .unwrap()
    }

    #[test]
    fn clones_share_state() {
        let db = Database::in_memory();
        let clone = db.clone();
        db.register(user_schema()).unwrap();
        assert_eq!(clone.models(), vec!["User"]);
    }

    #[test]
    fn fetch_checks_membership() {
        let db = Database::in_memory();
        let users = db.register(user_schema()).unwrap();
        assert!(db.fetch(&users, "1").unwrap().is_none());
        let ann = Entity::create(&db, Arc::clone(&users), [("email", "a@x.io")]).unwrap();
        let loaded = db.fetch(&users, ann.id().unwrap()).unwrap().unwrap();
        assert_eq!(loaded.attr("email"), Some("a@x.io"));
        assert!(db.exists(&users, ann.id().unwrap()).unwrap());
    }

    #[test]
    fn fetch_many_skips_missing_ids() {
        let db = Database::in_memory();
        let users = db.register(user_schema()).unwrap();
        let a = Entity::create(&db, Arc::clone(&users), [("email", "a@x.io")]).unwrap();
        let b = Entity::create(&db, Arc::clone(&users), [("email", "b@x.io")]).unwrap();
        let ids = vec![b.id().unwrap().to_string(), "99".into(), a.id().unwrap().to_string()];
        assert_eq!(db.fetch_many(&users, &ids).unwrap(), vec![b, a]);
    }

    #[test]
    fn with_requires_unique_attribute() {
        let db = Database::in_memory();
        let users = db.register(user_schema()).unwrap();
        let err = db.with(&users, "fname", "Ann").unwrap_err();
        assert!(matches!(err, CoreError::IndexNotFound { .. }));
        assert!(db.with(&users, "email", "nobody@x.io").unwrap().is_none());
    }

    #[test]
    fn handles_on_one_server_see_each_other() {
        let server = MemoryServer::new();
        let a = Database::open(Config::new().endpoint(Endpoint::Memory(server.clone())));
        let b = Database::open(Config::new().endpoint(Endpoint::Memory(server)));
        let users = user_schema();
        Entity::create(&a, Arc::clone(&users), [("email", "a@x.io")]).unwrap();
        assert_eq!(b.all(&users).unwrap().size().unwrap(), 1);
    }

    #[test]
    fn run_script_uses_context_connection() {
        let server = MemoryServer::new();
        server.define_script("return 1", |_, _, _| Ok(ScriptValue::Int(1)));
        let db = Database::with_scripts(
            Config::new().endpoint(Endpoint::Memory(server)),
            Arc::new(StaticScripts::new().with("one", "return 1")),
        );
        assert_eq!(db.run_script("User", "one", &[], &[]).unwrap(), ScriptValue::Int(1));
    }
}
