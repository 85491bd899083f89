//! Typed models.

use crate::collection::{Filters, MultiSet, Set};
use crate::database::Database;
use crate::entity::Entity;
use crate::error::CoreResult;
use crate::schema::Schema;
use std::sync::Arc;

/// A named model type wrapping an [`Entity`].
///
/// Implementors only provide [`Model::schema`]; everything else forwards to
/// the untyped layer and registers the schema on first use. The
/// [`crate::model!`] macro writes the whole implementation.
pub trait Model: From<Entity> + AsRef<Entity> + AsMut<Entity> + Sized {
    /// Returns the model's schema. Must return the same `Arc` every time.
    fn schema() -> Arc<Schema>;

    /// Builds an unsaved instance.
    ///
    /// # Errors
    ///
    /// See [`Entity::new`].
    fn build<I, K, V>(attributes: I) -> CoreResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Entity::new(Self::schema(), attributes).map(Self::from)
    }

    /// Builds and saves an instance.
    ///
    /// # Errors
    ///
    /// See [`Entity::create`].
    fn create<I, K, V>(db: &Database, attributes: I) -> CoreResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let schema = db.register(Self::schema())?;
        Entity::create(db, schema, attributes).map(Self::from)
    }

    /// Loads an instance by id.
    ///
    /// # Errors
    ///
    /// See [`Database::fetch`].
    fn fetch(db: &Database, id: &str) -> CoreResult<Option<Self>> {
        let schema = db.register(Self::schema())?;
        Ok(db.fetch(&schema, id)?.map(Self::from))
    }

    /// Looks an instance up by a unique attribute.
    ///
    /// # Errors
    ///
    /// See [`Database::with`].
    fn with(db: &Database, attribute: &str, value: &str) -> CoreResult<Option<Self>> {
        let schema = db.register(Self::schema())?;
        Ok(db.with(&schema, attribute, value)?.map(Self::from))
    }

    /// Queries by indexed attributes.
    ///
    /// # Errors
    ///
    /// See [`Database::find`].
    fn find(db: &Database, filters: impl Into<Filters>) -> CoreResult<MultiSet> {
        let schema = db.register(Self::schema())?;
        db.find(&schema, filters)
    }

    /// Returns every instance.
    ///
    /// # Errors
    ///
    /// See [`Database::all`].
    fn all(db: &Database) -> CoreResult<Set> {
        let schema = db.register(Self::schema())?;
        db.all(&schema)
    }

    /// Validates and persists.
    ///
    /// # Errors
    ///
    /// See [`Entity::save`].
    fn save(&mut self, db: &Database) -> CoreResult<()> {
        db.register(Self::schema())?;
        self.as_mut().save(db)
    }

    /// Removes every trace of the instance.
    ///
    /// # Errors
    ///
    /// See [`Entity::delete`].
    fn delete(&mut self, db: &Database) -> CoreResult<()> {
        self.as_mut().delete(db)
    }

    /// Returns the id.
    ///
    /// # Errors
    ///
    /// See [`Entity::id`].
    fn id(&self) -> CoreResult<&str> {
        self.as_ref().id()
    }

    /// Wraps loaded entities.
    #[must_use]
    fn wrap(entities: Vec<Entity>) -> Vec<Self> {
        entities.into_iter().map(Self::from).collect()
    }
}

/// Declares a model newtype over [`Entity`] with a static schema.
///
/// The schema builder expression is evaluated once, on the first call to
/// [`Model::schema`](crate::Model::schema).
///
/// # Panics
///
/// The generated `schema()` panics if the declaration is rejected by
/// [`SchemaBuilder::build`](crate::SchemaBuilder::build). Use the builder
/// directly when the schema is assembled at runtime.
///
/// ```rust
/// use entikv_core::{model, Database, Model, Schema};
///
/// model! {
///     /// A registered user.
///     pub struct User => Schema::builder("User")
///         .attribute("email")
///         .unique("email");
/// }
///
/// let db = Database::in_memory();
/// let user = User::create(&db, [("email", "ann@example.com")]).unwrap();
/// assert_eq!(user.id().unwrap(), "1");
/// ```
#[macro_export]
macro_rules! model {
    ($(#[$meta:meta])* $vis:vis struct $name:ident => $schema:expr;) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq)]
        $vis struct $name($crate::Entity);

        impl ::std::convert::From<$crate::Entity> for $name {
            fn from(entity: $crate::Entity) -> Self {
                Self(entity)
            }
        }

        impl ::std::convert::AsRef<$crate::Entity> for $name {
            fn as_ref(&self) -> &$crate::Entity {
                &self.0
            }
        }

        impl ::std::convert::AsMut<$crate::Entity> for $name {
            fn as_mut(&mut self) -> &mut $crate::Entity {
                &mut self.0
            }
        }

        impl ::std::ops::Deref for $name {
            type Target = $crate::Entity;

            fn deref(&self) -> &$crate::Entity {
                &self.0
            }
        }

        impl ::std::ops::DerefMut for $name {
            fn deref_mut(&mut self) -> &mut $crate::Entity {
                &mut self.0
            }
        }

        impl $crate::Model for $name {
            /// Returns the static schema, building it on first use.
            ///
            /// # Panics
            ///
            /// Panics if the declared schema is invalid.
            fn schema() -> ::std::sync::Arc<$crate::Schema> {
                static SCHEMA: ::std::sync::OnceLock<::std::sync::Arc<$crate::Schema>> =
                    ::std::sync::OnceLock::new();
                ::std::sync::Arc::clone(SCHEMA.get_or_init(|| {
                    match $crate::SchemaBuilder::build($schema) {
                        Ok(schema) => schema,
                        Err(e) => panic!("invalid schema for {}: {e}", stringify!($name)),
                    }
                }))
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use crate::{Collection, Database, Model, Schema};

    crate::model! {
        struct Note => Schema::builder("Note")
            .attribute("body")
            .attribute("topic")
            .index("topic");
    }

    crate::model! {
        struct Broken => Schema::builder("Broken")
            .attribute("body")
            .index("missing");
    }

    #[test]
    #[should_panic(expected = "invalid schema for Broken")]
    fn invalid_declaration_panics_on_first_use() {
        let _ = Broken::schema();
    }

    #[test]
    fn schema_is_built_once() {
        assert!(std::sync::Arc::ptr_eq(&Note::schema(), &Note::schema()));
    }

    #[test]
    fn typed_round_trip() {
        let db = Database::in_memory();
        let note = Note::create(&db, [("body", "hello"), ("topic", "misc")]).unwrap();
        let loaded = Note::fetch(&db, note.id().unwrap()).unwrap().unwrap();
        assert_eq!(loaded, note);
        assert_eq!(loaded.attr("body"), Some("hello"));

        let found = Note::wrap(Note::find(&db, [("topic", "misc")]).unwrap().fetch_all().unwrap());
        assert_eq!(found, vec![note]);
    }
}
