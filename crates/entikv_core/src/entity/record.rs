//! The entity record.

use crate::entity::{ValidationErrors, Validations};
use crate::error::{CoreError, CoreResult};
use crate::key::{self, Key};
use crate::schema::{Attributes, Schema};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// One model instance: an optional id plus its attribute map.
///
/// An entity is a plain value until it is saved; all store access goes
/// through methods taking a [`crate::Database`]. The id is assigned by the
/// first successful save and never changes afterwards.
#[derive(Clone)]
pub struct Entity {
    pub(super) schema: Arc<Schema>,
    pub(super) id: Option<String>,
    pub(super) attributes: Attributes,
    /// Resolved references, keyed by reference name.
    pub(super) relations: HashMap<String, Entity>,
}

impl Entity {
    /// Creates an unsaved instance.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownField`] for a name that is not a stored
    /// attribute of `schema` (this includes `id`, which is never supplied).
    pub fn new<I, K, V>(schema: Arc<Schema>, attributes: I) -> CoreResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut entity = Self {
            schema,
            id: None,
            attributes: Attributes::new(),
            relations: HashMap::new(),
        };
        entity.merge(attributes)?;
        Ok(entity)
    }

    /// Rebuilds a persisted instance from its stored hash.
    ///
    /// Fields the schema no longer declares are kept so that a later save
    /// does not silently drop them.
    pub(crate) fn hydrate(schema: Arc<Schema>, id: String, row: HashMap<String, String>) -> Self {
        Self {
            schema,
            id: Some(id),
            attributes: row.into_iter().collect(),
            relations: HashMap::new(),
        }
    }

    /// Returns the schema.
    #[must_use]
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Returns the model name.
    #[must_use]
    pub fn model(&self) -> &str {
        self.schema.name()
    }

    /// Returns the id.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::MissingId`] before the first save.
    pub fn id(&self) -> CoreResult<&str> {
        self.id
            .as_deref()
            .ok_or_else(|| CoreError::missing_id(self.model()))
    }

    /// Returns the attribute hash key `<Model>:<id>`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::MissingId`] before the first save.
    pub fn key(&self) -> CoreResult<Key> {
        Ok(key::attributes(self.model(), self.id()?))
    }

    /// Returns true once the instance has an id.
    #[must_use]
    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    /// Returns an attribute value.
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Returns every attribute.
    #[must_use]
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Sets an attribute locally. Nothing is written until the next save.
    ///
    /// Changing a reference attribute drops the cached target.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownField`] if `name` is not a stored
    /// attribute.
    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) -> CoreResult<()> {
        self.ensure_attribute(name)?;
        let value = value.into();
        if self.attr(name) != Some(value.as_str()) {
            self.forget_reference(name);
        }
        self.attributes.insert(name.to_string(), value);
        Ok(())
    }

    /// Clears an attribute locally, returning its old value.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownField`] if `name` is not a stored
    /// attribute.
    pub fn remove_attr(&mut self, name: &str) -> CoreResult<Option<String>> {
        self.ensure_attribute(name)?;
        self.forget_reference(name);
        Ok(self.attributes.remove(name))
    }

    /// Sets several attributes locally.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownField`] on the first undeclared name;
    /// attributes before it have already been applied.
    pub fn merge<I, K, V>(&mut self, attributes: I) -> CoreResult<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (name, value) in attributes {
            let name: String = name.into();
            self.set_attr(&name, value)?;
        }
        Ok(())
    }

    /// Runs the schema's validation hook.
    #[must_use]
    pub fn validate(&self) -> ValidationErrors {
        let mut validations = Validations::new(self);
        if let Some(hook) = self.schema.validator() {
            hook(&mut validations);
        }
        validations.into_errors()
    }

    /// Returns true if validation passes.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }

    pub(super) fn ensure_attribute(&self, name: &str) -> CoreResult<()> {
        if self.schema.is_attribute(name) {
            Ok(())
        } else {
            Err(CoreError::unknown_field(self.model(), name))
        }
    }

    fn forget_reference(&mut self, attribute: &str) {
        if let Some(reference) = self.schema.reference_for_attribute(attribute) {
            self.relations.remove(reference);
        }
    }
}

/// Two entities are equal when both are persisted under the same key.
/// Unsaved instances are equal to nothing, themselves included.
impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        match (&self.id, &other.id) {
            (Some(a), Some(b)) => a == b && self.model() == other.model(),
            _ => false,
        }
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("model", &self.model())
            .field("id", &self.id)
            .field("attributes", &self.attributes)
            .finish_non_exhaustive()
    }
}
