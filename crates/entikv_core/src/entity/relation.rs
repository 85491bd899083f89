//! References and sub-collections.

use crate::collection::{Filters, MultiSet, Set};
use crate::database::Database;
use crate::entity::Entity;
use crate::error::{CoreError, CoreResult};
use crate::key;
use crate::schema::FieldKind;

impl Entity {
    /// Resolves a declared reference, loading the target on first access.
    ///
    /// The target is cached until the reference attribute changes. Returns
    /// `None` when the attribute is unset or the target no longer exists.
    ///
    /// # Errors
    ///
    /// - [`CoreError::UnknownField`] if `name` is not a declared reference
    /// - [`CoreError::ModelNotFound`] if the target model is not registered
    pub fn reference(&mut self, db: &Database, name: &str) -> CoreResult<Option<&Entity>> {
        let (model, attribute) = self
            .schema
            .reference(name)
            .ok_or_else(|| CoreError::unknown_field(self.model(), name))?;
        let Some(target_id) = self.attributes.get(attribute).cloned() else {
            self.relations.remove(name);
            return Ok(None);
        };

        let cached = self
            .relations
            .get(name)
            .is_some_and(|e| e.id.as_deref() == Some(target_id.as_str()));
        if !cached {
            let target = db.schema(model)?;
            match db.fetch(&target, &target_id)? {
                Some(entity) => {
                    self.relations.insert(name.to_string(), entity);
                }
                None => {
                    self.relations.remove(name);
                    return Ok(None);
                }
            }
        }
        Ok(self.relations.get(name))
    }

    /// Points a declared reference at `target` and caches it.
    ///
    /// # Errors
    ///
    /// - [`CoreError::UnknownField`] if `name` is not a declared reference
    /// - [`CoreError::InvalidOperation`] if `target` is of another model
    /// - [`CoreError::MissingId`] if `target` was never saved
    pub fn set_reference(&mut self, name: &str, target: &Entity) -> CoreResult<()> {
        let (model, attribute) = self
            .schema
            .reference(name)
            .ok_or_else(|| CoreError::unknown_field(self.model(), name))?;
        if target.model() != model {
            return Err(CoreError::invalid_operation(format!(
                "{}.{name} references {model}, not {}",
                self.model(),
                target.model()
            )));
        }
        let attribute = attribute.to_string();
        let id = target.id()?.to_string();
        self.attributes.insert(attribute, id);
        self.relations.insert(name.to_string(), target.clone());
        Ok(())
    }

    /// Returns a declared set, `<Model>:<id>:<name>`.
    ///
    /// The set lives on this model's connection.
    ///
    /// # Errors
    ///
    /// - [`CoreError::UnknownField`] if `name` is not a declared set
    /// - [`CoreError::MissingId`] if the instance was never saved
    /// - [`CoreError::ModelNotFound`] if the member model is not registered
    pub fn members(&self, db: &Database, name: &str) -> CoreResult<Set> {
        let Some(FieldKind::Set { model }) = self.schema.field(name).map(|f| f.kind()) else {
            return Err(CoreError::unknown_field(self.model(), name));
        };
        let key = key::collection(self.model(), self.id()?, name);
        Ok(Set::new(key, db.schema(model)?, db.connection(self.model())?))
    }

    /// Returns every instance of a declared reverse collection, i.e. the
    /// instances whose reference points at this one.
    ///
    /// # Errors
    ///
    /// - [`CoreError::UnknownField`] if `name` is not a declared collection
    /// - [`CoreError::MissingId`] if the instance was never saved
    /// - [`CoreError::ModelNotFound`] if the referencing model is not
    ///   registered
    /// - [`CoreError::InvalidSchema`] if that model lacks the reference
    pub fn collection(&self, db: &Database, name: &str) -> CoreResult<MultiSet> {
        let Some(FieldKind::Collection { model, reference }) =
            self.schema.field(name).map(|f| f.kind())
        else {
            return Err(CoreError::unknown_field(self.model(), name));
        };
        let id = self.id()?;
        let target = db.schema(model)?;
        let (_, attribute) = target.reference(reference).ok_or_else(|| {
            CoreError::invalid_schema(format!("{model} has no reference named {reference}"))
        })?;
        db.find(&target, Filters::new().eq(attribute, id))
    }
}
