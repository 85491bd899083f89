//! Model schemas.
//!
//! A [`Schema`] is the static description of a model: an ordered list of
//! field descriptors plus the declared indices and uniques. It is built
//! once through [`SchemaBuilder`] and never mutated afterwards; entities
//! read and write fields through one generic path keyed by field name.

use crate::entity::Validations;
use crate::error::{CoreError, CoreResult};
use crate::key;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// Stored attribute values, keyed by field name.
pub type Attributes = BTreeMap<String, String>;

/// Derives index values from the stored attributes.
pub type ComputeFn = Arc<dyn Fn(&Attributes) -> Vec<String> + Send + Sync>;

/// Validation hook run by `save`.
pub type ValidateFn = Arc<dyn Fn(&mut Validations<'_>) + Send + Sync>;

/// What a field is.
#[derive(Clone)]
pub enum FieldKind {
    /// A stored string attribute.
    Attribute,
    /// A counter living in `<Model>:<id>:counters`.
    Counter,
    /// A value computed from the stored attributes; may be indexed.
    Computed(ComputeFn),
    /// A reference to another model, stored as the `attribute` field.
    Reference {
        /// Target model name.
        model: String,
        /// Stored attribute holding the target id (`<name>_id`).
        attribute: String,
    },
    /// A set of members of another model at `<Model>:<id>:<name>`.
    Set {
        /// Member model name.
        model: String,
    },
    /// Every instance of another model referencing this one.
    Collection {
        /// Referencing model name.
        model: String,
        /// Name of the reference on the referencing model.
        reference: String,
    },
}

impl fmt::Debug for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Attribute => f.write_str("Attribute"),
            Self::Counter => f.write_str("Counter"),
            Self::Computed(_) => f.write_str("Computed"),
            Self::Reference { model, attribute } => f
                .debug_struct("Reference")
                .field("model", model)
                .field("attribute", attribute)
                .finish(),
            Self::Set { model } => f.debug_struct("Set").field("model", model).finish(),
            Self::Collection { model, reference } => f
                .debug_struct("Collection")
                .field("model", model)
                .field("reference", reference)
                .finish(),
        }
    }
}

/// One declared field.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    name: String,
    kind: FieldKind,
}

impl FieldDescriptor {
    /// Returns the field name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the field kind.
    #[must_use]
    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    /// Returns true for fields persisted in the attribute hash.
    #[must_use]
    pub fn is_stored(&self) -> bool {
        matches!(self.kind, FieldKind::Attribute)
    }
}

/// Immutable description of a model.
pub struct Schema {
    name: String,
    fields: Vec<FieldDescriptor>,
    indices: Vec<String>,
    uniques: Vec<String>,
    validator: Option<ValidateFn>,
}

impl Schema {
    /// Starts declaring a model.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder::new(name)
    }

    /// Returns the model name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns every field in declaration order.
    #[must_use]
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Looks a field up by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Returns the indexed attribute names.
    #[must_use]
    pub fn indices(&self) -> &[String] {
        &self.indices
    }

    /// Returns the unique attribute names.
    #[must_use]
    pub fn uniques(&self) -> &[String] {
        &self.uniques
    }

    /// Returns true if `name` is an indexed attribute.
    #[must_use]
    pub fn is_index(&self, name: &str) -> bool {
        self.indices.iter().any(|i| i == name)
    }

    /// Returns true if `name` is a unique attribute.
    #[must_use]
    pub fn is_unique(&self, name: &str) -> bool {
        self.uniques.iter().any(|u| u == name)
    }

    /// Returns true if `name` is a stored attribute.
    #[must_use]
    pub fn is_attribute(&self, name: &str) -> bool {
        self.field(name).is_some_and(FieldDescriptor::is_stored)
    }

    /// Returns true if `name` is a counter.
    #[must_use]
    pub fn is_counter(&self, name: &str) -> bool {
        self.field(name)
            .is_some_and(|f| matches!(f.kind, FieldKind::Counter))
    }

    /// Returns the stored attribute names in declaration order.
    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(|f| f.is_stored())
            .map(|f| f.name.as_str())
    }

    /// Returns the declared sub-collection set names.
    pub fn set_names(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(|f| matches!(f.kind, FieldKind::Set { .. }))
            .map(|f| f.name.as_str())
    }

    /// Returns `(target model, stored attribute)` for a declared reference.
    #[must_use]
    pub fn reference(&self, name: &str) -> Option<(&str, &str)> {
        match self.field(name).map(FieldDescriptor::kind) {
            Some(FieldKind::Reference { model, attribute }) => Some((model, attribute)),
            _ => None,
        }
    }

    /// Returns the name of the reference stored in `attribute`, if any.
    #[must_use]
    pub fn reference_for_attribute(&self, attribute: &str) -> Option<&str> {
        self.fields.iter().find_map(|f| match &f.kind {
            FieldKind::Reference { attribute: a, .. } if a == attribute => Some(f.name.as_str()),
            _ => None,
        })
    }

    /// Returns the current value(s) of an indexable attribute.
    ///
    /// Stored attributes yield zero or one value; computed attributes yield
    /// whatever their function returns, deduplicated in order.
    #[must_use]
    pub fn values_of(&self, name: &str, attributes: &Attributes) -> Vec<String> {
        match self.field(name).map(FieldDescriptor::kind) {
            Some(FieldKind::Attribute) => attributes.get(name).cloned().into_iter().collect(),
            Some(FieldKind::Computed(compute)) => {
                let mut seen = HashSet::new();
                compute(attributes)
                    .into_iter()
                    .filter(|v| seen.insert(v.clone()))
                    .collect()
            }
            _ => Vec::new(),
        }
    }

    /// Returns the validation hook.
    #[must_use]
    pub fn validator(&self) -> Option<&ValidateFn> {
        self.validator.as_ref()
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("name", &self.name)
            .field("fields", &self.fields)
            .field("indices", &self.indices)
            .field("uniques", &self.uniques)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Schema`].
///
/// # Example
///
/// ```rust
/// use entikv_core::Schema;
///
/// let schema = Schema::builder("User")
///     .attribute("email")
///     .attribute("name")
///     .counter("votes")
///     .unique("email")
///     .index("name")
///     .computed("domain", |attrs| {
///         attrs
///             .get("email")
///             .and_then(|e| e.split('@').nth(1))
///             .map(|d| vec![d.to_string()])
///             .unwrap_or_default()
///     })
///     .index("domain")
///     .build()
///     .unwrap();
///
/// assert!(schema.is_unique("email"));
/// ```
pub struct SchemaBuilder {
    name: String,
    fields: Vec<FieldDescriptor>,
    indices: Vec<String>,
    uniques: Vec<String>,
    validator: Option<ValidateFn>,
}

impl SchemaBuilder {
    /// Creates a builder for the named model.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            indices: Vec::new(),
            uniques: Vec::new(),
            validator: None,
        }
    }

    fn field(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.push(FieldDescriptor {
            name: name.into(),
            kind,
        });
        self
    }

    /// Declares a stored attribute.
    #[must_use]
    pub fn attribute(self, name: impl Into<String>) -> Self {
        self.field(name, FieldKind::Attribute)
    }

    /// Declares a counter.
    #[must_use]
    pub fn counter(self, name: impl Into<String>) -> Self {
        self.field(name, FieldKind::Counter)
    }

    /// Declares a computed attribute.
    #[must_use]
    pub fn computed<F>(self, name: impl Into<String>, compute: F) -> Self
    where
        F: Fn(&Attributes) -> Vec<String> + Send + Sync + 'static,
    {
        self.field(name, FieldKind::Computed(Arc::new(compute)))
    }

    /// Declares an index on a stored or computed attribute.
    #[must_use]
    pub fn index(mut self, name: impl Into<String>) -> Self {
        self.indices.push(name.into());
        self
    }

    /// Declares a uniqueness constraint on a stored or computed attribute.
    #[must_use]
    pub fn unique(mut self, name: impl Into<String>) -> Self {
        self.uniques.push(name.into());
        self
    }

    /// Declares a reference to another model.
    ///
    /// The target id is stored in the indexed attribute `<name>_id`.
    #[must_use]
    pub fn reference(self, name: impl Into<String>, model: impl Into<String>) -> Self {
        let name = name.into();
        let attribute = format!("{name}_id");
        self.field(
            name,
            FieldKind::Reference {
                model: model.into(),
                attribute: attribute.clone(),
            },
        )
        .attribute(attribute.clone())
        .index(attribute)
    }

    /// Declares a set of another model's instances.
    #[must_use]
    pub fn set(self, name: impl Into<String>, model: impl Into<String>) -> Self {
        self.field(
            name,
            FieldKind::Set {
                model: model.into(),
            },
        )
    }

    /// Declares the reverse side of another model's reference.
    #[must_use]
    pub fn collection(
        self,
        name: impl Into<String>,
        model: impl Into<String>,
        reference: impl Into<String>,
    ) -> Self {
        self.field(
            name,
            FieldKind::Collection {
                model: model.into(),
                reference: reference.into(),
            },
        )
    }

    /// Sets the validation hook.
    #[must_use]
    pub fn validate<F>(mut self, validate: F) -> Self
    where
        F: Fn(&mut Validations<'_>) + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(validate));
        self
    }

    /// Checks the declaration and freezes it.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidSchema`] for an empty or malformed model
    /// name, duplicate or reserved field names, and indices or uniques that
    /// do not name a stored or computed attribute.
    pub fn build(self) -> CoreResult<Arc<Schema>> {
        check_segment("model name", &self.name)?;

        let mut seen = HashSet::new();
        for field in &self.fields {
            check_segment("field name", &field.name)?;
            if field.name == "id" || field.name == key::COUNTERS {
                return Err(CoreError::invalid_schema(format!(
                    "{}: `{}` is reserved",
                    self.name, field.name
                )));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(CoreError::invalid_schema(format!(
                    "{}: field `{}` declared twice",
                    self.name, field.name
                )));
            }
        }

        for (what, names) in [("index", &self.indices), ("unique", &self.uniques)] {
            let mut declared = HashSet::new();
            for name in names {
                let indexable = self.fields.iter().any(|f| {
                    &f.name == name
                        && matches!(f.kind, FieldKind::Attribute | FieldKind::Computed(_))
                });
                if !indexable {
                    return Err(CoreError::invalid_schema(format!(
                        "{}: {what} `{name}` is not a stored or computed attribute",
                        self.name
                    )));
                }
                if !declared.insert(name) {
                    return Err(CoreError::invalid_schema(format!(
                        "{}: {what} `{name}` declared twice",
                        self.name
                    )));
                }
            }
        }

        Ok(Arc::new(Schema {
            name: self.name,
            fields: self.fields,
            indices: self.indices,
            uniques: self.uniques,
            validator: self.validator,
        }))
    }
}

fn check_segment(what: &str, value: &str) -> CoreResult<()> {
    if value.is_empty() || value.contains(crate::key::SEPARATOR) {
        return Err(CoreError::invalid_schema(format!(
            "{what} {value:?} must be non-empty and must not contain ':'"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post_schema() -> Arc<Schema> {
        Schema::builder("Post")
            .attribute("title")
            .attribute("tags")
            .computed("tag", |attrs| {
                attrs
                    .get("tags")
                    .map(|t| t.split(',').map(|s| s.trim().to_string()).collect())
                    .unwrap_or_default()
            })
            .index("tag")
            .reference("author", "User")
            .set("likes", "User")
            .build()
            .unwrap()
    }

    #[test]
    fn reference_declares_indexed_attribute() {
        let schema = post_schema();
        assert!(schema.is_attribute("author_id"));
        assert!(schema.is_index("author_id"));
        assert_eq!(schema.reference("author"), Some(("User", "author_id")));
        assert_eq!(schema.reference_for_attribute("author_id"), Some("author"));
    }

    #[test]
    fn computed_values_are_deduplicated() {
        let schema = post_schema();
        let mut attrs = Attributes::new();
        attrs.insert("tags".into(), "rust, db, rust".into());
        assert_eq!(schema.values_of("tag", &attrs), vec!["rust", "db"]);
        assert!(schema.values_of("title", &attrs).is_empty());
    }

    #[test]
    fn field_lookup_preserves_order() {
        let schema = post_schema();
        let names: Vec<&str> = schema.fields().iter().map(FieldDescriptor::name).collect();
        assert_eq!(names, vec!["title", "tags", "tag", "author", "author_id", "likes"]);
        assert_eq!(schema.set_names().collect::<Vec<_>>(), vec!["likes"]);
        assert_eq!(
            schema.attribute_names().collect::<Vec<_>>(),
            vec!["title", "tags", "author_id"]
        );
    }

    #[test]
    fn rejects_index_on_unknown_attribute() {
        let err = Schema::builder("User").index("email").build().unwrap_err();
        assert!(matches!(err, CoreError::InvalidSchema { .. }));
    }

    #[test]
    fn rejects_index_on_counter() {
        let err = Schema::builder("User")
            .counter("votes")
            .index("votes")
            .build()
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidSchema { .. }));
    }

    #[test]
    fn rejects_reserved_and_duplicate_fields() {
        assert!(Schema::builder("User").attribute("id").build().is_err());
        let err = Schema::builder("User")
            .counter("votes")
            .set("counters", "User")
            .build()
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidSchema { .. }));
        assert!(Schema::builder("User").attribute("counters").build().is_err());
        assert!(Schema::builder("User")
            .attribute("name")
            .attribute("name")
            .build()
            .is_err());
        assert!(Schema::builder("Us:er").build().is_err());
        assert!(Schema::builder("").build().is_err());
    }
}
