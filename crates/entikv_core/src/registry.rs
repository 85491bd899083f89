//! Model registry.

use crate::error::{CoreError, CoreResult};
use crate::schema::Schema;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Name to schema mapping used to resolve cross-model references.
///
/// References name their target model as a string and are resolved here
/// lazily, on first access, so models may refer to each other in any
/// declaration order.
#[derive(Debug, Default)]
pub struct Registry {
    schemas: RwLock<HashMap<String, Arc<Schema>>>,
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a schema and returns the registered instance.
    ///
    /// Registering the same `Arc` again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidSchema`] if a different schema is already
    /// registered under the same name.
    pub fn register(&self, schema: Arc<Schema>) -> CoreResult<Arc<Schema>> {
        if let Some(existing) = self.schemas.read().get(schema.name()) {
            return Self::same(existing, schema);
        }
        let mut schemas = self.schemas.write();
        match schemas.get(schema.name()) {
            Some(existing) => Self::same(existing, schema),
            None => {
                schemas.insert(schema.name().to_string(), Arc::clone(&schema));
                Ok(schema)
            }
        }
    }

    fn same(existing: &Arc<Schema>, schema: Arc<Schema>) -> CoreResult<Arc<Schema>> {
        if Arc::ptr_eq(existing, &schema) {
            Ok(schema)
        } else {
            Err(CoreError::invalid_schema(format!(
                "model {} is already registered with another schema",
                schema.name()
            )))
        }
    }

    /// Looks a schema up by model name.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ModelNotFound`] for an unknown name.
    pub fn resolve(&self, name: &str) -> CoreResult<Arc<Schema>> {
        self.schemas
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| CoreError::ModelNotFound {
                name: name.to_string(),
            })
    }

    /// Returns true if `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.schemas.read().contains_key(name)
    }

    /// Returns every registered model name, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.schemas.read().keys().cloned().collect();
        names.sort();
        names
    }
}
