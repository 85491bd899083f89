//! Error types for EntiKV core.

use crate::entity::ValidationErrors;
use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in EntiKV core operations.
///
/// Application-level failures (`MissingId`, `IndexNotFound`,
/// `UniqueIndexViolation`, `InvalidQuery`, `ValidationFailed`) are detected
/// locally before any write. `Conflict` is reported by the store when an
/// atomic block was discarded; the caller decides whether to retry.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Store error.
    #[error("store error: {0}")]
    Store(#[from] entikv_store::StoreError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Identity was accessed before the instance was persisted.
    #[error("{model} instance has no id yet")]
    MissingId {
        /// Model name.
        model: String,
    },

    /// A query filtered on an attribute that is not indexed.
    #[error("index not found: {model}.{attribute}")]
    IndexNotFound {
        /// Model name.
        model: String,
        /// The attribute used as a filter.
        attribute: String,
    },

    /// A save would duplicate a unique value.
    #[error("unique index violation: {model}.{attribute} = {value:?} is taken")]
    UniqueIndexViolation {
        /// Model name.
        model: String,
        /// Unique attribute.
        attribute: String,
        /// The duplicated value.
        value: String,
    },

    /// A query is not a well-formed attribute to value mapping.
    #[error("invalid query: {message}")]
    InvalidQuery {
        /// Description of the problem.
        message: String,
    },

    /// The atomic write block was discarded because a watched key changed.
    #[error("transaction conflict on {model}: watched keys changed ({keys:?})")]
    Conflict {
        /// Model the transaction was writing.
        model: String,
        /// Keys that were watched.
        keys: Vec<String>,
    },

    /// Validation failed; nothing was written.
    #[error("{model} is invalid: {errors}")]
    ValidationFailed {
        /// Model name.
        model: String,
        /// Collected violations.
        errors: ValidationErrors,
    },

    /// A field name is not declared in the schema.
    #[error("unknown field {model}.{field}")]
    UnknownField {
        /// Model name.
        model: String,
        /// Field name.
        field: String,
    },

    /// No model is registered under this name.
    #[error("model not found: {name}")]
    ModelNotFound {
        /// Requested model name.
        name: String,
    },

    /// A schema declaration is inconsistent.
    #[error("invalid schema: {message}")]
    InvalidSchema {
        /// Description of the problem.
        message: String,
    },

    /// A script body could not be loaded.
    #[error("cannot load script {name}: {message}")]
    ScriptLoad {
        /// Logical script name.
        name: String,
        /// Description of the failure.
        message: String,
    },

    /// Operation not permitted in current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why operation is invalid.
        message: String,
    },
}

impl CoreError {
    /// Creates a missing id error.
    pub fn missing_id(model: impl Into<String>) -> Self {
        Self::MissingId {
            model: model.into(),
        }
    }

    /// Creates an index not found error.
    pub fn index_not_found(model: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self::IndexNotFound {
            model: model.into(),
            attribute: attribute.into(),
        }
    }

    /// Creates an unknown field error.
    pub fn unknown_field(model: impl Into<String>, field: impl Into<String>) -> Self {
        Self::UnknownField {
            model: model.into(),
            field: field.into(),
        }
    }

    /// Creates an invalid query error.
    pub fn invalid_query(message: impl Into<String>) -> Self {
        Self::InvalidQuery {
            message: message.into(),
        }
    }

    /// Creates an invalid schema error.
    pub fn invalid_schema(message: impl Into<String>) -> Self {
        Self::InvalidSchema {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Returns true if a watched key changed and the commit was discarded.
    ///
    /// Conflicts are the only failures worth retrying as-is.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_is_distinguishable() {
        let conflict = CoreError::Conflict {
            model: "User".into(),
            keys: vec!["User:1".into()],
        };
        let unique = CoreError::UniqueIndexViolation {
            model: "User".into(),
            attribute: "email".into(),
            value: "a@b.c".into(),
        };
        assert!(conflict.is_conflict());
        assert!(!unique.is_conflict());
    }

    #[test]
    fn messages_name_the_model() {
        let err = CoreError::index_not_found("User", "age");
        assert_eq!(err.to_string(), "index not found: User.age");
        assert_eq!(CoreError::missing_id("Post").to_string(), "Post instance has no id yet");
    }
}
