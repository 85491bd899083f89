//! Error types for store operations.

use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur while talking to a store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The Redis client reported an error (transport or server reply).
    #[cfg(feature = "redis")]
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// The store has no script cached under this hash.
    #[error("no script cached for sha {sha}")]
    NoScript {
        /// SHA-1 of the requested script.
        sha: String,
    },

    /// A command was issued against a key holding another type.
    #[error("wrong type for key {key}")]
    WrongType {
        /// The offending key.
        key: String,
    },

    /// An increment was issued against a non-integer value.
    #[error("value at {key} is not an integer")]
    NotInteger {
        /// The offending key.
        key: String,
    },

    /// A server-side script failed.
    #[error("script error: {0}")]
    Script(String),

    /// A command was malformed or rejected.
    #[error("command error: {0}")]
    Command(String),
}

impl StoreError {
    /// Creates a wrong type error.
    pub fn wrong_type(key: impl Into<String>) -> Self {
        Self::WrongType { key: key.into() }
    }

    /// Creates a command error.
    pub fn command(message: impl Into<String>) -> Self {
        Self::Command(message.into())
    }

    /// Creates the error an increment past the `i64` range raises.
    pub fn overflow() -> Self {
        Self::command("increment or decrement would overflow")
    }

    /// Returns true if the store reported a script cache miss.
    #[must_use]
    pub fn is_no_script(&self) -> bool {
        matches!(self, Self::NoScript { .. })
    }
}
