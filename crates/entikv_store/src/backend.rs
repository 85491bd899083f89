//! Store protocol definition.

use crate::error::StoreResult;
use sha1::{Digest, Sha1};
use std::collections::HashMap;

/// A single write command.
///
/// Commands are queued into a batch and sent either as a plain pipeline
/// ([`Store::apply`]) or inside an atomic block ([`Store::exec`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `HSET key field value`
    HSet {
        /// Hash key.
        key: String,
        /// Field name.
        field: String,
        /// Field value.
        value: String,
    },
    /// `HMSET key field value [field value ...]`
    HMSet {
        /// Hash key.
        key: String,
        /// Field/value pairs.
        fields: Vec<(String, String)>,
    },
    /// `HDEL key field`
    HDel {
        /// Hash key.
        key: String,
        /// Field name.
        field: String,
    },
    /// `HINCRBY key field by`
    HIncrBy {
        /// Hash key.
        key: String,
        /// Field name.
        field: String,
        /// Increment (may be negative).
        by: i64,
    },
    /// `SADD key member`
    SAdd {
        /// Set key.
        key: String,
        /// Members to add.
        members: Vec<String>,
    },
    /// `SREM key member`
    SRem {
        /// Set key.
        key: String,
        /// Members to remove.
        members: Vec<String>,
    },
    /// `DEL key`
    Del {
        /// Keys to delete.
        keys: Vec<String>,
    },
    /// `SINTERSTORE dest key [key ...]`
    SInterStore {
        /// Destination key.
        dest: String,
        /// Source keys.
        keys: Vec<String>,
    },
    /// `SUNIONSTORE dest key [key ...]`
    SUnionStore {
        /// Destination key.
        dest: String,
        /// Source keys.
        keys: Vec<String>,
    },
    /// `SDIFFSTORE dest key [key ...]`
    SDiffStore {
        /// Destination key.
        dest: String,
        /// Source keys; the first is the minuend.
        keys: Vec<String>,
    },
}

impl Command {
    /// Returns the command name as sent on the wire.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::HSet { .. } => "HSET",
            Self::HMSet { .. } => "HMSET",
            Self::HDel { .. } => "HDEL",
            Self::HIncrBy { .. } => "HINCRBY",
            Self::SAdd { .. } => "SADD",
            Self::SRem { .. } => "SREM",
            Self::Del { .. } => "DEL",
            Self::SInterStore { .. } => "SINTERSTORE",
            Self::SUnionStore { .. } => "SUNIONSTORE",
            Self::SDiffStore { .. } => "SDIFFSTORE",
        }
    }
}

/// Arguments of a `SORT` command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortArgs {
    /// `BY` pattern, e.g. `User:*->name`.
    pub by: Option<String>,
    /// `LIMIT offset count`.
    pub limit: Option<(usize, usize)>,
    /// Lexicographic instead of numeric comparison.
    pub alpha: bool,
    /// Descending order.
    pub desc: bool,
}

/// Reply of a server-side script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptValue {
    /// Nil reply.
    Nil,
    /// Integer reply.
    Int(i64),
    /// Bulk string reply.
    Bulk(String),
    /// Status reply (e.g. `OK`).
    Status(String),
    /// Multi-bulk reply.
    Array(Vec<ScriptValue>),
}

impl ScriptValue {
    /// Returns the integer value, if this is an integer reply.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            Self::Bulk(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Returns the string value of a bulk or status reply.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Bulk(s) | Self::Status(s) => Some(s),
            _ => None,
        }
    }
}

/// Returns the identifier the store uses to cache a script body.
///
/// This is the lowercase hex SHA-1 of the source, as used by `EVALSHA`.
#[must_use]
pub fn script_sha(source: &str) -> String {
    format!("{:x}", Sha1::digest(source.as_bytes()))
}

/// A connection to a key-value store speaking the Redis data model.
///
/// A `Store` is one logical connection: watch registrations belong to it,
/// and an atomic block opened with [`Store::exec`] is discarded when any key
/// watched on this connection changed since [`Store::watch`].
///
/// # Invariants
///
/// - Reads never mutate the keyspace
/// - `exec` applies every command or none of them
/// - `exec` and `unwatch` clear the watch list
/// - Implementations must be `Send + Sync`
pub trait Store: Send + Sync {
    /// Reads a string key.
    fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Atomically increments an integer key and returns the new value.
    fn incr(&self, key: &str) -> StoreResult<i64>;

    /// Reads one hash field.
    fn hget(&self, key: &str, field: &str) -> StoreResult<Option<String>>;

    /// Reads a whole hash. A missing key yields an empty map.
    fn hgetall(&self, key: &str) -> StoreResult<HashMap<String, String>>;

    /// Reads several hashes in a single round trip, in key order.
    fn hgetall_many(&self, keys: &[String]) -> StoreResult<Vec<HashMap<String, String>>>;

    /// Atomically increments a hash field and returns the new value.
    fn hincrby(&self, key: &str, field: &str, by: i64) -> StoreResult<i64>;

    /// Tests set membership.
    fn sismember(&self, key: &str, member: &str) -> StoreResult<bool>;

    /// Returns the cardinality of a set.
    fn scard(&self, key: &str) -> StoreResult<usize>;

    /// Returns all members of a set.
    fn smembers(&self, key: &str) -> StoreResult<Vec<String>>;

    /// Tests whether a key exists.
    fn exists(&self, key: &str) -> StoreResult<bool>;

    /// Returns every key matching a glob pattern.
    ///
    /// Intended for maintenance tooling only.
    fn keys(&self, pattern: &str) -> StoreResult<Vec<String>>;

    /// Removes every key of the selected database.
    ///
    /// Intended for test fixtures and maintenance tooling only.
    fn flushdb(&self) -> StoreResult<()>;

    /// Sorts the members of a set.
    fn sort(&self, key: &str, args: &SortArgs) -> StoreResult<Vec<String>>;

    /// Sends write commands as a plain (non-atomic) pipeline.
    fn apply(&self, commands: Vec<Command>) -> StoreResult<()>;

    /// Runs write commands inside an atomic block.
    ///
    /// Returns `false` when the block was discarded because a watched key
    /// changed; in that case no command was applied.
    fn exec(&self, commands: Vec<Command>) -> StoreResult<bool>;

    /// Registers keys for optimistic locking.
    fn watch(&self, keys: &[String]) -> StoreResult<()>;

    /// Drops every watch registration of this connection.
    fn unwatch(&self) -> StoreResult<()>;

    /// Runs a cached script by hash.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StoreError::NoScript`] when the store has no script
    /// cached under `sha`.
    fn eval_sha(&self, sha: &str, keys: &[String], args: &[String])
        -> StoreResult<ScriptValue>;

    /// Uploads and runs a script, caching it for later [`Store::eval_sha`].
    fn eval(&self, source: &str, keys: &[String], args: &[String]) -> StoreResult<ScriptValue>;
}
