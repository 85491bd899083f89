//! # EntiKV Store
//!
//! The key-value store protocol used by EntiKV and its implementations.
//!
//! This crate is the lowest layer of EntiKV. A [`Store`] is one connection
//! to a server speaking the Redis data model: hashes, sets, `SORT`,
//! optimistic locking through `WATCH` / `MULTI` / `EXEC`, and server-side
//! scripts addressed by SHA-1.
//!
//! ## Design Principles
//!
//! - Stores know nothing about models, keys layouts or indices
//! - Every call is a blocking request/response
//! - Watch state belongs to a connection, never to the server
//! - Must be `Send + Sync` so a connection can be cached and shared
//!
//! ## Available Stores
//!
//! - [`InMemoryStore`] - connections to a process-local [`MemoryServer`]
//! - [`RedisStore`] - a Redis connection (feature `redis`, on by default)
//!
//! ## Example
//!
//! ```rust
//! use entikv_store::{Command, InMemoryStore, Store};
//!
//! let store = InMemoryStore::new();
//! store.watch(&["User:1".to_string()]).unwrap();
//! let committed = store
//!     .exec(vec![Command::HSet {
//!         key: "User:1".into(),
//!         field: "name".into(),
//!         value: "ann".into(),
//!     }])
//!     .unwrap();
//! assert!(committed);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod endpoint;
mod error;
mod memory;
#[cfg(feature = "redis")]
mod remote;

pub use backend::{script_sha, Command, ScriptValue, SortArgs, Store};
pub use endpoint::Endpoint;
pub use error::{StoreError, StoreResult};
pub use memory::{InMemoryStore, MemoryServer, ScriptHandler};
#[cfg(feature = "redis")]
pub use remote::RedisStore;
