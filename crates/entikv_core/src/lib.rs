//! # EntiKV Core
//!
//! Object to key-value mapping engine for EntiKV.
//!
//! This crate provides:
//! - Model schemas with indexed, unique, computed and counter fields
//! - Entities with transactional save / delete and id assignment
//! - Secondary index and uniqueness maintenance
//! - Set-algebra queries (`find`, `except`, `union`) and sorting
//! - Optimistic transactions over `WATCH` / `MULTI` / `EXEC`
//! - Per-thread connection management and a cached script runner
//! - Inspection and consistency checks for maintenance tooling
//!
//! ## Example
//!
//! ```rust
//! use entikv_core::{Collection, Database, Entity, Schema, SortOptions};
//!
//! let db = Database::in_memory();
//! let posts = db
//!     .register(
//!         Schema::builder("Post")
//!             .attribute("title")
//!             .attribute("status")
//!             .counter("votes")
//!             .index("status")
//!             .build()
//!             .unwrap(),
//!     )
//!     .unwrap();
//!
//! let a = Entity::create(&db, posts.clone(), [("title", "a"), ("status", "live")]).unwrap();
//! let b = Entity::create(&db, posts.clone(), [("title", "b"), ("status", "live")]).unwrap();
//! b.incr(&db, "votes", 5).unwrap();
//! a.incr(&db, "votes", 1).unwrap();
//!
//! let live = db.find(&posts, [("status", "live")]).unwrap();
//! let top = live.sort_by("votes", &SortOptions::new().order("DESC")).unwrap();
//! assert_eq!(top, vec![b, a]);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod collection;
mod config;
mod connection;
mod database;
mod entity;
mod error;
mod index;
pub mod key;
mod registry;
mod schema;
mod script;
mod stats;
mod transaction;
mod verify;

pub use collection::{hydrate, Collection, FilterValue, Filters, MultiSet, Set, SortOptions};
pub use config::Config;
pub use connection::ConnectionManager;
pub use database::Database;
pub use entity::{Entity, Model, ValidationErrors, Validations, Violation};
pub use error::{CoreError, CoreResult};
pub use index::{IndexMaintainer, IndexSnapshot};
pub use key::Key;
pub use registry::Registry;
pub use schema::{
    Attributes, ComputeFn, FieldDescriptor, FieldKind, Schema, SchemaBuilder, ValidateFn,
};
pub use script::{DirectoryScripts, LoadedScript, ScriptRunner, ScriptSource, StaticScripts};
pub use stats::{inspect, ModelStats};
pub use transaction::{Transaction, TransactionState, WriteBatch};
pub use verify::{verify, Finding, VerifyReport};

pub use entikv_store::Endpoint;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
