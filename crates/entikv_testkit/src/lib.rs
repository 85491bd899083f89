//! # EntiKV Testkit
//!
//! Test utilities for EntiKV.
//!
//! This crate provides:
//! - Database fixtures over in-memory or Redis endpoints
//! - Sample `User` / `Post` models covering every field kind
//! - Property-based test generators using proptest
//! - Concurrent save stress helpers
//!
//! ## Usage
//!
//! ```rust
//! use entikv_testkit::prelude::*;
//!
//! with_temp_db(|db| {
//!     let users = register_samples(db).users;
//!     let ann = create_user(db, &users, "ann@x.io", "Ann");
//!     assert!(db.exists(&users, ann.id().unwrap()).unwrap());
//! });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::stress::*;
}

pub use fixtures::*;
pub use generators::*;
pub use stress::*;
