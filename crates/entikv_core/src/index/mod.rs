//! Secondary index and uniqueness maintenance.
//!
//! Indices are plain sets (`<Model>:indices:<attr>:<value>`) and uniques are
//! hashes (`<Model>:uniques:<attr>`, value -> id). Neither is ever written
//! on its own: the [`IndexMaintainer`] queues its commands into the same
//! atomic batch as the attribute hash write, so index state moves together
//! with the data it is derived from.
//!
//! # Invariants
//!
//! - An index set for `(attr, value)` contains an id iff the last persisted
//!   value(s) of `attr` for that id include `value`
//! - A unique hash never maps one value to two ids
//! - Stale entries are computed from the *stored* snapshot, never from the
//!   in-memory copy the caller may have modified

mod maintainer;
mod snapshot;

pub use maintainer::IndexMaintainer;
pub use snapshot::IndexSnapshot;
