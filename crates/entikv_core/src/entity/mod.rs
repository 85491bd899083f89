//! Entities.
//!
//! [`Entity`] is the untyped record every operation works on: a schema, an
//! optional id and a string attribute map. The [`Model`] trait and the
//! [`crate::model!`] macro layer named newtypes over it.

mod model;
mod persist;
mod record;
mod relation;
mod validation;

pub use model::Model;
pub use record::Entity;
pub use validation::{ValidationErrors, Validations, Violation};
