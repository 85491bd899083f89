//! Optimistic transactions.
//!
//! A [`Transaction`] declares the keys it watches, a before-hook that runs
//! once (id assignment), read closures that run outside the atomic block
//! (reads and checks only) and write closures that queue commands into a
//! [`WriteBatch`]. [`Transaction::commit`] drives the phases in order and
//! sends the batch as one atomic block:
//!
//! - **Atomicity**: every queued command is applied or none is
//! - **Isolation**: a watched key changed by any client discards the block
//! - **No retry**: a discarded block surfaces as [`crate::CoreError::Conflict`]

mod batch;
mod state;

pub use batch::WriteBatch;
pub use state::{Transaction, TransactionState};
