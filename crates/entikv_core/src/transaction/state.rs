//! Transaction state machine.

use crate::error::{CoreError, CoreResult};
use crate::transaction::batch::WriteBatch;
use entikv_store::Store;
use std::fmt;
use tracing::{debug, warn};

/// State of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Keys and closures are being declared.
    Declared,
    /// Watches are registered on the connection.
    Watching,
    /// Read closures are running.
    Reading,
    /// Write closures are queueing commands.
    Writing,
    /// The atomic block was applied.
    Committed,
    /// The transaction failed or was discarded.
    Aborted,
}

type BeforeFn<'a, S> = Box<dyn FnOnce(&dyn Store, &mut S) -> CoreResult<()> + 'a>;
type ReadFn<'a, S> = Box<dyn FnOnce(&dyn Store, &mut S) -> CoreResult<()> + 'a>;
type WriteFn<'a, S> = Box<dyn FnOnce(&S, &mut WriteBatch) -> CoreResult<()> + 'a>;

/// An optimistic transaction over one store connection.
///
/// `S` is scratch state shared by every phase: before-hooks and read
/// closures fill it, write closures read it, and [`Transaction::commit`]
/// hands it back on success.
///
/// # Example
///
/// ```rust
/// use entikv_core::Transaction;
/// use entikv_store::{InMemoryStore, Store};
///
/// let store = InMemoryStore::new();
/// let mut txn: Transaction<'_, i64> = Transaction::new("Counter");
/// txn.before(|store, n| {
///     *n = store.incr("Counter:id")?;
///     Ok(())
/// })
/// .write(|n, batch| {
///     batch.sadd(&entikv_core::key::all("Counter"), &n.to_string());
///     Ok(())
/// });
///
/// assert_eq!(txn.commit(&store).unwrap(), 1);
/// assert!(store.sismember("Counter:all", "1").unwrap());
/// ```
pub struct Transaction<'a, S = ()> {
    label: String,
    watched: Vec<String>,
    before: Vec<BeforeFn<'a, S>>,
    reads: Vec<ReadFn<'a, S>>,
    writes: Vec<WriteFn<'a, S>>,
    state: TransactionState,
}

impl<'a, S: Default> Transaction<'a, S> {
    /// Creates an empty transaction. `label` names it in errors and logs,
    /// usually the model being written.
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            watched: Vec::new(),
            before: Vec::new(),
            reads: Vec::new(),
            writes: Vec::new(),
            state: TransactionState::Declared,
        }
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Returns the watched keys.
    #[must_use]
    pub fn watched(&self) -> &[String] {
        &self.watched
    }

    /// Adds keys to the watch list. Duplicates are ignored.
    pub fn watch<I, K>(&mut self, keys: I) -> &mut Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        for key in keys {
            let key = key.into();
            if !self.watched.contains(&key) {
                self.watched.push(key);
            }
        }
        self
    }

    /// Adds a hook that runs once, after the watch and before any read.
    pub fn before<F>(&mut self, hook: F) -> &mut Self
    where
        F: FnOnce(&dyn Store, &mut S) -> CoreResult<()> + 'a,
    {
        self.before.push(Box::new(hook));
        self
    }

    /// Adds a read closure. It runs outside the atomic block and must not
    /// write; an error aborts the transaction before anything is written.
    pub fn read<F>(&mut self, read: F) -> &mut Self
    where
        F: FnOnce(&dyn Store, &mut S) -> CoreResult<()> + 'a,
    {
        self.reads.push(Box::new(read));
        self
    }

    /// Adds a write closure queueing commands for the atomic block.
    pub fn write<F>(&mut self, write: F) -> &mut Self
    where
        F: FnOnce(&S, &mut WriteBatch) -> CoreResult<()> + 'a,
    {
        self.writes.push(Box::new(write));
        self
    }

    /// Merges another transaction into this one.
    ///
    /// Watch lists are unioned; the other transaction's closures run after
    /// this one's within each phase.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidOperation`] if either transaction has
    /// already been committed or aborted.
    pub fn append(&mut self, other: Transaction<'a, S>) -> CoreResult<&mut Self> {
        self.ensure_declared()?;
        other.ensure_declared()?;
        let Transaction {
            watched,
            before,
            reads,
            writes,
            ..
        } = other;
        self.watch(watched);
        self.before.extend(before);
        self.reads.extend(reads);
        self.writes.extend(writes);
        Ok(self)
    }

    /// Runs every phase and applies the batch atomically.
    ///
    /// # Errors
    ///
    /// - [`CoreError::Conflict`] if a watched key changed before the block
    ///   was applied; nothing was written
    /// - any error raised by a hook or closure; the watch is released and
    ///   nothing was written
    /// - [`CoreError::InvalidOperation`] if the transaction already ran
    pub fn commit(&mut self, store: &dyn Store) -> CoreResult<S> {
        self.ensure_declared()?;
        let mut scratch = S::default();
        match self.run(store, &mut scratch) {
            Ok(true) => {
                self.state = TransactionState::Committed;
                debug!(label = %self.label, watched = self.watched.len(), "transaction committed");
                Ok(scratch)
            }
            Ok(false) => {
                self.state = TransactionState::Aborted;
                warn!(label = %self.label, keys = ?self.watched, "transaction discarded on conflict");
                Err(CoreError::Conflict {
                    model: self.label.clone(),
                    keys: self.watched.clone(),
                })
            }
            Err(e) => {
                self.state = TransactionState::Aborted;
                if let Err(unwatch) = store.unwatch() {
                    warn!(label = %self.label, error = %unwatch, "failed to release watch");
                }
                debug!(label = %self.label, error = %e, "transaction aborted");
                Err(e)
            }
        }
    }

    fn run(&mut self, store: &dyn Store, scratch: &mut S) -> CoreResult<bool> {
        self.state = TransactionState::Watching;
        if !self.watched.is_empty() {
            store.watch(&self.watched)?;
        }
        for hook in self.before.drain(..) {
            hook(store, scratch)?;
        }

        self.state = TransactionState::Reading;
        for read in self.reads.drain(..) {
            read(store, scratch)?;
        }

        self.state = TransactionState::Writing;
        let mut batch = WriteBatch::new();
        for write in self.writes.drain(..) {
            write(scratch, &mut batch)?;
        }
        Ok(store.exec(batch.into_commands())?)
    }

    fn ensure_declared(&self) -> CoreResult<()> {
        match self.state {
            TransactionState::Declared => Ok(()),
            TransactionState::Committed => Err(CoreError::invalid_operation(
                "transaction already committed",
            )),
            TransactionState::Aborted => {
                Err(CoreError::invalid_operation("transaction already aborted"))
            }
            _ => Err(CoreError::invalid_operation("transaction is running")),
        }
    }
}

impl<S> fmt::Debug for Transaction<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("label", &self.label)
            .field("watched", &self.watched)
            .field("state", &self.state)
            .field("before", &self.before.len())
            .field("reads", &self.reads.len())
            .field("writes", &self.writes.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key;
    use entikv_store::{Command, MemoryServer};

    #[test]
    fn new_transaction_is_declared() {
        let txn: Transaction<'_> = Transaction::new("User");
        assert_eq!(txn.state(), TransactionState::Declared);
        assert!(txn.watched().is_empty());
    }

    #[test]
    fn watch_ignores_duplicates() {
        let mut txn: Transaction<'_> = Transaction::new("User");
        txn.watch(["User:1", "User:uniques:email"]).watch(["User:1"]);
        assert_eq!(txn.watched(), ["User:1", "User:uniques:email"]);
    }

    #[test]
    fn phases_run_in_order_and_scratch_is_returned() {
        let store = MemoryServer::new().connect();
        let mut txn: Transaction<'_, Vec<&str>> = Transaction::new("User");
        txn.write(|log, batch| {
            assert_eq!(log, &vec!["before", "read"]);
            batch.sadd(&key::all("User"), "1");
            Ok(())
        })
        .read(|_, log| {
            log.push("read");
            Ok(())
        })
        .before(|_, log| {
            log.push("before");
            Ok(())
        });

        let log = txn.commit(&store).unwrap();
        assert_eq!(log, vec!["before", "read"]);
        assert_eq!(txn.state(), TransactionState::Committed);
        assert!(store.sismember("User:all", "1").unwrap());
    }

    #[test]
    fn read_error_aborts_without_writing() {
        let store = MemoryServer::new().connect();
        let mut txn: Transaction<'_> = Transaction::new("User");
        txn.watch(["User:1"])
            .read(|_, _| Err(CoreError::invalid_query("rejected")))
            .write(|_, batch| {
                batch.sadd(&key::all("User"), "1");
                Ok(())
            });

        let err = txn.commit(&store).unwrap_err();
        assert!(matches!(err, CoreError::InvalidQuery { .. }));
        assert_eq!(txn.state(), TransactionState::Aborted);
        assert!(!store.exists("User:all").unwrap());

        // The watch was released: a later block on the same connection
        // is not discarded by writes to User:1.
        store
            .apply(vec![Command::HSet {
                key: "User:1".into(),
                field: "name".into(),
                value: "x".into(),
            }])
            .unwrap();
        assert!(store.exec(vec![Command::Del { keys: vec!["User:1".into()] }]).unwrap());
    }

    #[test]
    fn concurrent_write_to_watched_key_is_a_conflict() {
        let server = MemoryServer::new();
        let ours = server.connect();
        let theirs = server.connect();

        let mut txn: Transaction<'_> = Transaction::new("User");
        txn.watch(["User:1"])
            .read(|_, _| {
                theirs.apply(vec![Command::HSet {
                    key: "User:1".into(),
                    field: "name".into(),
                    value: "theirs".into(),
                }])?;
                Ok(())
            })
            .write(|_, batch| {
                batch.hset(&key::attributes("User", "1"), "name", "ours");
                batch.sadd(&key::all("User"), "1");
                Ok(())
            });

        let err = txn.commit(&ours).unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(txn.state(), TransactionState::Aborted);
        assert_eq!(ours.hget("User:1", "name").unwrap().as_deref(), Some("theirs"));
        assert!(!ours.exists("User:all").unwrap());
    }

    #[test]
    fn cannot_commit_twice() {
        let store = MemoryServer::new().connect();
        let mut txn: Transaction<'_> = Transaction::new("User");
        txn.commit(&store).unwrap();
        let err = txn.commit(&store).unwrap_err();
        assert!(matches!(err, CoreError::InvalidOperation { .. }));
    }

    #[test]
    fn append_merges_watches_and_closures() {
        let store = MemoryServer::new().connect();
        let mut first: Transaction<'_, u32> = Transaction::new("User");
        first.watch(["a"]).read(|_, n| {
            *n += 1;
            Ok(())
        });
        let mut second: Transaction<'_, u32> = Transaction::new("User");
        second
            .watch(["a", "b"])
            .read(|_, n| {
                *n += 10;
                Ok(())
            })
            .write(|n, batch| {
                batch.sadd(&key::all("User"), &n.to_string());
                Ok(())
            });

        first.append(second).unwrap();
        assert_eq!(first.watched(), ["a", "b"]);
        assert_eq!(first.commit(&store).unwrap(), 11);
        assert!(store.sismember("User:all", "11").unwrap());
    }
}
