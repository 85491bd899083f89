//! Per-context connections.

use crate::config::Config;
use crate::error::CoreResult;
use entikv_store::Store;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::thread::{self, ThreadId};
use tracing::debug;

/// Caches one store connection per (thread, logical context).
///
/// A logical context is a model name; each gets the endpoint configured for
/// it, or the default one. Connections are opened lazily and live until
/// [`ConnectionManager::reset`]. There is no pooling: a thread never shares
/// a connection with another thread, so watch registrations of concurrent
/// transactions cannot mix.
pub struct ConnectionManager {
    config: Arc<Config>,
    connections: Mutex<HashMap<(ThreadId, String), Arc<dyn Store>>>,
}

impl ConnectionManager {
    /// Creates a manager opening connections from `config`.
    #[must_use]
    pub fn new(config: Arc<Config>) -> Self {
        Self {
            config,
            connections: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the current thread's connection for `context`, opening it on
    /// first use.
    ///
    /// # Errors
    ///
    /// Returns a store error if the endpoint cannot be reached.
    pub fn get(&self, context: &str) -> CoreResult<Arc<dyn Store>> {
        let slot = (thread::current().id(), context.to_string());
        if let Some(conn) = self.connections.lock().get(&slot) {
            return Ok(Arc::clone(conn));
        }

        let conn = self.config.endpoint_for(context).connect()?;
        debug!(context, "opened store connection");
        Ok(Arc::clone(
            self.connections.lock().entry(slot).or_insert(conn),
        ))
    }

    /// Drops the current thread's connection for `context`.
    pub fn reset(&self, context: &str) {
        let slot = (thread::current().id(), context.to_string());
        self.connections.lock().remove(&slot);
    }

    /// Drops every cached connection of every thread.
    pub fn reset_all(&self) {
        self.connections.lock().clear();
    }

    /// Returns the number of cached connections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.connections.lock().len()
    }

    /// Returns true if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.connections.lock().is_empty()
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("config", &self.config)
            .field("connections", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use entikv_store::{Command, Endpoint, MemoryServer};

    fn manager() -> (MemoryServer, ConnectionManager) {
        let server = MemoryServer::new();
        let config = Config::new().endpoint(Endpoint::Memory(server.clone()));
        (server, ConnectionManager::new(Arc::new(config)))
    }

    #[test]
    fn same_thread_and_context_share_a_connection() {
        let (_server, manager) = manager();
        let a = manager.get("User").unwrap();
        let b = manager.get("User").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        let c = manager.get("Post").unwrap();
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(manager.len(), 2);
    }

    #[test]
    fn threads_get_their_own_connection() {
        let (_server, manager) = manager();
        let ours = manager.get("User").unwrap();
        let theirs = thread::scope(|s| s.spawn(|| manager.get("User").unwrap()).join().unwrap());
        assert!(!Arc::ptr_eq(&ours, &theirs));
        assert_eq!(manager.len(), 2);
    }

    #[test]
    fn reset_reopens_against_the_same_endpoint() {
        let (_server, manager) = manager();
        let before = manager.get("User").unwrap();
        before
            .apply(vec![Command::SAdd {
                key: "User:all".into(),
                members: vec!["1".into()],
            }])
            .unwrap();
        manager.reset("User");
        let after = manager.get("User").unwrap();
        assert!(!Arc::ptr_eq(&before, &after));
        assert!(after.sismember("User:all", "1").unwrap());

        manager.reset_all();
        assert!(manager.is_empty());
    }

    #[test]
    fn context_endpoints_are_isolated() {
        let users = MemoryServer::new();
        let config = Config::new().context_endpoint("User", Endpoint::Memory(users.clone()));
        let manager = ConnectionManager::new(Arc::new(config));
        manager
            .get("User")
            .unwrap()
            .apply(vec![Command::SAdd {
                key: "User:all".into(),
                members: vec!["1".into()],
            }])
            .unwrap();
        assert_eq!(users.key_count(), 1);
        assert!(!manager.get("Post").unwrap().exists("User:all").unwrap());
    }
}
