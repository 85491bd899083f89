//! Connection options.

use crate::backend::Store;
use crate::error::StoreResult;
use crate::memory::MemoryServer;
use std::sync::Arc;

/// Where a connection should point.
///
/// An endpoint is the configured option set for a logical context; calling
/// [`Endpoint::connect`] opens a fresh connection to it.
#[derive(Debug, Clone)]
pub enum Endpoint {
    /// A process-local [`MemoryServer`].
    Memory(MemoryServer),
    /// A Redis server URL, e.g. `redis://127.0.0.1:6379/0`.
    #[cfg(feature = "redis")]
    Redis {
        /// Connection URL.
        url: String,
    },
}

impl Endpoint {
    /// Creates an endpoint backed by a new in-memory server.
    #[must_use]
    pub fn memory() -> Self {
        Self::Memory(MemoryServer::new())
    }

    /// Creates a Redis endpoint.
    #[cfg(feature = "redis")]
    #[must_use]
    pub fn redis(url: impl Into<String>) -> Self {
        Self::Redis { url: url.into() }
    }

    /// Opens a new connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote server cannot be reached.
    pub fn connect(&self) -> StoreResult<Arc<dyn Store>> {
        match self {
            Self::Memory(server) => Ok(Arc::new(server.connect())),
            #[cfg(feature = "redis")]
            Self::Redis { url } => Ok(Arc::new(crate::remote::RedisStore::open(url)?)),
        }
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::memory()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_endpoint_connections_share_data() {
        let endpoint = Endpoint::memory();
        let a = endpoint.connect().unwrap();
        let b = endpoint.connect().unwrap();

        a.incr("counter").unwrap();
        assert_eq!(b.incr("counter").unwrap(), 2);
    }

    #[test]
    fn cloned_endpoint_points_at_same_server() {
        let endpoint = Endpoint::memory();
        let clone = endpoint.clone();
        endpoint.connect().unwrap().incr("k").unwrap();
        assert!(clone.connect().unwrap().exists("k").unwrap());
    }
}
