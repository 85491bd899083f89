//! Database configuration.

use entikv_store::Endpoint;
use std::collections::HashMap;
use std::path::PathBuf;

/// Configuration for a [`crate::Database`].
///
/// Connections are opened per logical context (a model name). A context
/// without its own endpoint uses the default one.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Endpoint used by every context without an override.
    pub default_endpoint: Endpoint,

    /// Per-context endpoint overrides, keyed by model name.
    pub endpoints: HashMap<String, Endpoint>,

    /// Directory holding `<name>.lua` script bodies.
    pub script_dir: Option<PathBuf>,
}

impl Config {
    /// Creates a new configuration with default values.
    ///
    /// The default endpoint is a private in-memory server.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the default endpoint.
    #[must_use]
    pub fn endpoint(mut self, endpoint: Endpoint) -> Self {
        self.default_endpoint = endpoint;
        self
    }

    /// Routes one logical context to its own endpoint.
    #[must_use]
    pub fn context_endpoint(mut self, context: impl Into<String>, endpoint: Endpoint) -> Self {
        self.endpoints.insert(context.into(), endpoint);
        self
    }

    /// Sets the directory scripts are loaded from.
    #[must_use]
    pub fn script_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.script_dir = Some(dir.into());
        self
    }

    /// Returns the endpoint configured for a context.
    #[must_use]
    pub fn endpoint_for(&self, context: &str) -> &Endpoint {
        self.endpoints
            .get(context)
            .unwrap_or(&self.default_endpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use entikv_store::MemoryServer;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert!(config.endpoints.is_empty());
        assert!(config.script_dir.is_none());
        assert!(matches!(config.endpoint_for("User"), Endpoint::Memory(_)));
    }

    #[test]
    fn builder_pattern() {
        let users = MemoryServer::new();
        let config = Config::new()
            .context_endpoint("User", Endpoint::Memory(users.clone()))
            .script_dir("/tmp/scripts");

        config
            .endpoint_for("User")
            .connect()
            .unwrap()
            .incr("User:id")
            .unwrap();
        assert_eq!(users.key_count(), 1);
        assert_eq!(config.script_dir, Some(PathBuf::from("/tmp/scripts")));
    }
}
