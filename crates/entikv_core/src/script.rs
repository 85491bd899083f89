//! Server-side scripts.
//!
//! Scripts are loaded by logical name from a [`ScriptSource`], hashed once
//! and cached. Running a script tries the cached hash first (`EVALSHA`) and
//! only uploads the body (`EVAL`) when the store reports it does not know
//! the hash, e.g. after a server restart.

use crate::error::{CoreError, CoreResult};
use entikv_store::{script_sha, ScriptValue, Store};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Where script bodies come from.
pub trait ScriptSource: Send + Sync {
    /// Returns the raw body of the script called `name`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ScriptLoad`] if the script cannot be read.
    fn load(&self, name: &str) -> CoreResult<Vec<u8>>;
}

/// Scripts stored as `<dir>/<name>.lua`.
#[derive(Debug, Clone)]
pub struct DirectoryScripts {
    root: PathBuf,
}

impl DirectoryScripts {
    /// Reads scripts from `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the script directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ScriptSource for DirectoryScripts {
    fn load(&self, name: &str) -> CoreResult<Vec<u8>> {
        let path = self.root.join(format!("{name}.lua"));
        fs::read(&path).map_err(|e| CoreError::ScriptLoad {
            name: name.to_string(),
            message: format!("{}: {e}", path.display()),
        })
    }
}

/// Scripts held in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticScripts {
    scripts: HashMap<String, Vec<u8>>,
}

impl StaticScripts {
    /// Creates an empty set of scripts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a script.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        self.scripts.insert(name.into(), body.into());
        self
    }
}

impl ScriptSource for StaticScripts {
    fn load(&self, name: &str) -> CoreResult<Vec<u8>> {
        self.scripts
            .get(name)
            .cloned()
            .ok_or_else(|| CoreError::ScriptLoad {
                name: name.to_string(),
                message: "no such script".into(),
            })
    }
}

/// A script body with its store hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedScript {
    /// Logical name.
    pub name: String,
    /// Script body.
    pub source: String,
    /// Lowercase hex SHA-1 of `source`.
    pub sha: String,
}

/// Loads, caches and runs scripts.
pub struct ScriptRunner {
    source: Arc<dyn ScriptSource>,
    cache: RwLock<HashMap<String, Arc<LoadedScript>>>,
}

impl ScriptRunner {
    /// Creates a runner reading from `source`.
    #[must_use]
    pub fn new(source: Arc<dyn ScriptSource>) -> Self {
        Self {
            source,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the script called `name`, reading it on first use.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ScriptLoad`] for an invalid name, an unreadable
    /// script or a body that is not UTF-8.
    pub fn load(&self, name: &str) -> CoreResult<Arc<LoadedScript>> {
        if let Some(script) = self.cache.read().get(name) {
            return Ok(Arc::clone(script));
        }
        check_name(name)?;

        let body = self.source.load(name)?;
        let source = String::from_utf8(body).map_err(|e| CoreError::ScriptLoad {
            name: name.to_string(),
            message: e.to_string(),
        })?;
        let script = Arc::new(LoadedScript {
            name: name.to_string(),
            sha: script_sha(&source),
            source,
        });
        debug!(name, sha = %script.sha, "loaded script");
        Ok(Arc::clone(
            self.cache
                .write()
                .entry(name.to_string())
                .or_insert(script),
        ))
    }

    /// Runs a script, uploading it only if the store has not cached it.
    ///
    /// # Errors
    ///
    /// Returns a load error, or any store error other than the cache miss.
    pub fn run(
        &self,
        store: &dyn Store,
        name: &str,
        keys: &[String],
        args: &[String],
    ) -> CoreResult<ScriptValue> {
        let script = self.load(name)?;
        match store.eval_sha(&script.sha, keys, args) {
            Err(e) if e.is_no_script() => {
                debug!(name, sha = %script.sha, "script not cached by store, uploading");
                Ok(store.eval(&script.source, keys, args)?)
            }
            other => Ok(other?),
        }
    }

    /// Forgets every loaded script.
    pub fn clear(&self) {
        self.cache.write().clear();
    }
}

impl fmt::Debug for ScriptRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptRunner")
            .field("cached", &self.cache.read().len())
            .finish_non_exhaustive()
    }
}

fn check_name(name: &str) -> CoreResult<()> {
    let valid = !name.is_empty()
        && !name.contains(['/', '\\'])
        && name != "."
        && name != "..";
    if valid {
        Ok(())
    } else {
        Err(CoreError::ScriptLoad {
            name: name.to_string(),
            message: "invalid script name".into(),
        })
    }
}
