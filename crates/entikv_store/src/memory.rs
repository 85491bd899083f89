//! In-memory store for testing and embedded use.

use crate::backend::{script_sha, Command, ScriptValue, SortArgs, Store};
use crate::error::{StoreError, StoreResult};
use parking_lot::{Mutex, RwLock};
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

/// Handler executed when a script is evaluated against an [`InMemoryStore`].
///
/// Receives the calling connection, the `KEYS` and the `ARGV` of the call.
pub type ScriptHandler =
    Arc<dyn Fn(&InMemoryStore, &[String], &[String]) -> StoreResult<ScriptValue> + Send + Sync>;

#[derive(Debug, Clone)]
enum Value {
    Str(String),
    Hash(HashMap<String, String>),
    Set(BTreeSet<String>),
}

/// The shared keyspace. Every mutation bumps the key's version, which is
/// what watches compare against.
#[derive(Debug, Default)]
struct Keyspace {
    entries: HashMap<String, Value>,
    versions: HashMap<String, u64>,
    clock: u64,
}

impl Keyspace {
    fn version(&self, key: &str) -> u64 {
        self.versions.get(key).copied().unwrap_or(0)
    }

    fn touch(&mut self, key: &str) {
        self.clock += 1;
        self.versions.insert(key.to_string(), self.clock);
    }

    fn hash(&self, key: &str) -> StoreResult<Option<&HashMap<String, String>>> {
        match self.entries.get(key) {
            None => Ok(None),
            Some(Value::Hash(h)) => Ok(Some(h)),
            Some(_) => Err(StoreError::wrong_type(key)),
        }
    }

    fn hash_mut(&mut self, key: &str) -> StoreResult<&mut HashMap<String, String>> {
        let entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Value::Hash(HashMap::new()));
        match entry {
            Value::Hash(h) => Ok(h),
            _ => Err(StoreError::wrong_type(key)),
        }
    }

    fn set(&self, key: &str) -> StoreResult<Option<&BTreeSet<String>>> {
        match self.entries.get(key) {
            None => Ok(None),
            Some(Value::Set(s)) => Ok(Some(s)),
            Some(_) => Err(StoreError::wrong_type(key)),
        }
    }

    fn set_mut(&mut self, key: &str) -> StoreResult<&mut BTreeSet<String>> {
        let entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Value::Set(BTreeSet::new()));
        match entry {
            Value::Set(s) => Ok(s),
            _ => Err(StoreError::wrong_type(key)),
        }
    }

    /// Removes the key if it holds an empty aggregate, like Redis does.
    fn prune(&mut self, key: &str) {
        let empty = match self.entries.get(key) {
            Some(Value::Hash(h)) => h.is_empty(),
            Some(Value::Set(s)) => s.is_empty(),
            _ => false,
        };
        if empty {
            self.entries.remove(key);
        }
    }

    fn members_of(&self, keys: &[String]) -> StoreResult<Vec<BTreeSet<String>>> {
        keys.iter()
            .map(|k| Ok(self.set(k)?.cloned().unwrap_or_default()))
            .collect()
    }

    fn store_set(&mut self, dest: &str, members: BTreeSet<String>) {
        if members.is_empty() {
            self.entries.remove(dest);
        } else {
            self.entries.insert(dest.to_string(), Value::Set(members));
        }
        self.touch(dest);
    }

    fn incr_by(&mut self, key: &str, by: i64) -> StoreResult<i64> {
        let current = match self.entries.get(key) {
            None => 0,
            Some(Value::Str(s)) => s.parse::<i64>().map_err(|_| StoreError::NotInteger {
                key: key.to_string(),
            })?,
            Some(_) => return Err(StoreError::wrong_type(key)),
        };
        let next = current.checked_add(by).ok_or_else(StoreError::overflow)?;
        self.entries.insert(key.to_string(), Value::Str(next.to_string()));
        self.touch(key);
        Ok(next)
    }

    fn hincr_by(&mut self, key: &str, field: &str, by: i64) -> StoreResult<i64> {
        let hash = self.hash_mut(key)?;
        let current = match hash.get(field) {
            None => 0,
            Some(v) => v.parse::<i64>().map_err(|_| StoreError::NotInteger {
                key: format!("{key}->{field}"),
            })?,
        };
        let next = current.checked_add(by).ok_or_else(StoreError::overflow)?;
        hash.insert(field.to_string(), next.to_string());
        self.touch(key);
        Ok(next)
    }

    fn apply(&mut self, command: &Command) -> StoreResult<()> {
        match command {
            Command::HSet { key, field, value } => {
                self.hash_mut(key)?.insert(field.clone(), value.clone());
                self.touch(key);
            }
            Command::HMSet { key, fields } => {
                if fields.is_empty() {
                    return Err(StoreError::command("HMSET requires at least one field"));
                }
                let hash = self.hash_mut(key)?;
                for (field, value) in fields {
                    hash.insert(field.clone(), value.clone());
                }
                self.touch(key);
            }
            Command::HDel { key, field } => {
                if self.hash(key)?.is_some_and(|h| h.contains_key(field)) {
                    self.hash_mut(key)?.remove(field);
                    self.prune(key);
                    self.touch(key);
                }
            }
            Command::HIncrBy { key, field, by } => {
                self.hincr_by(key, field, *by)?;
            }
            Command::SAdd { key, members } => {
                let set = self.set_mut(key)?;
                let before = set.len();
                set.extend(members.iter().cloned());
                let added = set.len() != before;
                self.prune(key);
                if added {
                    self.touch(key);
                }
            }
            Command::SRem { key, members } => {
                let present = self
                    .set(key)?
                    .is_some_and(|set| members.iter().any(|m| set.contains(m)));
                if present {
                    let set = self.set_mut(key)?;
                    for member in members {
                        set.remove(member);
                    }
                    self.prune(key);
                    self.touch(key);
                }
            }
            Command::Del { keys } => {
                for key in keys {
                    if self.entries.remove(key).is_some() {
                        self.touch(key);
                    }
                }
            }
            Command::SInterStore { dest, keys } => {
                let mut sets = self.members_of(keys)?.into_iter();
                let first = sets.next().unwrap_or_default();
                let result = sets.fold(first, |acc, s| acc.intersection(&s).cloned().collect());
                self.store_set(dest, result);
            }
            Command::SUnionStore { dest, keys } => {
                let result = self
                    .members_of(keys)?
                    .into_iter()
                    .fold(BTreeSet::new(), |mut acc, s| {
                        acc.extend(s);
                        acc
                    });
                self.store_set(dest, result);
            }
            Command::SDiffStore { dest, keys } => {
                let mut sets = self.members_of(keys)?.into_iter();
                let first = sets.next().unwrap_or_default();
                let result = sets.fold(first, |acc, s| acc.difference(&s).cloned().collect());
                self.store_set(dest, result);
            }
        }
        Ok(())
    }

    /// Applies a batch so that either every command takes effect or none does.
    fn apply_all(&mut self, commands: &[Command]) -> StoreResult<()> {
        let touched: HashSet<&str> = commands.iter().flat_map(command_keys).collect();
        let saved: Vec<(String, Option<Value>, Option<u64>)> = touched
            .iter()
            .map(|k| {
                (
                    k.to_string(),
                    self.entries.get(*k).cloned(),
                    self.versions.get(*k).copied(),
                )
            })
            .collect();
        let clock = self.clock;

        for command in commands {
            if let Err(e) = self.apply(command) {
                for (key, value, version) in saved {
                    match value {
                        Some(v) => self.entries.insert(key.clone(), v),
                        None => self.entries.remove(&key),
                    };
                    match version {
                        Some(v) => self.versions.insert(key, v),
                        None => self.versions.remove(&key),
                    };
                }
                self.clock = clock;
                return Err(e);
            }
        }
        Ok(())
    }

    /// Resolves a `SORT ... BY` pattern for one member.
    fn sort_weight(&self, pattern: Option<&str>, member: &str) -> StoreResult<Option<String>> {
        let Some(pattern) = pattern else {
            return Ok(Some(member.to_string()));
        };
        let resolved = pattern.replacen('*', member, 1);
        match resolved.split_once("->") {
            Some((key, field)) => Ok(self.hash(key)?.and_then(|h| h.get(field).cloned())),
            None => match self.entries.get(&resolved) {
                Some(Value::Str(s)) => Ok(Some(s.clone())),
                Some(_) => Err(StoreError::wrong_type(resolved)),
                None => Ok(None),
            },
        }
    }
}

fn command_keys(command: &Command) -> Vec<&str> {
    match command {
        Command::HSet { key, .. }
        | Command::HMSet { key, .. }
        | Command::HDel { key, .. }
        | Command::HIncrBy { key, .. }
        | Command::SAdd { key, .. }
        | Command::SRem { key, .. } => vec![key.as_str()],
        Command::Del { keys } => keys.iter().map(String::as_str).collect(),
        Command::SInterStore { dest, .. }
        | Command::SUnionStore { dest, .. }
        | Command::SDiffStore { dest, .. } => vec![dest.as_str()],
    }
}

/// Glob matching supporting `*` and `?`, as used by `KEYS`.
fn glob_match(pattern: &str, input: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let s: Vec<char> = input.chars().collect();
    let (mut pi, mut si) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while si < s.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == s[si]) {
            pi += 1;
            si += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some((pi, si));
            pi += 1;
        } else if let Some((sp, ss)) = star {
            pi = sp + 1;
            si = ss + 1;
            star = Some((sp, ss + 1));
        } else {
            return false;
        }
    }
    while pi < p.len() && p[pi] == '*' {
        pi += 1;
    }
    pi == p.len()
}

#[derive(Default)]
struct ScriptCache {
    handlers: HashMap<String, ScriptHandler>,
    loaded: HashSet<String>,
}

/// A process-local store server.
///
/// The server owns the keyspace; [`MemoryServer::connect`] hands out
/// connections. Each connection keeps its own watch list, so two
/// connections to the same server behave like two Redis clients.
///
/// # Example
///
/// ```rust
/// use entikv_store::{Command, MemoryServer, Store};
///
/// let server = MemoryServer::new();
/// let conn = server.connect();
/// conn.apply(vec![Command::SAdd { key: "s".into(), members: vec!["1".into()] }]).unwrap();
/// assert!(conn.sismember("s", "1").unwrap());
/// ```
#[derive(Clone, Default)]
pub struct MemoryServer {
    keyspace: Arc<RwLock<Keyspace>>,
    scripts: Arc<RwLock<ScriptCache>>,
}

impl MemoryServer {
    /// Creates an empty server.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a new connection.
    #[must_use]
    pub fn connect(&self) -> InMemoryStore {
        InMemoryStore {
            server: self.clone(),
            watched: Mutex::new(HashMap::new()),
        }
    }

    /// Registers the handler that runs when `source` is evaluated.
    ///
    /// Defining a script does not load it: `EVALSHA` keeps failing until
    /// the source has been sent once through `EVAL`.
    pub fn define_script<F>(&self, source: &str, handler: F)
    where
        F: Fn(&InMemoryStore, &[String], &[String]) -> StoreResult<ScriptValue>
            + Send
            + Sync
            + 'static,
    {
        self.scripts
            .write()
            .handlers
            .insert(script_sha(source), Arc::new(handler));
    }

    /// Empties the script cache (`SCRIPT FLUSH`).
    pub fn script_flush(&self) {
        self.scripts.write().loaded.clear();
    }

    /// Returns true if a script with this hash is cached.
    #[must_use]
    pub fn script_exists(&self, sha: &str) -> bool {
        self.scripts.read().loaded.contains(sha)
    }

    /// Returns the number of keys currently stored.
    #[must_use]
    pub fn key_count(&self) -> usize {
        self.keyspace.read().entries.len()
    }

    /// Removes every key (`FLUSHDB`).
    pub fn flush(&self) {
        let mut keyspace = self.keyspace.write();
        let keys: Vec<String> = keyspace.entries.keys().cloned().collect();
        keyspace.entries.clear();
        for key in keys {
            keyspace.touch(&key);
        }
    }
}

impl std::fmt::Debug for MemoryServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryServer")
            .field("keys", &self.key_count())
            .finish_non_exhaustive()
    }
}

/// One connection to a [`MemoryServer`].
pub struct InMemoryStore {
    server: MemoryServer,
    /// Watched keys and the version observed when the watch was placed.
    watched: Mutex<HashMap<String, u64>>,
}

impl InMemoryStore {
    /// Opens a connection to a fresh, private server.
    #[must_use]
    pub fn new() -> Self {
        MemoryServer::new().connect()
    }

    /// Returns the server this connection belongs to.
    #[must_use]
    pub fn server(&self) -> &MemoryServer {
        &self.server
    }

    fn run_script(
        &self,
        sha: &str,
        keys: &[String],
        args: &[String],
    ) -> StoreResult<ScriptValue> {
        let handler = self
            .server
            .scripts
            .read()
            .handlers
            .get(sha)
            .cloned()
            .ok_or_else(|| StoreError::Script(format!("no handler defined for script {sha}")))?;
        handler(self, keys, args)
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStore")
            .field("watched", &self.watched.lock().len())
            .finish_non_exhaustive()
    }
}

impl Store for InMemoryStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        match self.server.keyspace.read().entries.get(key) {
            None => Ok(None),
            Some(Value::Str(s)) => Ok(Some(s.clone())),
            Some(_) => Err(StoreError::wrong_type(key)),
        }
    }

    fn incr(&self, key: &str) -> StoreResult<i64> {
        self.server.keyspace.write().incr_by(key, 1)
    }

    fn hget(&self, key: &str, field: &str) -> StoreResult<Option<String>> {
        let keyspace = self.server.keyspace.read();
        Ok(keyspace.hash(key)?.and_then(|h| h.get(field).cloned()))
    }

    fn hgetall(&self, key: &str) -> StoreResult<HashMap<String, String>> {
        let keyspace = self.server.keyspace.read();
        Ok(keyspace.hash(key)?.cloned().unwrap_or_default())
    }

    fn hgetall_many(&self, keys: &[String]) -> StoreResult<Vec<HashMap<String, String>>> {
        let keyspace = self.server.keyspace.read();
        keys.iter()
            .map(|k| Ok(keyspace.hash(k)?.cloned().unwrap_or_default()))
            .collect()
    }

    fn hincrby(&self, key: &str, field: &str, by: i64) -> StoreResult<i64> {
        self.server.keyspace.write().hincr_by(key, field, by)
    }

    fn sismember(&self, key: &str, member: &str) -> StoreResult<bool> {
        let keyspace = self.server.keyspace.read();
        Ok(keyspace.set(key)?.is_some_and(|s| s.contains(member)))
    }

    fn scard(&self, key: &str) -> StoreResult<usize> {
        let keyspace = self.server.keyspace.read();
        Ok(keyspace.set(key)?.map_or(0, BTreeSet::len))
    }

    fn smembers(&self, key: &str) -> StoreResult<Vec<String>> {
        let keyspace = self.server.keyspace.read();
        Ok(keyspace
            .set(key)?
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default())
    }

    fn exists(&self, key: &str) -> StoreResult<bool> {
        Ok(self.server.keyspace.read().entries.contains_key(key))
    }

    fn keys(&self, pattern: &str) -> StoreResult<Vec<String>> {
        let keyspace = self.server.keyspace.read();
        let mut keys: Vec<String> = keyspace
            .entries
            .keys()
            .filter(|k| glob_match(pattern, k))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }

    fn flushdb(&self) -> StoreResult<()> {
        self.server.flush();
        Ok(())
    }

    fn sort(&self, key: &str, args: &SortArgs) -> StoreResult<Vec<String>> {
        let keyspace = self.server.keyspace.read();
        let members: Vec<String> = keyspace
            .set(key)?
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default();

        // A BY pattern without `*` means "do not sort".
        let skip_sort = args.by.as_deref().is_some_and(|p| !p.contains('*'));
        let mut sorted = members;

        if !skip_sort {
            let mut weighted = Vec::with_capacity(sorted.len());
            for member in sorted {
                let weight = keyspace.sort_weight(args.by.as_deref(), &member)?;
                weighted.push((member, weight));
            }

            if args.alpha {
                weighted.sort_by(|(ma, a), (mb, b)| {
                    let ord = a.as_deref().unwrap_or("").cmp(b.as_deref().unwrap_or(""));
                    let ord = if args.desc { ord.reverse() } else { ord };
                    ord.then_with(|| ma.cmp(mb))
                });
            } else {
                let mut scored = Vec::with_capacity(weighted.len());
                for (member, weight) in weighted {
                    let score = match weight {
                        None => 0.0,
                        Some(w) => w.trim().parse::<f64>().map_err(|_| {
                            StoreError::command("One or more scores can't be converted into double")
                        })?,
                    };
                    scored.push((member, score));
                }
                scored.sort_by(|(ma, a), (mb, b)| {
                    let ord = a.partial_cmp(b).unwrap_or(Ordering::Equal);
                    let ord = if args.desc { ord.reverse() } else { ord };
                    ord.then_with(|| ma.cmp(mb))
                });
                weighted = scored.into_iter().map(|(m, _)| (m, None)).collect();
            }
            sorted = weighted.into_iter().map(|(m, _)| m).collect();
        }

        Ok(match args.limit {
            Some((offset, count)) => sorted.into_iter().skip(offset).take(count).collect(),
            None => sorted,
        })
    }

    fn apply(&self, commands: Vec<Command>) -> StoreResult<()> {
        let mut keyspace = self.server.keyspace.write();
        for command in &commands {
            keyspace.apply(command)?;
        }
        Ok(())
    }

    fn exec(&self, commands: Vec<Command>) -> StoreResult<bool> {
        let watched = std::mem::take(&mut *self.watched.lock());
        let mut keyspace = self.server.keyspace.write();

        if let Some((key, _)) = watched
            .iter()
            .find(|(key, version)| keyspace.version(key) != **version)
        {
            tracing::debug!(key = %key, "watched key changed, discarding atomic block");
            return Ok(false);
        }

        keyspace.apply_all(&commands)?;
        Ok(true)
    }

    fn watch(&self, keys: &[String]) -> StoreResult<()> {
        let versions: Vec<(String, u64)> = {
            let keyspace = self.server.keyspace.read();
            keys.iter().map(|k| (k.clone(), keyspace.version(k))).collect()
        };
        let mut watched = self.watched.lock();
        for (key, version) in versions {
            watched.entry(key).or_insert(version);
        }
        Ok(())
    }

    fn unwatch(&self) -> StoreResult<()> {
        self.watched.lock().clear();
        Ok(())
    }

    fn eval_sha(
        &self,
        sha: &str,
        keys: &[String],
        args: &[String],
    ) -> StoreResult<ScriptValue> {
        if !self.server.script_exists(sha) {
            return Err(StoreError::NoScript {
                sha: sha.to_string(),
            });
        }
        self.run_script(sha, keys, args)
    }

    fn eval(&self, source: &str, keys: &[String], args: &[String]) -> StoreResult<ScriptValue> {
        let sha = script_sha(source);
        self.server.scripts.write().loaded.insert(sha.clone());
        self.run_script(&sha, keys, args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sadd(key: &str, members: &[&str]) -> Command {
        Command::SAdd {
            key: key.into(),
            members: members.iter().map(|m| m.to_string()).collect(),
        }
    }

    #[test]
    fn memory_hash_roundtrip() {
        let store = InMemoryStore::new();
        store
            .apply(vec![Command::HMSet {
                key: "User:1".into(),
                fields: vec![("name".into(), "ann".into()), ("age".into(), "30".into())],
            }])
            .unwrap();

        assert_eq!(store.hget("User:1", "name").unwrap().as_deref(), Some("ann"));
        assert_eq!(store.hgetall("User:1").unwrap().len(), 2);
        assert!(store.hgetall("User:2").unwrap().is_empty());
    }

    #[test]
    fn memory_hgetall_many_keeps_order() {
        let store = InMemoryStore::new();
        store
            .apply(vec![
                Command::HSet { key: "a".into(), field: "v".into(), value: "1".into() },
                Command::HSet { key: "c".into(), field: "v".into(), value: "3".into() },
            ])
            .unwrap();

        let rows = store
            .hgetall_many(&["c".into(), "b".into(), "a".into()])
            .unwrap();
        assert_eq!(rows[0]["v"], "3");
        assert!(rows[1].is_empty());
        assert_eq!(rows[2]["v"], "1");
    }

    #[test]
    fn memory_empty_set_is_removed() {
        let store = InMemoryStore::new();
        store.apply(vec![sadd("s", &["1"])]).unwrap();
        store
            .apply(vec![Command::SRem { key: "s".into(), members: vec!["1".into()] }])
            .unwrap();
        assert!(!store.exists("s").unwrap());
    }

    #[test]
    fn memory_wrong_type_is_rejected() {
        let store = InMemoryStore::new();
        store.apply(vec![sadd("s", &["1"])]).unwrap();
        assert!(matches!(
            store.hget("s", "x"),
            Err(StoreError::WrongType { .. })
        ));
    }

    #[test]
    fn memory_incr_is_monotonic() {
        let store = InMemoryStore::new();
        assert_eq!(store.incr("User:id").unwrap(), 1);
        assert_eq!(store.incr("User:id").unwrap(), 2);
        assert_eq!(store.get("User:id").unwrap().as_deref(), Some("2"));
        assert_eq!(store.hincrby("User:1:counters", "votes", 5).unwrap(), 5);
        assert_eq!(store.hincrby("User:1:counters", "votes", -2).unwrap(), 3);
    }

    #[test]
    fn memory_set_algebra() {
        let store = InMemoryStore::new();
        store
            .apply(vec![sadd("a", &["1", "2", "3"]), sadd("b", &["2", "3", "4"]), sadd("c", &["3"])])
            .unwrap();
        store
            .apply(vec![
                Command::SInterStore { dest: "t".into(), keys: vec!["a".into(), "b".into()] },
                Command::SDiffStore { dest: "t".into(), keys: vec!["t".into(), "c".into()] },
                Command::SUnionStore { dest: "t".into(), keys: vec!["t".into(), "c".into()] },
            ])
            .unwrap();
        assert_eq!(store.smembers("t").unwrap(), vec!["2", "3"]);
    }

    #[test]
    fn memory_sort_numeric_and_by_pattern() {
        let store = InMemoryStore::new();
        store
            .apply(vec![
                sadd("all", &["10", "9", "100"]),
                Command::HSet { key: "U:10".into(), field: "name".into(), value: "b".into() },
                Command::HSet { key: "U:9".into(), field: "name".into(), value: "c".into() },
                Command::HSet { key: "U:100".into(), field: "name".into(), value: "a".into() },
            ])
            .unwrap();

        let ids = store.sort("all", &SortArgs::default()).unwrap();
        assert_eq!(ids, vec!["9", "10", "100"]);

        let args = SortArgs {
            by: Some("U:*->name".into()),
            alpha: true,
            desc: true,
            limit: Some((0, 2)),
        };
        assert_eq!(store.sort("all", &args).unwrap(), vec!["9", "10"]);
    }

    #[test]
    fn memory_sort_rejects_non_numeric_scores() {
        let store = InMemoryStore::new();
        store.apply(vec![sadd("s", &["x"])]).unwrap();
        assert!(store.sort("s", &SortArgs::default()).is_err());
    }

    #[test]
    fn memory_watch_discards_block_after_foreign_write() {
        let server = MemoryServer::new();
        let a = server.connect();
        let b = server.connect();

        a.watch(&["k".into()]).unwrap();
        b.apply(vec![Command::HSet { key: "k".into(), field: "f".into(), value: "b".into() }])
            .unwrap();

        let committed = a
            .exec(vec![Command::HSet { key: "k".into(), field: "f".into(), value: "a".into() }])
            .unwrap();
        assert!(!committed);
        assert_eq!(a.hget("k", "f").unwrap().as_deref(), Some("b"));

        // The watch list was consumed; the next block goes through.
        assert!(a.exec(vec![Command::Del { keys: vec!["k".into()] }]).unwrap());
    }

    #[test]
    fn memory_watch_ignores_commands_that_change_nothing() {
        let server = MemoryServer::new();
        let a = server.connect();
        let b = server.connect();
        b.apply(vec![
            sadd("s", &["1"]),
            Command::HSet { key: "h".into(), field: "f".into(), value: "v".into() },
        ])
        .unwrap();

        a.watch(&["s".into(), "h".into()]).unwrap();
        b.apply(vec![
            sadd("s", &["1"]),
            Command::SRem { key: "s".into(), members: vec!["2".into()] },
            Command::HDel { key: "h".into(), field: "missing".into() },
            Command::HDel { key: "absent".into(), field: "f".into() },
        ])
        .unwrap();
        assert!(a.exec(vec![sadd("s", &["3"])]).unwrap());

        a.watch(&["s".into()]).unwrap();
        b.apply(vec![Command::SRem { key: "s".into(), members: vec!["1".into(), "2".into()] }])
            .unwrap();
        assert!(!a.exec(vec![sadd("s", &["4"])]).unwrap());
    }

    #[test]
    fn memory_counters_reject_overflow() {
        let store = InMemoryStore::new();
        assert_eq!(store.incr("n").unwrap(), 1);
        store
            .apply(vec![Command::HIncrBy { key: "c".into(), field: "v".into(), by: i64::MAX }])
            .unwrap();
        assert!(store.hincrby("c", "v", 1).is_err());
        assert_eq!(store.hget("c", "v").unwrap(), Some(i64::MAX.to_string()));
        assert_eq!(store.hincrby("c", "v", -1).unwrap(), i64::MAX - 1);
    }

    #[test]
    fn memory_watch_untouched_commits() {
        let store = InMemoryStore::new();
        store.watch(&["k".into()]).unwrap();
        assert!(store.exec(vec![sadd("k", &["1"])]).unwrap());
    }

    #[test]
    fn memory_exec_is_all_or_nothing() {
        let store = InMemoryStore::new();
        store.apply(vec![sadd("s", &["1"])]).unwrap();

        let result = store.exec(vec![
            Command::HSet { key: "h".into(), field: "f".into(), value: "v".into() },
            Command::HSet { key: "s".into(), field: "f".into(), value: "v".into() },
        ]);
        assert!(result.is_err());
        assert!(!store.exists("h").unwrap());
    }

    #[test]
    fn memory_keys_glob() {
        let store = InMemoryStore::new();
        store
            .apply(vec![sadd("User:all", &["1"]), sadd("User:indices:a:b", &["1"]), sadd("Post:all", &["1"])])
            .unwrap();
        assert_eq!(store.keys("User:*").unwrap(), vec!["User:all", "User:indices:a:b"]);
        assert_eq!(store.keys("*:all").unwrap(), vec!["Post:all", "User:all"]);
        assert!(glob_match("a?c", "abc"));
        assert!(!glob_match("a?c", "abbc"));
    }

    #[test]
    fn memory_scripts_require_upload() {
        let server = MemoryServer::new();
        server.define_script("return 1", |_, _, _| Ok(ScriptValue::Int(1)));
        let conn = server.connect();
        let sha = script_sha("return 1");

        assert!(conn.eval_sha(&sha, &[], &[]).unwrap_err().is_no_script());
        assert_eq!(conn.eval("return 1", &[], &[]).unwrap(), ScriptValue::Int(1));
        assert_eq!(conn.eval_sha(&sha, &[], &[]).unwrap(), ScriptValue::Int(1));

        server.script_flush();
        assert!(conn.eval_sha(&sha, &[], &[]).is_err());
    }

    mod set_algebra {
        use super::*;
        use proptest::prelude::*;
        use std::collections::BTreeSet;

        fn members() -> impl Strategy<Value = BTreeSet<String>> {
            prop::collection::btree_set((0u8..12).prop_map(|n| n.to_string()), 0..8)
        }

        fn stored(store: &InMemoryStore, key: &str) -> BTreeSet<String> {
            store.smembers(key).unwrap().into_iter().collect()
        }

        proptest! {
            #[test]
            fn store_commands_match_set_operations(a in members(), b in members()) {
                let store = InMemoryStore::new();
                let as_vec = |s: &BTreeSet<String>| s.iter().cloned().collect::<Vec<_>>();
                let mut seed = Vec::new();
                if !a.is_empty() {
                    seed.push(Command::SAdd { key: "a".into(), members: as_vec(&a) });
                }
                if !b.is_empty() {
                    seed.push(Command::SAdd { key: "b".into(), members: as_vec(&b) });
                }
                store.apply(seed).unwrap();

                let keys = vec!["a".to_string(), "b".to_string()];
                store
                    .apply(vec![
                        Command::SInterStore { dest: "i".into(), keys: keys.clone() },
                        Command::SUnionStore { dest: "u".into(), keys: keys.clone() },
                        Command::SDiffStore { dest: "d".into(), keys },
                    ])
                    .unwrap();

                prop_assert_eq!(stored(&store, "i"), a.intersection(&b).cloned().collect());
                prop_assert_eq!(stored(&store, "u"), a.union(&b).cloned().collect());
                prop_assert_eq!(stored(&store, "d"), a.difference(&b).cloned().collect());
                prop_assert_eq!(store.scard("i").unwrap(), a.intersection(&b).count());
            }
        }
    }
}
