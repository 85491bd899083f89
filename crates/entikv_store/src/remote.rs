//! Redis-backed store.

use crate::backend::{Command, ScriptValue, SortArgs, Store};
use crate::error::{StoreError, StoreResult};
use parking_lot::Mutex;
use std::collections::HashMap;

/// A blocking connection to a Redis server.
///
/// One `RedisStore` is one server connection; watch registrations and
/// atomic blocks belong to it. The connection sits behind a mutex so the
/// store can be shared, but commands are strictly sequential.
///
/// # Example
///
/// ```no_run
/// use entikv_store::{RedisStore, Store};
///
/// let store = RedisStore::open("redis://127.0.0.1:6379/0").unwrap();
/// let next = store.incr("User:id").unwrap();
/// ```
pub struct RedisStore {
    url: String,
    conn: Mutex<redis::Connection>,
}

impl RedisStore {
    /// Connects to the server at `url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the server is unreachable.
    pub fn open(url: &str) -> StoreResult<Self> {
        let client = redis::Client::open(url)?;
        let conn = client.get_connection()?;
        tracing::debug!(url = %url, "redis connection established");
        Ok(Self {
            url: url.to_string(),
            conn: Mutex::new(conn),
        })
    }

    /// Returns the URL this store is connected to.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    fn query<T: redis::FromRedisValue>(&self, cmd: &redis::Cmd) -> StoreResult<T> {
        let mut conn = self.conn.lock();
        Ok(cmd.query(&mut *conn)?)
    }
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

fn push_command(pipe: &mut redis::Pipeline, command: &Command) {
    pipe.cmd(command.name());
    match command {
        Command::HSet { key, field, value } => {
            pipe.arg(key).arg(field).arg(value);
        }
        Command::HMSet { key, fields } => {
            pipe.arg(key);
            for (field, value) in fields {
                pipe.arg(field).arg(value);
            }
        }
        Command::HDel { key, field } => {
            pipe.arg(key).arg(field);
        }
        Command::HIncrBy { key, field, by } => {
            pipe.arg(key).arg(field).arg(*by);
        }
        Command::SAdd { key, members } | Command::SRem { key, members } => {
            pipe.arg(key).arg(members);
        }
        Command::Del { keys } => {
            pipe.arg(keys);
        }
        Command::SInterStore { dest, keys }
        | Command::SUnionStore { dest, keys }
        | Command::SDiffStore { dest, keys } => {
            pipe.arg(dest).arg(keys);
        }
    }
    pipe.ignore();
}

fn script_value(value: redis::Value) -> ScriptValue {
    match value {
        redis::Value::Nil => ScriptValue::Nil,
        redis::Value::Int(n) => ScriptValue::Int(n),
        redis::Value::Data(bytes) => ScriptValue::Bulk(String::from_utf8_lossy(&bytes).into_owned()),
        redis::Value::Bulk(items) => ScriptValue::Array(items.into_iter().map(script_value).collect()),
        redis::Value::Status(s) => ScriptValue::Status(s),
        redis::Value::Okay => ScriptValue::Status("OK".to_string()),
    }
}

fn script_error(sha: &str, err: redis::RedisError) -> StoreError {
    if err.kind() == redis::ErrorKind::NoScriptError {
        StoreError::NoScript {
            sha: sha.to_string(),
        }
    } else {
        StoreError::Redis(err)
    }
}

impl Store for RedisStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.query(redis::cmd("GET").arg(key))
    }

    fn incr(&self, key: &str) -> StoreResult<i64> {
        self.query(redis::cmd("INCR").arg(key))
    }

    fn hget(&self, key: &str, field: &str) -> StoreResult<Option<String>> {
        self.query(redis::cmd("HGET").arg(key).arg(field))
    }

    fn hgetall(&self, key: &str) -> StoreResult<HashMap<String, String>> {
        self.query(redis::cmd("HGETALL").arg(key))
    }

    fn hgetall_many(&self, keys: &[String]) -> StoreResult<Vec<HashMap<String, String>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut pipe = redis::pipe();
        for key in keys {
            pipe.cmd("HGETALL").arg(key);
        }
        let mut conn = self.conn.lock();
        Ok(pipe.query(&mut *conn)?)
    }

    fn hincrby(&self, key: &str, field: &str, by: i64) -> StoreResult<i64> {
        self.query(redis::cmd("HINCRBY").arg(key).arg(field).arg(by))
    }

    fn sismember(&self, key: &str, member: &str) -> StoreResult<bool> {
        self.query(redis::cmd("SISMEMBER").arg(key).arg(member))
    }

    fn scard(&self, key: &str) -> StoreResult<usize> {
        self.query(redis::cmd("SCARD").arg(key))
    }

    fn smembers(&self, key: &str) -> StoreResult<Vec<String>> {
        self.query(redis::cmd("SMEMBERS").arg(key))
    }

    fn exists(&self, key: &str) -> StoreResult<bool> {
        self.query(redis::cmd("EXISTS").arg(key))
    }

    fn keys(&self, pattern: &str) -> StoreResult<Vec<String>> {
        let mut keys: Vec<String> = self.query(redis::cmd("KEYS").arg(pattern))?;
        keys.sort();
        Ok(keys)
    }

    fn flushdb(&self) -> StoreResult<()> {
        self.query(&redis::cmd("FLUSHDB"))
    }

    fn sort(&self, key: &str, args: &SortArgs) -> StoreResult<Vec<String>> {
        let mut cmd = redis::cmd("SORT");
        cmd.arg(key);
        if let Some(by) = &args.by {
            cmd.arg("BY").arg(by);
        }
        if let Some((offset, count)) = args.limit {
            cmd.arg("LIMIT").arg(offset).arg(count);
        }
        if args.desc {
            cmd.arg("DESC");
        }
        if args.alpha {
            cmd.arg("ALPHA");
        }
        self.query(&cmd)
    }

    fn apply(&self, commands: Vec<Command>) -> StoreResult<()> {
        if commands.is_empty() {
            return Ok(());
        }
        let mut pipe = redis::pipe();
        for command in &commands {
            push_command(&mut pipe, command);
        }
        let mut conn = self.conn.lock();
        pipe.query::<()>(&mut *conn)?;
        Ok(())
    }

    fn exec(&self, commands: Vec<Command>) -> StoreResult<bool> {
        let mut pipe = redis::pipe();
        pipe.atomic();
        for command in &commands {
            push_command(&mut pipe, command);
        }
        let mut conn = self.conn.lock();
        // EXEC replies nil when a watched key changed.
        let reply: Option<()> = pipe.query(&mut *conn)?;
        if reply.is_none() {
            tracing::debug!(url = %self.url, "watched key changed, atomic block discarded");
        }
        Ok(reply.is_some())
    }

    fn watch(&self, keys: &[String]) -> StoreResult<()> {
        if keys.is_empty() {
            return Ok(());
        }
        self.query(redis::cmd("WATCH").arg(keys))
    }

    fn unwatch(&self) -> StoreResult<()> {
        self.query(&redis::cmd("UNWATCH"))
    }

    fn eval_sha(
        &self,
        sha: &str,
        keys: &[String],
        args: &[String],
    ) -> StoreResult<ScriptValue> {
        let mut conn = self.conn.lock();
        redis::cmd("EVALSHA")
            .arg(sha)
            .arg(keys.len())
            .arg(keys)
            .arg(args)
            .query::<redis::Value>(&mut *conn)
            .map(script_value)
            .map_err(|e| script_error(sha, e))
    }

    fn eval(&self, source: &str, keys: &[String], args: &[String]) -> StoreResult<ScriptValue> {
        let mut conn = self.conn.lock();
        let value: redis::Value = redis::cmd("EVAL")
            .arg(source)
            .arg(keys.len())
            .arg(keys)
            .arg(args)
            .query(&mut *conn)?;
        Ok(script_value(value))
    }
}
