//! Write batches.

use crate::key::Key;
use entikv_store::Command;

/// Commands queued by the write phase of a transaction.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WriteBatch {
    commands: Vec<Command>,
}

impl WriteBatch {
    /// Creates an empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a raw command.
    pub fn push(&mut self, command: Command) -> &mut Self {
        self.commands.push(command);
        self
    }

    /// Queues `HSET key field value`.
    pub fn hset(&mut self, key: &Key, field: &str, value: &str) -> &mut Self {
        self.push(Command::HSet {
            key: key.to_string(),
            field: field.to_string(),
            value: value.to_string(),
        })
    }

    /// Queues `HMSET key ...`. An empty field list queues nothing.
    pub fn hmset<'f>(
        &mut self,
        key: &Key,
        fields: impl IntoIterator<Item = (&'f String, &'f String)>,
    ) -> &mut Self {
        let fields: Vec<(String, String)> = fields
            .into_iter()
            .map(|(f, v)| (f.clone(), v.clone()))
            .collect();
        if fields.is_empty() {
            return self;
        }
        self.push(Command::HMSet {
            key: key.to_string(),
            fields,
        })
    }

    /// Queues `HDEL key field`.
    pub fn hdel(&mut self, key: &Key, field: &str) -> &mut Self {
        self.push(Command::HDel {
            key: key.to_string(),
            field: field.to_string(),
        })
    }

    /// Queues `SADD key member`.
    pub fn sadd(&mut self, key: &Key, member: &str) -> &mut Self {
        self.push(Command::SAdd {
            key: key.to_string(),
            members: vec![member.to_string()],
        })
    }

    /// Queues `SREM key member`.
    pub fn srem(&mut self, key: &Key, member: &str) -> &mut Self {
        self.push(Command::SRem {
            key: key.to_string(),
            members: vec![member.to_string()],
        })
    }

    /// Queues `DEL key [key ...]`. An empty key list queues nothing.
    pub fn del(&mut self, keys: impl IntoIterator<Item = Key>) -> &mut Self {
        let keys: Vec<String> = keys.into_iter().map(Key::into_string).collect();
        if keys.is_empty() {
            return self;
        }
        self.push(Command::Del { keys })
    }

    /// Returns the queued commands.
    #[must_use]
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Returns the number of queued commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Returns true if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Consumes the batch.
    #[must_use]
    pub fn into_commands(self) -> Vec<Command> {
        self.commands
    }
}
