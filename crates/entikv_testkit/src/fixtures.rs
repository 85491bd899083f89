//! Test fixtures and database helpers.
//!
//! Provides sample models and convenience functions for setting up test
//! databases.

use entikv_core::{Config, Database, Entity, Schema};
use entikv_store::{Endpoint, MemoryServer};
use std::sync::Arc;

/// Environment variable naming a Redis server for tests that need one.
pub const REDIS_URL_VAR: &str = "ENTIKV_REDIS_URL";

/// A test database together with the server behind it.
pub struct TestDatabase {
    /// The database instance.
    pub db: Database,
    /// The in-memory server, if any, for inspecting raw keys.
    pub server: Option<MemoryServer>,
}

impl TestDatabase {
    /// Creates a database over a fresh in-memory server.
    pub fn memory() -> Self {
        let server = MemoryServer::new();
        Self {
            db: Database::open(Config::new().endpoint(Endpoint::Memory(server.clone()))),
            server: Some(server),
        }
    }

    /// Creates another handle on the same server, as a second process
    /// would see it.
    ///
    /// # Panics
    ///
    /// Panics if this database is not memory-backed.
    pub fn peer(&self) -> Database {
        let server = self.server.clone().expect("peer needs a memory server");
        Database::open(Config::new().endpoint(Endpoint::Memory(server)))
    }

    /// Creates a database over the Redis server named by
    /// [`REDIS_URL_VAR`], flushing its current database first.
    ///
    /// Returns `None` when the variable is unset so callers can skip.
    pub fn redis() -> Option<Self> {
        let url = std::env::var(REDIS_URL_VAR).ok()?;
        let db = Database::open(Config::new().endpoint(Endpoint::redis(url)));
        db.connection("flush")
            .expect("Failed to connect to Redis")
            .flushdb()
            .expect("Failed to flush Redis");
        Some(Self { db, server: None })
    }

    /// Returns the number of keys on the memory server.
    ///
    /// # Panics
    ///
    /// Panics if this database is not memory-backed.
    pub fn key_count(&self) -> usize {
        self.server
            .as_ref()
            .expect("key_count needs a memory server")
            .key_count()
    }
}

impl std::ops::Deref for TestDatabase {
    type Target = Database;

    fn deref(&self) -> &Self::Target {
        &self.db
    }
}

/// Runs a test with a temporary in-memory database.
pub fn with_temp_db<F, R>(f: F) -> R
where
    F: FnOnce(&Database) -> R,
{
    let test_db = TestDatabase::memory();
    f(&test_db.db)
}

/// The sample models, registered on one database.
#[derive(Debug, Clone)]
pub struct Samples {
    /// `User`: unique `email`, indexed `fname`, computed `initial`, counter
    /// `logins`, a `posts` reverse collection and a `friends` set.
    pub users: Arc<Schema>,
    /// `Post`: indexed `status`, a `author` reference to `User`, counter
    /// `votes`.
    pub posts: Arc<Schema>,
}

/// Returns the sample `User` schema.
pub fn user_schema() -> Arc<Schema> {
    Schema::builder("User")
        .attribute("email")
        .attribute("fname")
        .attribute("lname")
        .computed("initial", |attrs| {
            attrs
                .get("fname")
                .and_then(|f| f.chars().next())
                .map(|c| vec![c.to_uppercase().to_string()])
                .unwrap_or_default()
        })
        .counter("logins")
        .unique("email")
        .index("fname")
        .index("initial")
        .collection("posts", "Post", "author")
        .set("friends", "User")
        .validate(|v| {
            v.assert_email("email");
        })
        .build()
        .expect("sample User schema is valid")
}

/// Returns the sample `Post` schema.
pub fn post_schema() -> Arc<Schema> {
    Schema::builder("Post")
        .attribute("title")
        .attribute("status")
        .reference("author", "User")
        .counter("votes")
        .index("status")
        .build()
        .expect("sample Post schema is valid")
}

/// Registers the sample models.
pub fn register_samples(db: &Database) -> Samples {
    Samples {
        users: db.register(user_schema()).expect("Failed to register User"),
        posts: db.register(post_schema()).expect("Failed to register Post"),
    }
}

/// Creates and saves a user.
pub fn create_user(db: &Database, users: &Arc<Schema>, email: &str, fname: &str) -> Entity {
    Entity::create(db, Arc::clone(users), [("email", email), ("fname", fname)])
        .expect("Failed to create user")
}

/// Creates and saves a post written by `author`.
pub fn create_post(
    db: &Database,
    posts: &Arc<Schema>,
    author: &Entity,
    title: &str,
    status: &str,
) -> Entity {
    let mut post = Entity::new(Arc::clone(posts), [("title", title), ("status", status)])
        .expect("Failed to build post");
    post.set_reference("author", author)
        .expect("Failed to set author");
    post.save(db).expect("Failed to save post");
    post
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;

    /// Creates a database with `count` users named `user<i>@x.io`, first
    /// names cycling through `names`.
    pub fn populated_users(count: usize, names: &[&str]) -> (TestDatabase, Samples, Vec<Entity>) {
        let test_db = TestDatabase::memory();
        let samples = register_samples(&test_db);
        let users = (0..count)
            .map(|i| {
                let name = names[i % names.len()];
                create_user(&test_db, &samples.users, &format!("user{i}@x.io"), name)
            })
            .collect();
        (test_db, samples, users)
    }
}
