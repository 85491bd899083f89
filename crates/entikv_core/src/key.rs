//! Key namespace.
//!
//! Every address the engine touches is derived here, from the model name,
//! the instance id and sub-namespace segments. The literal layouts are part
//! of the on-store format and must not change:
//!
//! | key | holds |
//! |-----|-------|
//! | `<Model>:<id>` | attribute hash |
//! | `<Model>:all` | membership set |
//! | `<Model>:id` | id sequence |
//! | `<Model>:uniques:<attr>` | unique value -> id hash |
//! | `<Model>:indices:<attr>:<value>` | index membership set |
//! | `<Model>:<id>:<name>` | declared sub-collection set |
//! | `<Model>:<id>:counters` | counter hash |
//! | `<Model>:temp:<uuid>` | scratch set for query materialization |

use std::fmt;
use uuid::Uuid;

/// Separator between key segments.
pub const SEPARATOR: char = ':';

/// Suffix of the per-instance counter hash. Shares the `<Model>:<id>:<name>`
/// namespace with declared sets, so no field may use it.
pub const COUNTERS: &str = "counters";

/// A store address.
///
/// Keys are plain strings with no behavior beyond addressing; two keys are
/// equal iff their string forms are equal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Key(String);

impl Key {
    /// Creates the root key of a model.
    #[must_use]
    pub fn new(model: &str) -> Self {
        Self(model.to_string())
    }

    /// Appends a segment.
    #[must_use]
    pub fn join(&self, segment: impl fmt::Display) -> Self {
        Self(format!("{}{SEPARATOR}{segment}", self.0))
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Converts the key into its string form.
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Key {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<Key> for String {
    fn from(key: Key) -> Self {
        key.0
    }
}

/// `<Model>:<id>`
#[must_use]
pub fn attributes(model: &str, id: &str) -> Key {
    Key::new(model).join(id)
}

/// `<Model>:all`
#[must_use]
pub fn all(model: &str) -> Key {
    Key::new(model).join("all")
}

/// `<Model>:id`
#[must_use]
pub fn id_sequence(model: &str) -> Key {
    Key::new(model).join("id")
}

/// `<Model>:uniques:<attr>`
#[must_use]
pub fn uniques(model: &str, attribute: &str) -> Key {
    Key::new(model).join("uniques").join(attribute)
}

/// `<Model>:indices:<attr>:<value>`
#[must_use]
pub fn index(model: &str, attribute: &str, value: &str) -> Key {
    Key::new(model).join("indices").join(attribute).join(value)
}

/// `<Model>:<id>:<name>`
#[must_use]
pub fn collection(model: &str, id: &str, name: &str) -> Key {
    attributes(model, id).join(name)
}

/// `<Model>:<id>:counters`
#[must_use]
pub fn counters(model: &str, id: &str) -> Key {
    attributes(model, id).join(COUNTERS)
}

/// `<Model>:temp:<uuid>` with a fresh v4 uuid.
#[must_use]
pub fn temp(model: &str) -> Key {
    Key::new(model).join("temp").join(Uuid::new_v4())
}

/// `SORT ... BY` pattern for a hash attribute: `<Model>:*-><attr>`.
#[must_use]
pub fn sort_by_attribute(model: &str, attribute: &str) -> String {
    format!("{model}{SEPARATOR}*->{attribute}")
}

/// `SORT ... BY` pattern for a counter: `<Model>:*:counters-><attr>`.
#[must_use]
pub fn sort_by_counter(model: &str, counter: &str) -> String {
    format!("{model}{SEPARATOR}*{SEPARATOR}{COUNTERS}->{counter}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_layouts() {
        assert_eq!(attributes("User", "1").as_str(), "User:1");
        assert_eq!(all("User").as_str(), "User:all");
        assert_eq!(id_sequence("User").as_str(), "User:id");
        assert_eq!(uniques("User", "email").as_str(), "User:uniques:email");
        assert_eq!(
            index("User", "fname", "John").as_str(),
            "User:indices:fname:John"
        );
        assert_eq!(collection("User", "1", "posts").as_str(), "User:1:posts");
        assert_eq!(counters("User", "1").as_str(), "User:1:counters");
        assert_eq!(sort_by_attribute("User", "name"), "User:*->name");
        assert_eq!(sort_by_counter("User", "votes"), "User:*:counters->votes");
    }

    #[test]
    fn temp_keys_are_unique() {
        let a = temp("User");
        let b = temp("User");
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("User:temp:"));
        assert_eq!(a.as_str().len(), "User:temp:".len() + 36);
    }

    #[test]
    fn equality_is_string_equality() {
        assert_eq!(Key::new("User").join(1), attributes("User", "1"));
        assert_eq!(String::from(all("Post")), "Post:all");
    }
}
