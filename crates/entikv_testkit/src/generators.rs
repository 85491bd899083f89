//! Property-based test generators using proptest.
//!
//! Provides strategies for generating model rows and query inputs that
//! stay inside the key namespace rules.

use proptest::prelude::*;

/// Strategy for generating valid model names.
pub fn model_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Z][a-zA-Z0-9_]{0,15}").expect("Invalid regex")
}

/// Strategy for generating first names from a small pool, so index sets
/// overlap.
pub fn fname_strategy() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["Ann", "Bob", "Cid", "Dee", "Eve"]).prop_map(str::to_string)
}

/// Strategy for generating attribute values, including characters that
/// are meaningful in keys and patterns.
pub fn attribute_value_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z0-9 :*?_.-]{0,24}").expect("Invalid regex")
}

/// One sample user row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRow {
    /// Local part of the email; the fixture appends a domain.
    pub handle: String,
    /// First name.
    pub fname: String,
}

impl UserRow {
    /// Returns the email address for this row.
    pub fn email(&self) -> String {
        format!("{}@x.io", self.handle)
    }
}

/// Strategy for generating user rows with possibly colliding handles.
pub fn user_row_strategy() -> impl Strategy<Value = UserRow> {
    (
        prop::sample::select(vec!["ann", "bob", "cid", "dee", "eve", "fay", "gus"]),
        fname_strategy(),
    )
        .prop_map(|(handle, fname)| UserRow {
            handle: handle.to_string(),
            fname,
        })
}

/// Operations on the sample `User` model.
#[derive(Debug, Clone)]
pub enum UserOperation {
    /// Create a user.
    Create(UserRow),
    /// Change the first name of the n-th live user.
    Rename {
        /// Position among live users, taken modulo their count.
        index: usize,
        /// New first name.
        fname: String,
    },
    /// Delete the n-th live user.
    Delete {
        /// Position among live users, taken modulo their count.
        index: usize,
    },
}

/// Strategy for generating a single user operation.
pub fn user_operation_strategy() -> impl Strategy<Value = UserOperation> {
    prop_oneof![
        3 => user_row_strategy().prop_map(UserOperation::Create),
        2 => (any::<usize>(), fname_strategy())
            .prop_map(|(index, fname)| UserOperation::Rename { index, fname }),
        1 => any::<usize>().prop_map(|index| UserOperation::Delete { index }),
    ]
}

/// Strategy for generating a sequence of user operations.
pub fn user_operations_strategy(max_ops: usize) -> impl Strategy<Value = Vec<UserOperation>> {
    prop::collection::vec(user_operation_strategy(), 1..=max_ops)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::test_runner::TestRunner;

    #[test]
    fn model_names_have_no_separator() {
        let mut runner = TestRunner::default();
        runner
            .run(&model_name_strategy(), |name| {
                prop_assert!(!name.is_empty());
                prop_assert!(!name.contains(':'));
                Ok(())
            })
            .unwrap();
    }

    proptest! {
        #[test]
        fn emails_are_well_formed(row in user_row_strategy()) {
            let email = row.email();
            prop_assert!(email.ends_with("@x.io"));
            prop_assert!(!row.handle.is_empty());
        }
    }
}
