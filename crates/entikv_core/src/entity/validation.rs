//! Validation assertions.

use crate::entity::Entity;
use std::collections::BTreeMap;
use std::fmt;
use std::ops::RangeInclusive;

/// Why an attribute failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// Missing or blank.
    NotPresent,
    /// Not an integer.
    NotNumeric,
    /// Length outside the allowed range.
    NotInRange,
    /// Not one of the allowed values.
    NotValid,
    /// Different from the expected value.
    NotEqual,
    /// Not an email address.
    NotEmail,
    /// Application-defined reason.
    Custom(String),
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotPresent => f.write_str("not_present"),
            Self::NotNumeric => f.write_str("not_numeric"),
            Self::NotInRange => f.write_str("not_in_range"),
            Self::NotValid => f.write_str("not_valid"),
            Self::NotEqual => f.write_str("not_equal"),
            Self::NotEmail => f.write_str("not_email"),
            Self::Custom(reason) => f.write_str(reason),
        }
    }
}

/// Violations collected by one validation run, keyed by attribute.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(BTreeMap<String, Vec<Violation>>);

impl ValidationErrors {
    /// Returns true if nothing was violated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of attributes with violations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns the violations of one attribute.
    #[must_use]
    pub fn get(&self, attribute: &str) -> &[Violation] {
        self.0.get(attribute).map(Vec::as_slice).unwrap_or_default()
    }

    /// Iterates over attributes and their violations.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Violation])> {
        self.0.iter().map(|(a, v)| (a.as_str(), v.as_slice()))
    }

    fn push(&mut self, attribute: &str, violation: Violation) {
        self.0
            .entry(attribute.to_string())
            .or_default()
            .push(violation);
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (attribute, violations)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{attribute}: ")?;
            for (j, v) in violations.iter().enumerate() {
                if j > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{v}")?;
            }
        }
        Ok(())
    }
}

/// Assertion helper handed to a schema's validation hook.
///
/// Every assertion records a [`Violation`] on failure and returns whether
/// it passed, so hooks can skip dependent checks:
///
/// ```rust
/// use entikv_core::Schema;
///
/// let schema = Schema::builder("User")
///     .attribute("email")
///     .validate(|v| {
///         if v.assert_present("email") {
///             v.assert_email("email");
///         }
///     })
///     .build()
///     .unwrap();
/// # let _ = schema;
/// ```
pub struct Validations<'e> {
    entity: &'e Entity,
    errors: ValidationErrors,
}

impl<'e> Validations<'e> {
    pub(crate) fn new(entity: &'e Entity) -> Self {
        Self {
            entity,
            errors: ValidationErrors::default(),
        }
    }

    pub(crate) fn into_errors(self) -> ValidationErrors {
        self.errors
    }

    /// Returns the entity under validation.
    #[must_use]
    pub fn entity(&self) -> &'e Entity {
        self.entity
    }

    /// Returns the value of an attribute.
    #[must_use]
    pub fn value(&self, attribute: &str) -> Option<&'e str> {
        self.entity.attr(attribute)
    }

    /// Records `violation` against `attribute` unless `condition` holds.
    pub fn assert(&mut self, condition: bool, attribute: &str, violation: Violation) -> bool {
        if !condition {
            self.errors.push(attribute, violation);
        }
        condition
    }

    /// The attribute is set and not blank.
    pub fn assert_present(&mut self, attribute: &str) -> bool {
        let present = self.value(attribute).is_some_and(|v| !v.trim().is_empty());
        self.assert(present, attribute, Violation::NotPresent)
    }

    /// The attribute is an optionally negative integer.
    pub fn assert_numeric(&mut self, attribute: &str) -> bool {
        let numeric = self.value(attribute).is_some_and(|v| {
            let digits = v.strip_prefix('-').unwrap_or(v);
            !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
        });
        self.assert(numeric, attribute, Violation::NotNumeric)
    }

    /// The attribute's length in characters lies within `range`.
    pub fn assert_length(&mut self, attribute: &str, range: RangeInclusive<usize>) -> bool {
        let in_range = self
            .value(attribute)
            .is_some_and(|v| range.contains(&v.chars().count()));
        self.assert(in_range, attribute, Violation::NotInRange)
    }

    /// The attribute is one of `allowed`.
    pub fn assert_member(&mut self, attribute: &str, allowed: &[&str]) -> bool {
        let member = self.value(attribute).is_some_and(|v| allowed.contains(&v));
        self.assert(member, attribute, Violation::NotValid)
    }

    /// The attribute equals `expected`.
    pub fn assert_equal(&mut self, attribute: &str, expected: &str) -> bool {
        let equal = self.value(attribute) == Some(expected);
        self.assert(equal, attribute, Violation::NotEqual)
    }

    /// The attribute looks like an email address.
    pub fn assert_email(&mut self, attribute: &str) -> bool {
        let email = self.value(attribute).is_some_and(looks_like_email);
        self.assert(email, attribute, Violation::NotEmail)
    }
}

fn looks_like_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !value.chars().any(char::is_whitespace)
        && domain.contains('.')
        && domain.split('.').all(|label| !label.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Schema;

    fn entity(pairs: &[(&str, &str)]) -> Entity {
        let schema = Schema::builder("User")
            .attribute("email")
            .attribute("age")
            .attribute("role")
            .attribute("name")
            .build()
            .unwrap();
        Entity::new(schema, pairs.iter().copied()).unwrap()
    }

    fn run(entity: &Entity, hook: impl Fn(&mut Validations<'_>)) -> ValidationErrors {
        let mut v = Validations::new(entity);
        hook(&mut v);
        v.into_errors()
    }

    #[test]
    fn presence_rejects_blank_values() {
        let errors = run(&entity(&[("name", "  ")]), |v| {
            v.assert_present("name");
            v.assert_present("email");
        });
        assert_eq!(errors.get("name"), [Violation::NotPresent]);
        assert_eq!(errors.get("email"), [Violation::NotPresent]);
    }

    #[test]
    fn numeric_accepts_signed_integers_only() {
        for (value, ok) in [("42", true), ("-7", true), ("4.2", false), ("-", false), ("", false)] {
            let errors = run(&entity(&[("age", value)]), |v| {
                v.assert_numeric("age");
            });
            assert_eq!(errors.is_empty(), ok, "{value:?}");
        }
    }

    #[test]
    fn email_shape() {
        for (value, ok) in [
            ("a@b.io", true),
            ("a.b@c.d.io", true),
            ("a@b", false),
            ("@b.io", false),
            ("a b@c.io", false),
            ("a@@b.io", false),
            ("a@b..io", false),
        ] {
            let errors = run(&entity(&[("email", value)]), |v| {
                v.assert_email("email");
            });
            assert_eq!(errors.is_empty(), ok, "{value:?}");
        }
    }

    #[test]
    fn length_member_and_equality() {
        let e = entity(&[("name", "Ann"), ("role", "admin")]);
        let errors = run(&e, |v| {
            assert!(v.assert_length("name", 1..=3));
            assert!(!v.assert_length("name", 4..=10));
            assert!(v.assert_member("role", &["admin", "user"]));
            assert!(!v.assert_equal("role", "user"));
        });
        assert_eq!(errors.len(), 2);
        assert_eq!(errors.to_string(), "name: not_in_range; role: not_equal");
    }

    #[test]
    fn custom_assertions() {
        let errors = run(&entity(&[]), |v| {
            v.assert(false, "name", Violation::Custom("taken".into()));
        });
        assert_eq!(errors.to_string(), "name: taken");
    }
}
