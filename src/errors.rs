// Omniclass Errors
//
// One variant per failure class. Every failure is synchronous and fatal to
// the single call that produced it; nothing is retried.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Malformed class, generic, union, or property declaration.
    #[error("definition error: {0}")]
    Definition(String),

    /// A value assigned to a property violates its declared type constraint.
    #[error("property `{property}` expects {expected}, got `{actual}`")]
    TypeConstraint {
        property: String,
        expected: String,
        actual: String,
    },

    /// Instance-level validators rejected the result of a construction or
    /// mutation. Messages are collected root-to-leaf.
    #[error("validation failed: {}", messages.join("; "))]
    Validation { messages: Vec<String> },

    /// Unknown property name on get/set.
    #[error("unknown property `{property}` on class `{class}`")]
    PropertyNotFound { property: String, class: String },

    /// Dispatch exhausted every ancestor path and both legacy fallbacks.
    #[error("no applicable method for `{generic}` applied to ({})", classes.join(", "))]
    NoApplicableMethod {
        generic: String,
        classes: Vec<String>,
    },

    /// A structural invariant was broken (e.g. the ancestor-chain bound).
    #[error("internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_concatenation() {
        let err = Error::Validation {
            messages: vec!["end must not precede start".into(), "length is negative".into()],
        };
        assert_eq!(
            err.to_string(),
            "validation failed: end must not precede start; length is negative"
        );
    }

    #[test]
    fn test_no_applicable_method_names_classes() {
        let err = Error::NoApplicableMethod {
            generic: "bar".into(),
            classes: vec!["string".into(), "numeric".into()],
        };
        assert_eq!(
            err.to_string(),
            "no applicable method for `bar` applied to (string, numeric)"
        );
    }
}
