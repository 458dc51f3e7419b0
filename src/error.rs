//! # Mapper Errors
//!
//! This module defines the error type shared by every stage of a mapping pass.
//! Failures are never swallowed: whatever a converter or override rule returns
//! travels unchanged (boxed, reachable through `source()`) to the caller of
//! [`ResourceMapper::map`](crate::ResourceMapper::map), and the partial output
//! of that pass is discarded.

/// Boxed error produced by user-supplied converters and override rules.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, MapperError>;

/// Errors that can occur while declaring classes, mapping values or projecting
/// the mapped output to JSON.
#[derive(Debug, thiserror::Error)]
pub enum MapperError {
    /// An override rule asked for a collaborator nobody registered.
    ///
    /// This is a wiring mistake, not a data error, and aborts the pass.
    #[error("No collaborator registered for token {token}")]
    UnresolvedCollaborator { token: String },

    /// A rule read an injected collaborator with the wrong type or index.
    #[error("Injected collaborator #{index} is not a {expected}")]
    InjectionMismatch { index: usize, expected: &'static str },

    /// A converter registered in the mapper registry failed.
    #[error("Converter failed: {0}")]
    Converter(#[source] BoxError),

    /// An override rule's compute function failed.
    #[error("Override rule on {class} failed: {source}")]
    Rule {
        class: String,
        #[source]
        source: BoxError,
    },

    /// A class tried to extend a class of the other kind.
    #[error("Class {class} cannot extend {parent}: {reason}")]
    InvalidHierarchy {
        class: String,
        parent: String,
        reason: &'static str,
    },

    /// Text that does not spell a base-10 integer.
    #[error("Invalid integer literal: {0:?}")]
    InvalidBigInt(String),

    /// The mapped graph still references one of its own ancestors.
    #[error("Mapped output contains a reference cycle")]
    CyclicOutput,

    /// The mapped graph still holds a value with no plain JSON form.
    #[error("Mapped output contains an unconverted {0} value")]
    Unrepresentable(&'static str),
}

impl MapperError {
    /// Whether this error is a setup-time wiring mistake rather than a data problem.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            MapperError::UnresolvedCollaborator { .. }
                | MapperError::InjectionMismatch { .. }
                | MapperError::InvalidHierarchy { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[derive(Debug, thiserror::Error)]
    #[error("database offline")]
    struct Offline;

    #[test]
    fn rule_error_keeps_original_source() {
        let err = MapperError::Rule {
            class: "UserResource".into(),
            source: Box::new(Offline),
        };
        assert_eq!(err.to_string(), "Override rule on UserResource failed: database offline");
        let source = err.source().expect("source");
        assert!(source.downcast_ref::<Offline>().is_some());
        assert!(!err.is_configuration());
    }

    #[test]
    fn unresolved_collaborator_is_configuration() {
        let err = MapperError::UnresolvedCollaborator {
            token: "MailService".into(),
        };
        assert!(err.is_configuration());
        assert_eq!(err.to_string(), "No collaborator registered for token MailService");
    }
}
