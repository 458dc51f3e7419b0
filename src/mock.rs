//! # Mock Resolver & Testing Guide
//!
//! [`MockResolver`] implements [`CollaboratorResolver`] from a queue of
//! expectations instead of a provider table. Use it to check which tokens an
//! override rule asks for, in which order, and how the mapper behaves when a
//! token is missing.
//!
//! ## When to use the Mock vs a ProviderMap
//!
//! | Feature | MockResolver | ProviderMap |
//! |---------|--------------|-------------|
//! | **Order checked** | Yes, tokens must arrive as expected | No |
//! | **Missing token** | `return_missing()` | leave it out |
//! | **Unexpected token** | panics | `UnresolvedCollaborator` |
//! | **Use Case** | Asserting a rule's wiring | Running rules with real collaborators |
//!
//! ## Example
//!
//! ```rust
//! use resource_mapper::mock::MockResolver;
//! use resource_mapper::{fields, Class, Object, OverrideRule, Resource, ResourceMapper};
//!
//! #[tokio::main]
//! async fn main() {
//!     // 1. Setup Mocks
//!     let mock = MockResolver::new();
//!     mock.expect_resolve("prefix").return_instance(String::from("usr_"));
//!
//!     // 2. Declare a rule that injects the token
//!     let user = Class::resource("UserResource")
//!         .field("id")
//!         .rule(OverrideRule::from_fn(["prefix"], |data, injected| {
//!             let prefix = injected.get::<String>(0)?;
//!             Ok(fields! { "id" => format!("{prefix}{}", data.field("id").as_i64().unwrap_or(0)) })
//!         }))
//!         .build()
//!         .unwrap();
//!
//!     // 3. Map through a mapper wired to the mock
//!     let mapper = ResourceMapper::builder().resolver(mock.clone()).build();
//!     let json = mapper
//!         .map_to_json(Resource::make(&user, Object::new().with("id", 7)))
//!         .await
//!         .unwrap();
//!     assert_eq!(json["id"], "usr_7");
//!
//!     // 4. Every expectation was consumed
//!     mock.verify();
//! }
//! ```
//!
//! ## Testing Failure Scenarios
//!
//! ```rust
//! use resource_mapper::mock::MockResolver;
//! use resource_mapper::{CollaboratorResolver, MapperError};
//!
//! let mock = MockResolver::new();
//! mock.expect_resolve("mailer").return_missing();
//!
//! let result = mock.resolve(&"mailer".into());
//! assert!(matches!(result, Err(MapperError::UnresolvedCollaborator { .. })));
//! ```

use crate::error::{MapperError, Result};
use crate::mapper::lock;
use crate::resolver::{Collaborator, CollaboratorResolver, InjectionToken};
use std::any::Any;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

// =============================================================================
// EXPECTATION BUILDER API
// =============================================================================

/// An expected `resolve` call and what it answers.
struct Expectation {
    token: InjectionToken,
    response: Option<Collaborator>,
}

/// A collaborator resolver driven by queued expectations.
///
/// Clones share the same queue, so one clone can be handed to the mapper and
/// another kept for [`verify`](Self::verify).
#[derive(Clone, Default)]
pub struct MockResolver {
    expectations: Arc<Mutex<VecDeque<Expectation>>>,
}

impl MockResolver {
    /// Creates a mock with no expectations.
    pub fn new() -> Self {
        Self::default()
    }

    /// Expects the next `resolve` call to ask for `token`.
    pub fn expect_resolve(&self, token: impl Into<InjectionToken>) -> ResolveExpectationBuilder {
        ResolveExpectationBuilder {
            token: token.into(),
            expectations: self.expectations.clone(),
        }
    }

    /// Expectations not consumed yet.
    pub fn remaining(&self) -> usize {
        lock(&self.expectations).len()
    }

    /// Verifies that all expectations were met.
    pub fn verify(&self) {
        let remaining = self.remaining();
        if remaining != 0 {
            panic!("Not all expectations were met. {remaining} remaining");
        }
    }
}

impl CollaboratorResolver for MockResolver {
    fn resolve(&self, token: &InjectionToken) -> Result<Collaborator> {
        let expectation = lock(&self.expectations).pop_front();
        match expectation {
            Some(Expectation { token: expected, response }) if expected == *token => {
                response.ok_or_else(|| MapperError::UnresolvedCollaborator {
                    token: token.to_string(),
                })
            }
            Some(Expectation { token: expected, .. }) => {
                panic!("Unexpected token {token}, expected {expected}")
            }
            None => panic!("Unexpected resolve of {token} with no expectations left"),
        }
    }
}

/// Builder for `resolve` expectations.
pub struct ResolveExpectationBuilder {
    token: InjectionToken,
    expectations: Arc<Mutex<VecDeque<Expectation>>>,
}

impl ResolveExpectationBuilder {
    /// Answers with `instance`.
    pub fn return_instance<T: Any + Send + Sync>(self, instance: T) {
        self.return_shared(Arc::new(instance));
    }

    /// Answers with an already shared instance.
    pub fn return_shared(self, instance: Collaborator) {
        self.push(Some(instance));
    }

    /// Answers as if the token were not registered.
    pub fn return_missing(self) {
        self.push(None);
    }

    fn push(self, response: Option<Collaborator>) {
        lock(&self.expectations).push_back(Expectation {
            token: self.token,
            response,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Clock;

    #[test]
    fn test_mock_resolver_answers_in_order() {
        let mock = MockResolver::new();
        mock.expect_resolve("a").return_instance(1u8);
        mock.expect_resolve(InjectionToken::of::<Clock>()).return_instance(Clock);
        assert_eq!(mock.remaining(), 2);

        let a = mock.resolve(&"a".into()).unwrap();
        assert_eq!(*a.downcast_ref::<u8>().unwrap(), 1);
        assert!(mock.resolve(&InjectionToken::of::<Clock>()).unwrap().is::<Clock>());
        mock.verify();
    }

    #[test]
    fn test_mock_resolver_missing_token() {
        let mock = MockResolver::new();
        mock.expect_resolve("gone").return_missing();
        let err = mock.resolve(&"gone".into()).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    #[should_panic(expected = "Unexpected token")]
    fn test_mock_resolver_rejects_other_token() {
        let mock = MockResolver::new();
        mock.expect_resolve("a").return_instance(1u8);
        let _ = mock.resolve(&"b".into());
    }

    #[test]
    #[should_panic(expected = "Not all expectations were met")]
    fn test_verify_reports_leftovers() {
        let mock = MockResolver::new();
        mock.expect_resolve("a").return_missing();
        mock.verify();
    }
}
