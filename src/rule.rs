//! # Override Rules
//!
//! An [`OverrideRule`] replaces or adds output fields for one resource class.
//! It receives the raw payload plus the collaborators it asked for and returns
//! a field map; each returned value is mapped recursively and written over
//! the default projection of that name.
//!
//! Rules are inherited. For `Admin extends User`, `User`'s rule runs first and
//! `Admin`'s second, so `Admin` wins where both write the same field.

use crate::error::{BoxError, MapperError, Result};
use crate::resolver::{Collaborator, InjectionToken};
use crate::value::{Fields, Value};
use async_trait::async_trait;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Builds a [`Fields`] map from `name => value` pairs.
///
/// ```rust
/// use resource_mapper::fields;
///
/// let out = fields! { "id" => 1, "label" => "first" };
/// assert_eq!(out.len(), 2);
/// ```
#[macro_export]
macro_rules! fields {
    ($($name:expr => $value:expr),* $(,)?) => {{
        #[allow(unused_mut)]
        let mut fields = $crate::Fields::new();
        $(fields.insert(::std::string::String::from($name), $crate::Value::from($value));)*
        fields
    }};
}

/// The compute half of an override rule.
///
/// Implement this directly when the computation is asynchronous; synchronous
/// closures can go through [`OverrideRule::from_fn`].
#[async_trait]
pub trait FieldOverride: Send + Sync {
    /// Produces replacement fields from the raw payload.
    async fn compute(&self, data: &Value, injected: &Injected) -> std::result::Result<Fields, BoxError>;
}

struct FnOverride<F>(F);

#[async_trait]
impl<F> FieldOverride for FnOverride<F>
where
    F: Fn(&Value, &Injected) -> std::result::Result<Fields, BoxError> + Send + Sync,
{
    async fn compute(&self, data: &Value, injected: &Injected) -> std::result::Result<Fields, BoxError> {
        (self.0)(data, injected)
    }
}

struct RuleInner {
    injects: Vec<InjectionToken>,
    compute: Box<dyn FieldOverride>,
}

/// A per-class field override: the tokens it injects and how it computes fields.
///
/// Cloning shares the rule; a rule attached to several classes of one chain
/// runs once.
#[derive(Clone)]
pub struct OverrideRule(Arc<RuleInner>);

impl OverrideRule {
    pub fn new<I, T>(injects: I, compute: impl FieldOverride + 'static) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<InjectionToken>,
    {
        Self(Arc::new(RuleInner {
            injects: injects.into_iter().map(Into::into).collect(),
            compute: Box::new(compute),
        }))
    }

    /// Wraps a synchronous closure.
    pub fn from_fn<I, T, F>(injects: I, f: F) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<InjectionToken>,
        F: Fn(&Value, &Injected) -> std::result::Result<Fields, BoxError> + Send + Sync + 'static,
    {
        Self::new(injects, FnOverride(f))
    }

    /// Tokens resolved, in order, before each run.
    pub fn injects(&self) -> &[InjectionToken] {
        &self.0.injects
    }

    pub async fn compute(&self, data: &Value, injected: &Injected) -> std::result::Result<Fields, BoxError> {
        self.0.compute.compute(data, injected).await
    }

    pub fn ptr_eq(&self, other: &OverrideRule) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for OverrideRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OverrideRule")
            .field("injects", &self.0.injects)
            .finish_non_exhaustive()
    }
}

/// Collaborators resolved for one rule run, in the order the rule listed them.
#[derive(Clone, Default)]
pub struct Injected(Vec<Collaborator>);

impl Injected {
    pub fn new(collaborators: Vec<Collaborator>) -> Self {
        Self(collaborators)
    }

    /// Borrows collaborator `index` as a `T`.
    pub fn get<T: Any + Send + Sync>(&self, index: usize) -> Result<&T> {
        self.0
            .get(index)
            .and_then(|c| c.downcast_ref::<T>())
            .ok_or(MapperError::InjectionMismatch {
                index,
                expected: std::any::type_name::<T>(),
            })
    }

    /// Shared handle to collaborator `index`, untyped.
    pub fn shared(&self, index: usize) -> Option<&Collaborator> {
        self.0.get(index)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Injected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Injected").field("len", &self.0.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Object;

    #[tokio::test]
    async fn fn_rule_sees_data_and_collaborators() {
        let rule = OverrideRule::from_fn(["greeting"], |data, injected| {
            let greeting = injected.get::<String>(0)?;
            let name = data.field("name");
            Ok(fields! { "greeting" => format!("{greeting}, {}", name.as_str().unwrap_or("?")) })
        });
        assert_eq!(rule.injects(), [InjectionToken::named("greeting")]);

        let data = Value::Object(Object::new().with("name", "Ada"));
        let injected = Injected::new(vec![Arc::new(String::from("Hello"))]);
        let out = rule.compute(&data, &injected).await.unwrap();
        assert_eq!(out["greeting"].as_str(), Some("Hello, Ada"));
    }

    #[test]
    fn injected_type_mismatch_is_reported() {
        let injected = Injected::new(vec![Arc::new(1u8)]);
        assert_eq!(*injected.get::<u8>(0).unwrap(), 1);
        let err = injected.get::<String>(0).unwrap_err();
        assert!(matches!(err, MapperError::InjectionMismatch { index: 0, .. }));
        assert!(injected.get::<u8>(3).is_err());
    }

    #[test]
    fn clones_share_identity() {
        let rule = OverrideRule::from_fn(Vec::<InjectionToken>::new(), |_, _| Ok(Fields::new()));
        let other = OverrideRule::from_fn(Vec::<InjectionToken>::new(), |_, _| Ok(Fields::new()));
        assert!(rule.ptr_eq(&rule.clone()));
        assert!(!rule.ptr_eq(&other));
    }
}
