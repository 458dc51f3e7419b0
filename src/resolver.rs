//! # Collaborator Resolution
//!
//! Override rules may ask for externally managed instances (services, clocks,
//! repositories). They name them with an [`InjectionToken`]; the mapper asks a
//! [`CollaboratorResolver`] for each token right before the rule runs.
//!
//! The crate does not manage collaborators' lifecycles. [`ProviderMap`] is a
//! fixed lookup table for applications that have no container of their own;
//! anything implementing [`CollaboratorResolver`] can stand in for it.

use crate::error::{MapperError, Result};
use std::any::{Any, TypeId};
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tracing::{error, warn};

/// A live, shared collaborator instance.
pub type Collaborator = Arc<dyn Any + Send + Sync>;

// Forward chains longer than this are treated as unresolvable.
const MAX_FORWARD_HOPS: usize = 16;

/// Names a collaborator.
#[derive(Clone)]
pub enum InjectionToken {
    /// Free-form name, e.g. `"MAIL_SERVICE"`.
    Named(Cow<'static, str>),
    /// The collaborator's own type.
    Type { id: TypeId, name: &'static str },
    /// Computed on use. Lets two modules refer to each other's tokens before
    /// both are defined.
    Forward(Arc<dyn Fn() -> InjectionToken + Send + Sync>),
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum TokenKey {
    Named(String),
    Type(TypeId),
    // Address of the outermost forward closure; never registered.
    Unresolvable(usize),
}

impl InjectionToken {
    pub fn named(name: impl Into<Cow<'static, str>>) -> Self {
        InjectionToken::Named(name.into())
    }

    pub fn of<T: Any>() -> Self {
        InjectionToken::Type {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn forward(f: impl Fn() -> InjectionToken + Send + Sync + 'static) -> Self {
        InjectionToken::Forward(Arc::new(f))
    }

    /// Follows forward references to the concrete token.
    pub fn resolve_forward(&self) -> InjectionToken {
        let mut token = self.clone();
        for _ in 0..MAX_FORWARD_HOPS {
            match token {
                InjectionToken::Forward(f) => token = f(),
                concrete => return concrete,
            }
        }
        token
    }

    fn key(&self) -> TokenKey {
        match self.resolve_forward() {
            InjectionToken::Named(name) => TokenKey::Named(name.into_owned()),
            InjectionToken::Type { id, .. } => TokenKey::Type(id),
            InjectionToken::Forward(_) => match self {
                InjectionToken::Forward(f) => TokenKey::Unresolvable(Arc::as_ptr(f) as *const () as usize),
                _ => TokenKey::Unresolvable(0),
            },
        }
    }

    /// True if forward references end in a concrete token.
    pub fn is_resolvable(&self) -> bool {
        !matches!(self.resolve_forward(), InjectionToken::Forward(_))
    }
}

impl PartialEq for InjectionToken {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for InjectionToken {}

impl Hash for InjectionToken {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl fmt::Display for InjectionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.resolve_forward() {
            InjectionToken::Named(name) => f.write_str(&name),
            InjectionToken::Type { name, .. } => f.write_str(name),
            InjectionToken::Forward(_) => f.write_str("<unresolvable forward reference>"),
        }
    }
}

impl fmt::Debug for InjectionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InjectionToken({self})")
    }
}

impl From<&'static str> for InjectionToken {
    fn from(name: &'static str) -> Self {
        InjectionToken::named(name)
    }
}

/// Looks up collaborators by token.
pub trait CollaboratorResolver: Send + Sync {
    /// Returns the instance registered under `token`.
    ///
    /// A missing token must fail with [`MapperError::UnresolvedCollaborator`].
    fn resolve(&self, token: &InjectionToken) -> Result<Collaborator>;
}

/// Fixed token-to-instance table.
#[derive(Clone, Default)]
pub struct ProviderMap {
    providers: HashMap<TokenKey, Collaborator>,
}

impl ProviderMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `instance` under `token`, replacing any earlier instance.
    pub fn provide<T: Any + Send + Sync>(self, token: impl Into<InjectionToken>, instance: T) -> Self {
        self.provide_shared(token, Arc::new(instance))
    }

    /// Registers `instance` under its own type's token.
    pub fn provide_type<T: Any + Send + Sync>(self, instance: T) -> Self {
        self.provide(InjectionToken::of::<T>(), instance)
    }

    /// Tokens whose forward chain never ends are skipped with a warning.
    pub fn provide_shared(mut self, token: impl Into<InjectionToken>, instance: Collaborator) -> Self {
        let token = token.into();
        if !token.is_resolvable() {
            warn!(%token, "Ignoring provider for unresolvable token");
            return self;
        }
        self.providers.insert(token.key(), instance);
        self
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl CollaboratorResolver for ProviderMap {
    fn resolve(&self, token: &InjectionToken) -> Result<Collaborator> {
        self.providers.get(&token.key()).cloned().ok_or_else(|| {
            error!(%token, "Collaborator not registered");
            MapperError::UnresolvedCollaborator {
                token: token.to_string(),
            }
        })
    }
}

/// Resolver for mappers whose rules inject nothing; every lookup fails.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoCollaborators;

impl CollaboratorResolver for NoCollaborators {
    fn resolve(&self, token: &InjectionToken) -> Result<Collaborator> {
        error!(%token, "No collaborator resolver configured");
        Err(MapperError::UnresolvedCollaborator {
            token: token.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Clock;

    #[test]
    fn resolves_named_and_typed_tokens() {
        let providers = ProviderMap::new()
            .provide("prefix", String::from("usr_"))
            .provide_type(Clock);

        let prefix = providers.resolve(&"prefix".into()).unwrap();
        assert_eq!(prefix.downcast_ref::<String>().unwrap(), "usr_");
        assert!(providers.resolve(&InjectionToken::of::<Clock>()).unwrap().is::<Clock>());
    }

    #[test]
    fn forward_tokens_resolve_lazily() {
        let providers = ProviderMap::new().provide("late", 7u32);
        let token = InjectionToken::forward(|| InjectionToken::named("late"));
        assert_eq!(token, InjectionToken::named("late"));
        assert_eq!(token.to_string(), "late");
        assert_eq!(*providers.resolve(&token).unwrap().downcast_ref::<u32>().unwrap(), 7);
    }

    #[test]
    fn missing_token_is_a_configuration_error() {
        let err = ProviderMap::new().resolve(&"nope".into()).unwrap_err();
        assert!(matches!(&err, MapperError::UnresolvedCollaborator { token } if token == "nope"));
        assert!(err.is_configuration());
        assert!(NoCollaborators.resolve(&"nope".into()).is_err());
    }

    #[test]
    fn endless_forward_chain_is_unresolvable() {
        fn again() -> InjectionToken {
            InjectionToken::forward(again)
        }
        let token = again();
        assert!(ProviderMap::new().provide("x", 1u8).resolve(&token).is_err());
        assert_eq!(token.to_string(), "<unresolvable forward reference>");
        assert!(!token.is_resolvable());
    }

    #[test]
    fn unresolvable_tokens_never_share_a_provider() {
        fn again() -> InjectionToken {
            InjectionToken::forward(again)
        }
        fn other() -> InjectionToken {
            InjectionToken::forward(other)
        }
        let first = again();
        let second = other();
        assert_ne!(first, second);
        assert_eq!(first, first.clone());

        let providers = ProviderMap::new().provide_shared(first.clone(), Arc::new(1u8));
        assert!(providers.is_empty());
        let err = providers.resolve(&second).unwrap_err();
        assert!(matches!(err, MapperError::UnresolvedCollaborator { .. }));
        assert!(providers.resolve(&first).is_err());
    }
}
