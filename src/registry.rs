//! # Mapper Registry
//!
//! An ordered list of `(MatchType, Converter)` entries. For a value that is not
//! an array, the mapper takes the first entry whose matcher accepts it, runs the
//! converter and maps the converter's result again.
//!
//! [`MapperRegistry::new`] starts with the built-ins, in this order:
//!
//! 1. [`MatchType::Resource`] - the resource field pipeline
//! 2. [`MatchType::Date`] - `2024-01-01T00:00:00.000Z`
//! 3. [`MatchType::Bytes`] - base64 text
//! 4. [`MatchType::Map`] - object keyed by the keys' string form
//! 5. [`MatchType::Set`] - array in insertion order
//!
//! Entries registered later are consulted after these.

use crate::class::ClassRef;
use crate::error::{BoxError, MapperError, Result};
use crate::mapper::MappingPass;
use crate::value::{iso8601, Object, Value};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use futures::future::try_join_all;
use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Which values an entry applies to.
#[derive(Clone)]
pub enum MatchType {
    Resource,
    Date,
    Bytes,
    Map,
    Set,
    /// Objects and resources whose class is, or descends from, this class.
    Class(ClassRef),
    /// [`Value::Opaque`] holding exactly this type.
    Opaque { id: TypeId, name: &'static str },
}

impl MatchType {
    pub fn opaque<T: Any>() -> Self {
        MatchType::Opaque {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (MatchType::Resource, Value::Resource(_))
            | (MatchType::Date, Value::Date(_))
            | (MatchType::Bytes, Value::Bytes(_))
            | (MatchType::Map, Value::Map(_))
            | (MatchType::Set, Value::Set(_)) => true,
            (MatchType::Class(class), Value::Object(o)) => o.class().is_some_and(|c| c.is_subclass_of(class)),
            (MatchType::Class(class), Value::Resource(r)) => r.class().is_subclass_of(class),
            (MatchType::Opaque { id, .. }, Value::Opaque(o)) => o.type_id() == *id,
            _ => false,
        }
    }

    /// Whether two match types are the same registry key.
    pub fn same_key(&self, other: &MatchType) -> bool {
        match (self, other) {
            (MatchType::Class(a), MatchType::Class(b)) => Arc::ptr_eq(a, b),
            (MatchType::Opaque { id: a, .. }, MatchType::Opaque { id: b, .. }) => a == b,
            _ => std::mem::discriminant(self) == std::mem::discriminant(other),
        }
    }
}

impl fmt::Debug for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchType::Resource => f.write_str("Resource"),
            MatchType::Date => f.write_str("Date"),
            MatchType::Bytes => f.write_str("Bytes"),
            MatchType::Map => f.write_str("Map"),
            MatchType::Set => f.write_str("Set"),
            MatchType::Class(class) => write!(f, "Class({})", class.name()),
            MatchType::Opaque { name, .. } => write!(f, "Opaque({name})"),
        }
    }
}

/// Replaces a matched value with another value.
///
/// The returned value is mapped again, so a converter may hand back resources,
/// containers or anything else the mapper knows how to handle. Use
/// [`MappingPass::map`] to map nested values inside the same pass.
#[async_trait]
pub trait Converter: Send + Sync {
    async fn convert(&self, value: Value, pass: &MappingPass<'_>) -> Result<Value>;
}

/// Adapts a synchronous closure that needs no recursion.
pub struct FnConverter<F>(F);

impl<F> FnConverter<F>
where
    F: Fn(&Value) -> std::result::Result<Value, BoxError> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F> Converter for FnConverter<F>
where
    F: Fn(&Value) -> std::result::Result<Value, BoxError> + Send + Sync,
{
    async fn convert(&self, value: Value, _pass: &MappingPass<'_>) -> Result<Value> {
        (self.0)(&value).map_err(MapperError::Converter)
    }
}

struct Entry {
    match_type: MatchType,
    converter: Arc<dyn Converter>,
}

/// Ordered `(MatchType, Converter)` entries; first match wins.
pub struct MapperRegistry {
    entries: Vec<Entry>,
}

impl MapperRegistry {
    /// A registry with the built-in converters.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry
            .register(MatchType::Resource, ResourceConverter)
            .register(MatchType::Date, DateConverter)
            .register(MatchType::Bytes, BytesConverter)
            .register(MatchType::Map, MapConverter)
            .register(MatchType::Set, SetConverter);
        registry
    }

    /// A registry with no entries at all, resources included.
    pub fn empty() -> Self {
        Self { entries: Vec::new() }
    }

    /// Appends an entry. Registering an existing key swaps its converter and
    /// keeps the entry's original position.
    pub fn register(&mut self, match_type: MatchType, converter: impl Converter + 'static) -> &mut Self {
        self.register_shared(match_type, Arc::new(converter))
    }

    pub fn register_shared(&mut self, match_type: MatchType, converter: Arc<dyn Converter>) -> &mut Self {
        match self.entries.iter_mut().find(|e| e.match_type.same_key(&match_type)) {
            Some(entry) => {
                debug!(?match_type, "Replacing converter");
                entry.converter = converter;
            }
            None => {
                debug!(?match_type, position = self.entries.len(), "Registering converter");
                self.entries.push(Entry { match_type, converter });
            }
        }
        self
    }

    /// First converter whose match type accepts `value`.
    pub fn lookup(&self, value: &Value) -> Option<&dyn Converter> {
        self.entries
            .iter()
            .find(|e| e.match_type.matches(value))
            .map(|e| e.converter.as_ref())
    }

    pub fn match_types(&self) -> impl Iterator<Item = &MatchType> {
        self.entries.iter().map(|e| &e.match_type)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for MapperRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MapperRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.match_types()).finish()
    }
}

// =============================================================================
// BUILT-IN CONVERTERS
// =============================================================================

struct ResourceConverter;

#[async_trait]
impl Converter for ResourceConverter {
    async fn convert(&self, value: Value, pass: &MappingPass<'_>) -> Result<Value> {
        match value {
            Value::Resource(resource) => pass.map_resource(resource).await,
            other => Ok(other),
        }
    }
}

struct DateConverter;

#[async_trait]
impl Converter for DateConverter {
    async fn convert(&self, value: Value, _pass: &MappingPass<'_>) -> Result<Value> {
        match value {
            Value::Date(at) => Ok(Value::String(iso8601(&at))),
            other => Ok(other),
        }
    }
}

struct BytesConverter;

#[async_trait]
impl Converter for BytesConverter {
    async fn convert(&self, value: Value, _pass: &MappingPass<'_>) -> Result<Value> {
        match value {
            Value::Bytes(data) => Ok(Value::String(STANDARD.encode(data))),
            other => Ok(other),
        }
    }
}

struct MapConverter;

#[async_trait]
impl Converter for MapConverter {
    async fn convert(&self, value: Value, pass: &MappingPass<'_>) -> Result<Value> {
        let Value::Map(map) = value else {
            return Ok(value);
        };
        let entries = try_join_all(map.entries().into_iter().map(|(key, item)| async move {
            Ok::<_, MapperError>((key.key_string(), pass.map(item).await?))
        }))
        .await?;
        Ok(Value::Object(entries.into_iter().collect::<Object>()))
    }
}

struct SetConverter;

#[async_trait]
impl Converter for SetConverter {
    async fn convert(&self, value: Value, pass: &MappingPass<'_>) -> Result<Value> {
        let Value::Set(set) = value else {
            return Ok(value);
        };
        let items = try_join_all(set.values().into_iter().map(|item| pass.map(item))).await?;
        Ok(Value::from(items))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::Class;
    use crate::resource::Resource;
    use crate::value::{MapContainer, SetContainer};
    use chrono::Utc;

    #[test]
    fn builtins_are_registered_in_fixed_order() {
        let registry = MapperRegistry::new();
        let order: Vec<String> = registry.match_types().map(|m| format!("{m:?}")).collect();
        assert_eq!(order, ["Resource", "Date", "Bytes", "Map", "Set"]);
    }

    #[test]
    fn lookup_matches_by_kind() {
        let registry = MapperRegistry::new();
        assert!(registry.lookup(&Value::from(Utc::now())).is_some());
        assert!(registry.lookup(&Value::bytes(*b"hi")).is_some());
        assert!(registry.lookup(&Value::Map(MapContainer::new())).is_some());
        assert!(registry.lookup(&Value::Set(SetContainer::new())).is_some());
        assert!(registry.lookup(&Value::from(1)).is_none());
        assert!(registry.lookup(&Value::Object(Object::new())).is_none());
    }

    #[test]
    fn class_match_covers_subclasses_of_objects_and_resources() {
        let base = Class::plain("Money").build().unwrap();
        let sub = Class::plain("Euro").extends(&base).build().unwrap();
        let other = Class::plain("Other").build().unwrap();
        let matcher = MatchType::Class(base);

        assert!(matcher.matches(&Value::Object(Object::of_class(&sub))));
        assert!(!matcher.matches(&Value::Object(Object::of_class(&other))));
        assert!(!matcher.matches(&Value::Object(Object::new())));

        let res_base = Class::resource("Base").build().unwrap();
        let res_sub = Class::resource("Sub").extends(&res_base).build().unwrap();
        let resource = Value::Resource(Resource::new(&res_sub, Value::Null));
        assert!(MatchType::Class(res_base).matches(&resource));
        assert!(MatchType::Resource.matches(&resource));
    }

    #[test]
    fn opaque_match_is_by_exact_type() {
        struct Cents(#[allow(dead_code)] i64);
        assert!(MatchType::opaque::<Cents>().matches(&Value::opaque(Cents(5))));
        assert!(!MatchType::opaque::<Cents>().matches(&Value::opaque(5i64)));
    }

    #[test]
    fn re_registering_a_key_keeps_its_position() {
        let mut registry = MapperRegistry::new();
        registry.register(MatchType::opaque::<u8>(), FnConverter::new(|_| Ok(Value::from(1))));
        registry.register(MatchType::Date, FnConverter::new(|_| Ok(Value::from("date"))));
        assert_eq!(registry.len(), 6);
        let order: Vec<String> = registry.match_types().map(|m| format!("{m:?}")).collect();
        assert_eq!(order[1], "Date");
        assert!(order[5].starts_with("Opaque("));
    }
}
