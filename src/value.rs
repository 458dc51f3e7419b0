//! # Dynamic Value Graph
//!
//! The mapper walks graphs of [`Value`]s. Scalars are plain Rust values; every
//! container is an `Arc` handle, so cloning a handle shares the underlying
//! object and two handles can be compared by identity. That is what makes
//! diamonds and cycles representable, and what the per-pass visited set keys on.
//!
//! | Variant | Identity | Mapped by |
//! |---|---|---|
//! | `Null`, `Bool`, `Int`, `Float`, `String` | no | passthrough |
//! | `BigInt` | no | decimal string |
//! | `Date`, `Bytes` | no | registry |
//! | `Array` | yes | element-wise |
//! | `Object` | yes | declared fields, in place |
//! | `Map`, `Set`, `Resource`, `Opaque` | yes | registry |
//!
//! After a pass, [`Value::to_json`] projects the result onto `serde_json`.

use crate::class::ClassRef;
use crate::error::{MapperError, Result};
use crate::resource::Resource;
use chrono::{DateTime, SecondsFormat, Utc};
use indexmap::IndexMap;
use serde::{Serialize, Serializer};
use std::any::{Any, TypeId};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Insertion-ordered field map used by objects and resource output.
pub type Fields = IndexMap<String, Value>;

pub(crate) fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// Canonical transport form of a timestamp: RFC 3339, milliseconds, `Z`.
pub fn iso8601(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

// =============================================================================
// VALUE
// =============================================================================

/// A node in an object graph handed to the mapper.
#[derive(Clone, Debug, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    /// Arbitrary-precision integer; always emitted as a decimal string.
    BigInt(BigInt),
    String(String),
    Date(DateTime<Utc>),
    Bytes(Vec<u8>),
    Array(Array),
    Object(Object),
    Map(MapContainer),
    Set(SetContainer),
    Resource(Resource),
    Opaque(Opaque),
}

impl Value {
    /// Builds an array value from anything convertible into values.
    pub fn array<I, V>(items: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Value::Array(items.into_iter().map(Into::into).collect())
    }

    pub fn bytes(data: impl Into<Vec<u8>>) -> Self {
        Value::Bytes(data.into())
    }

    pub fn opaque<T: Any + Send + Sync>(value: T) -> Self {
        Value::Opaque(Opaque::new(value))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Short name of the variant, used in logs and errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) | Value::Float(_) => "number",
            Value::BigInt(_) => "bigint",
            Value::String(_) => "string",
            Value::Date(_) => "date",
            Value::Bytes(_) => "bytes",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Map(_) => "map",
            Value::Set(_) => "set",
            Value::Resource(_) => "resource",
            Value::Opaque(_) => "opaque",
        }
    }

    /// Address of the shared allocation behind identity-bearing variants.
    ///
    /// Two values with the same identity are the same object. Scalars and
    /// value types (`Date`, `Bytes`, `BigInt`) have none.
    pub fn identity(&self) -> Option<usize> {
        match self {
            Value::Array(a) => Some(a.addr()),
            Value::Object(o) => Some(o.addr()),
            Value::Map(m) => Some(m.addr()),
            Value::Set(s) => Some(s.addr()),
            Value::Resource(r) => Some(r.addr()),
            Value::Opaque(o) => Some(o.addr()),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Array> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_resource(&self) -> Option<&Resource> {
        match self {
            Value::Resource(r) => Some(r),
            _ => None,
        }
    }

    /// Reads a named field from an object, or a string-keyed entry from a map.
    /// Anything else has no fields and yields `Null`.
    pub fn field(&self, name: &str) -> Value {
        match self {
            Value::Object(o) => o.get(name).unwrap_or_default(),
            Value::Map(m) => m.get(&Value::from(name)).unwrap_or_default(),
            _ => Value::Null,
        }
    }

    /// String form used when a map key becomes an object field name.
    pub fn key_string(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::BigInt(b) => b.to_string(),
            Value::String(s) => s.clone(),
            Value::Date(d) => iso8601(d),
            Value::Bytes(bytes) => String::from_utf8_lossy(bytes).into_owned(),
            // Elements joined by commas, null elements as empty text.
            Value::Array(items) => items
                .to_vec()
                .iter()
                .map(|item| if item.is_null() { String::new() } else { item.key_string() })
                .collect::<Vec<_>>()
                .join(","),
            _ => "[object Object]".to_string(),
        }
    }

    /// Same-value comparison: scalars by value (`NaN` equals itself, `1` equals
    /// `1.0`), handles by identity.
    pub fn same_value(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => *a as f64 == *b,
            (Value::BigInt(a), Value::BigInt(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            _ => match (self.identity(), other.identity()) {
                (Some(a), Some(b)) => a == b && self.kind() == other.kind(),
                _ => false,
            },
        }
    }

    /// Projects a mapped graph onto plain JSON.
    ///
    /// Fails with [`MapperError::CyclicOutput`] when a node is reached again
    /// below itself, and with [`MapperError::Unrepresentable`] when a value
    /// that needs a converter is still present. Shared (diamond) nodes are
    /// emitted once per reference.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        let mut ancestors = Vec::new();
        self.project(&mut ancestors)
    }

    fn project(&self, ancestors: &mut Vec<usize>) -> Result<serde_json::Value> {
        use serde_json::Value as Json;
        match self {
            Value::Null => Ok(Json::Null),
            Value::Bool(b) => Ok(Json::Bool(*b)),
            Value::Int(i) => Ok(Json::from(*i)),
            // Non-finite floats have no JSON literal.
            Value::Float(f) => Ok(serde_json::Number::from_f64(*f).map_or(Json::Null, Json::Number)),
            Value::String(s) => Ok(Json::String(s.clone())),
            Value::BigInt(_) | Value::Date(_) | Value::Bytes(_) | Value::Map(_) | Value::Set(_) => {
                Err(MapperError::Unrepresentable(self.kind()))
            }
            Value::Opaque(o) => Err(MapperError::Unrepresentable(o.type_name())),
            Value::Array(a) => descend(ancestors, a.addr(), |ancestors| {
                a.to_vec()
                    .iter()
                    .map(|item| item.project(ancestors))
                    .collect::<Result<Vec<_>>>()
                    .map(Json::Array)
            }),
            Value::Object(o) => descend(ancestors, o.addr(), |ancestors| project_fields(&o.snapshot(), ancestors)),
            Value::Resource(r) => descend(ancestors, r.addr(), |ancestors| project_fields(&r.output(), ancestors)),
        }
    }
}

fn descend<F>(ancestors: &mut Vec<usize>, addr: usize, f: F) -> Result<serde_json::Value>
where
    F: FnOnce(&mut Vec<usize>) -> Result<serde_json::Value>,
{
    if ancestors.contains(&addr) {
        return Err(MapperError::CyclicOutput);
    }
    ancestors.push(addr);
    let projected = f(ancestors);
    ancestors.pop();
    projected
}

fn project_fields(fields: &Fields, ancestors: &mut Vec<usize>) -> Result<serde_json::Value> {
    let mut out = serde_json::Map::with_capacity(fields.len());
    for (name, value) in fields {
        out.insert(name.clone(), value.project(ancestors)?);
    }
    Ok(serde_json::Value::Object(out))
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_json()
            .map_err(serde::ser::Error::custom)?
            .serialize(serializer)
    }
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(impl From<$ty> for Value {
            fn from(v: $ty) -> Self {
                Value::$variant(v.into())
            }
        })*
    };
}

value_from! {
    bool => Bool,
    i8 => Int, i16 => Int, i32 => Int, i64 => Int,
    u8 => Int, u16 => Int, u32 => Int,
    f32 => Float, f64 => Float,
    String => String, &str => String,
    i128 => BigInt, u128 => BigInt, BigInt => BigInt,
    DateTime<Utc> => Date,
    Array => Array, Object => Object,
    MapContainer => Map, SetContainer => Set,
    Resource => Resource, Opaque => Opaque,
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        match i64::try_from(v) {
            Ok(i) => Value::Int(i),
            Err(_) => Value::BigInt(v.into()),
        }
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(Array::from(items))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

// =============================================================================
// BIGINT
// =============================================================================

/// Arbitrary-precision integer kept in canonical base-10 form.
///
/// The mapper never does arithmetic on it; it only has to carry every digit
/// through to the transport string.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BigInt(String);

impl BigInt {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BigInt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for BigInt {
    type Err = MapperError;

    fn from_str(s: &str) -> Result<Self> {
        let (negative, digits) = match s.as_bytes().first() {
            Some(b'-') => (true, &s[1..]),
            Some(b'+') => (false, &s[1..]),
            _ => (false, s),
        };
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(MapperError::InvalidBigInt(s.to_string()));
        }
        let digits = digits.trim_start_matches('0');
        Ok(match (digits.is_empty(), negative) {
            (true, _) => BigInt("0".to_string()),
            (false, true) => BigInt(format!("-{digits}")),
            (false, false) => BigInt(digits.to_string()),
        })
    }
}

macro_rules! bigint_from {
    ($($ty:ty),*) => {
        $(impl From<$ty> for BigInt {
            fn from(v: $ty) -> Self {
                BigInt(v.to_string())
            }
        })*
    };
}

bigint_from!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);

impl Serialize for BigInt {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

// =============================================================================
// HANDLES
// =============================================================================

struct ObjectInner {
    class: Option<ClassRef>,
    fields: RwLock<Fields>,
}

/// A mutable record, optionally tagged with the class whose declared fields
/// the mapper projects.
#[derive(Clone)]
pub struct Object(Arc<ObjectInner>);

impl Object {
    /// An untagged object. It declares no fields, so the mapper leaves its
    /// contents untouched.
    pub fn new() -> Self {
        Self::with_class(None)
    }

    pub fn of_class(class: &ClassRef) -> Self {
        Self::with_class(Some(class.clone()))
    }

    fn with_class(class: Option<ClassRef>) -> Self {
        Self(Arc::new(ObjectInner {
            class,
            fields: RwLock::new(Fields::new()),
        }))
    }

    /// Builder-style setter.
    pub fn with(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    pub fn class(&self) -> Option<&ClassRef> {
        self.0.class.as_ref()
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        read(&self.0.fields).get(name).cloned()
    }

    pub fn set(&self, name: impl Into<String>, value: impl Into<Value>) {
        write(&self.0.fields).insert(name.into(), value.into());
    }

    pub fn keys(&self) -> Vec<String> {
        read(&self.0.fields).keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        read(&self.0.fields).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the current fields; handles inside still share identity.
    pub fn snapshot(&self) -> Fields {
        read(&self.0.fields).clone()
    }

    pub fn ptr_eq(&self, other: &Object) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn addr(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }
}

impl Default for Object {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Object {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let object = Object::new();
        for (name, value) in iter {
            object.set(name, value);
        }
        object
    }
}

impl fmt::Debug for Object {
    // Field values are left out: the graph may be cyclic.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object")
            .field("class", &self.class().map(|c| c.name()))
            .field("fields", &self.keys())
            .finish()
    }
}

/// An ordered, shared sequence.
#[derive(Clone, Default)]
pub struct Array(Arc<RwLock<Vec<Value>>>);

impl Array {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, value: impl Into<Value>) {
        write(&self.0).push(value.into());
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        read(&self.0).get(index).cloned()
    }

    pub fn len(&self) -> usize {
        read(&self.0).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn to_vec(&self) -> Vec<Value> {
        read(&self.0).clone()
    }

    pub fn ptr_eq(&self, other: &Array) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn addr(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }
}

impl From<Vec<Value>> for Array {
    fn from(items: Vec<Value>) -> Self {
        Self(Arc::new(RwLock::new(items)))
    }
}

impl FromIterator<Value> for Array {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self::from(iter.into_iter().collect::<Vec<_>>())
    }
}

impl fmt::Debug for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Array").field("len", &self.len()).finish()
    }
}

/// Insertion-ordered map with arbitrary keys.
#[derive(Clone, Default)]
pub struct MapContainer(Arc<RwLock<Vec<(Value, Value)>>>);

impl MapContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces in place; an existing key keeps its position.
    pub fn insert(&self, key: impl Into<Value>, value: impl Into<Value>) {
        let (key, value) = (key.into(), value.into());
        let mut entries = write(&self.0);
        match entries.iter_mut().find(|(k, _)| k.same_value(&key)) {
            Some(entry) => entry.1 = value,
            None => entries.push((key, value)),
        }
    }

    pub fn with(self, key: impl Into<Value>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &Value) -> Option<Value> {
        read(&self.0)
            .iter()
            .find(|(k, _)| k.same_value(key))
            .map(|(_, v)| v.clone())
    }

    pub fn entries(&self) -> Vec<(Value, Value)> {
        read(&self.0).clone()
    }

    pub fn len(&self) -> usize {
        read(&self.0).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn addr(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }
}

impl fmt::Debug for MapContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapContainer").field("len", &self.len()).finish()
    }
}

/// Insertion-ordered set of unique values (same-value semantics).
#[derive(Clone, Default)]
pub struct SetContainer(Arc<RwLock<Vec<Value>>>);

impl SetContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` when an equal element was already present.
    pub fn insert(&self, value: impl Into<Value>) -> bool {
        let value = value.into();
        let mut values = write(&self.0);
        if values.iter().any(|v| v.same_value(&value)) {
            return false;
        }
        values.push(value);
        true
    }

    pub fn with(self, value: impl Into<Value>) -> Self {
        self.insert(value);
        self
    }

    pub fn contains(&self, value: &Value) -> bool {
        read(&self.0).iter().any(|v| v.same_value(value))
    }

    pub fn values(&self) -> Vec<Value> {
        read(&self.0).clone()
    }

    pub fn len(&self) -> usize {
        read(&self.0).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn addr(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }
}

impl fmt::Debug for SetContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SetContainer").field("len", &self.len()).finish()
    }
}

/// A user-defined value the mapper knows nothing about. Register a converter
/// with [`MatchType::opaque`](crate::MatchType::opaque) to give it a plain form.
#[derive(Clone)]
pub struct Opaque {
    value: Arc<dyn Any + Send + Sync>,
    type_id: TypeId,
    type_name: &'static str,
}

impl Opaque {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            value: Arc::new(value),
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
        }
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub(crate) fn addr(&self) -> usize {
        Arc::as_ptr(&self.value) as *const () as usize
    }
}

impl fmt::Debug for Opaque {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Opaque").field(&self.type_name).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn bigint_parsing_is_canonical() {
        assert_eq!("007".parse::<BigInt>().unwrap().as_str(), "7");
        assert_eq!("-0".parse::<BigInt>().unwrap().as_str(), "0");
        assert_eq!("+42".parse::<BigInt>().unwrap().as_str(), "42");
        assert_eq!(
            "-123456789012345678901234567890".parse::<BigInt>().unwrap().as_str(),
            "-123456789012345678901234567890"
        );
        assert!("12a".parse::<BigInt>().is_err());
        assert!("-".parse::<BigInt>().is_err());
        assert!("".parse::<BigInt>().is_err());
    }

    #[test]
    fn large_u64_becomes_bigint() {
        assert!(matches!(Value::from(5u64), Value::Int(5)));
        assert!(matches!(Value::from(u64::MAX), Value::BigInt(_)));
        assert!(matches!(Value::from(1i128), Value::BigInt(_)));
    }

    #[test]
    fn set_keeps_first_insertion_and_uniqueness() {
        let shared = Object::new();
        let set = SetContainer::new()
            .with("a")
            .with(1)
            .with(1.0)
            .with(Value::Object(shared.clone()))
            .with(Value::Object(shared.clone()))
            .with(Value::Object(Object::new()))
            .with(f64::NAN)
            .with(f64::NAN);
        assert_eq!(set.len(), 5);
        assert!(set.contains(&Value::Object(shared)));
    }

    #[test]
    fn map_insert_replaces_in_place() {
        let map = MapContainer::new().with("a", 1).with("b", 2).with("a", 3);
        let entries = map.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].0.as_str(), Some("a"));
        assert_eq!(entries[0].1.as_i64(), Some(3));
    }

    #[test]
    fn key_string_forms() {
        assert_eq!(Value::from(7).key_string(), "7");
        assert_eq!(Value::from(1.5).key_string(), "1.5");
        assert_eq!(Value::from(true).key_string(), "true");
        assert_eq!(Value::Null.key_string(), "null");
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(Value::from(at).key_string(), "2024-01-01T00:00:00.000Z");
    }

    #[test]
    fn container_keys_use_generic_object_text() {
        assert_eq!(Value::Object(Object::new().with("a", 1)).key_string(), "[object Object]");
        assert_eq!(Value::Map(MapContainer::new()).key_string(), "[object Object]");
        assert_eq!(Value::array([Value::from(1), Value::Null, Value::from("x")]).key_string(), "1,,x");
        assert_eq!(Value::bytes(*b"hi").key_string(), "hi");
    }

    #[test]
    fn to_json_projects_plain_graph() {
        let inner = Object::new().with("n", 1);
        let root = Object::new()
            .with("name", "x")
            .with("left", inner.clone())
            .with("right", inner)
            .with("ratio", f64::INFINITY)
            .with("list", Value::array([1, 2]));
        assert_eq!(
            Value::Object(root).to_json().unwrap(),
            json!({"name": "x", "left": {"n": 1}, "right": {"n": 1}, "ratio": null, "list": [1, 2]})
        );
    }

    #[test]
    fn to_json_rejects_cycles_and_unconverted_values() {
        let node = Object::new();
        node.set("self", node.clone());
        assert!(matches!(Value::Object(node).to_json(), Err(MapperError::CyclicOutput)));

        let dated = Object::new().with("at", Utc::now());
        assert!(matches!(
            Value::Object(dated).to_json(),
            Err(MapperError::Unrepresentable("date"))
        ));
    }

    #[test]
    fn opaque_identity_and_downcast() {
        let value = Value::opaque(42u16);
        let Value::Opaque(opaque) = &value else { panic!("not opaque") };
        assert_eq!(opaque.downcast_ref::<u16>(), Some(&42));
        assert_eq!(opaque.type_id(), TypeId::of::<u16>());
        assert!(value.same_value(&value.clone()));
        assert!(!value.same_value(&Value::opaque(42u16)));
    }
}
