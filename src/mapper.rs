//! # Recursive Value Mapper
//!
//! [`ResourceMapper`] turns a value graph into plain output: resources are
//! rendered through their declared fields and override rules, registry types
//! are converted, big integers become decimal text and everything else passes
//! through.
//!
//! Each call to [`ResourceMapper::map`] opens one [`MappingPass`]. The pass
//! owns the visited set, keyed by handle identity, so every distinct object is
//! processed at most once per call. A handle reached again after it finished
//! (a shared node) resolves to its finished output; one reached while still in
//! progress (a cycle) is returned as it is. Nothing carries over between calls.
//!
//! ```rust
//! use resource_mapper::{Class, Object, Resource, ResourceMapper};
//!
//! # #[tokio::main]
//! # async fn main() -> resource_mapper::Result<()> {
//! let user = Class::resource("UserResource").field("id").field("name").build()?;
//! let raw = Object::new().with("id", 1).with("name", "Ada").with("password", "x");
//!
//! let mapper = ResourceMapper::new();
//! let json = mapper.map_to_json(Resource::make(&user, raw)).await?;
//! assert_eq!(json, serde_json::json!({ "id": 1, "name": "Ada" }));
//! # Ok(())
//! # }
//! ```

use crate::class::{ClassDeclarations, ClassRef, FieldMeta, FieldSource, RuleSource};
use crate::error::{MapperError, Result};
use crate::registry::{Converter, MapperRegistry, MatchType};
use crate::resolver::{CollaboratorResolver, NoCollaborators};
use crate::resource::Resource;
use crate::value::{read, write, Object, Value};
use futures::future::{try_join_all, BoxFuture, FutureExt};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use tracing::{instrument, trace};

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The mapping engine: registry, declaration sources and collaborator resolver.
///
/// Build one at startup and share it; it is `Send + Sync` and holds no
/// per-call state.
pub struct ResourceMapper {
    registry: MapperRegistry,
    pub(crate) field_source: Arc<dyn FieldSource>,
    pub(crate) rule_source: Arc<dyn RuleSource>,
    pub(crate) resolver: Arc<dyn CollaboratorResolver>,
    // Holds the class alongside its field list so the address stays owned.
    field_cache: RwLock<HashMap<usize, (ClassRef, Arc<[String]>)>>,
}

impl ResourceMapper {
    /// Built-in converters, declarations read from classes, no collaborators.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> ResourceMapperBuilder {
        ResourceMapperBuilder::default()
    }

    pub fn registry(&self) -> &MapperRegistry {
        &self.registry
    }

    /// Maps `value` in a fresh pass.
    ///
    /// Any converter or rule error aborts the pass and is returned unchanged.
    #[instrument(skip_all, fields(kind))]
    pub async fn map(&self, value: impl Into<Value>) -> Result<Value> {
        let value = value.into();
        tracing::Span::current().record("kind", value.kind());
        let pass = MappingPass::new(self);
        pass.map(value).await
    }

    /// Maps `value` and projects the result onto JSON.
    #[instrument(skip_all)]
    pub async fn map_to_json(&self, value: impl Into<Value>) -> Result<serde_json::Value> {
        self.map(value).await?.to_json()
    }

    /// Output field names of `class`, memoized per class.
    pub fn declared_fields(&self, class: &ClassRef) -> Arc<[String]> {
        let key = Arc::as_ptr(class) as usize;
        if let Some((_, names)) = read(&self.field_cache).get(&key) {
            return names.clone();
        }
        let names: Arc<[String]> = self.field_source.fields(class).into();
        trace!(class = class.name(), fields = names.len(), "Caching declared fields");
        write(&self.field_cache)
            .entry(key)
            .or_insert_with(|| (class.clone(), names))
            .1
            .clone()
    }

    pub fn field_meta(&self, class: &ClassRef, name: &str) -> Option<FieldMeta> {
        self.field_source.field_meta(class, name)
    }
}

impl Default for ResourceMapper {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ResourceMapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceMapper")
            .field("registry", &self.registry)
            .field("cached_classes", &read(&self.field_cache).len())
            .finish_non_exhaustive()
    }
}

/// Configures a [`ResourceMapper`].
pub struct ResourceMapperBuilder {
    registry: MapperRegistry,
    field_source: Arc<dyn FieldSource>,
    rule_source: Arc<dyn RuleSource>,
    resolver: Arc<dyn CollaboratorResolver>,
}

impl Default for ResourceMapperBuilder {
    fn default() -> Self {
        Self {
            registry: MapperRegistry::new(),
            field_source: Arc::new(ClassDeclarations),
            rule_source: Arc::new(ClassDeclarations),
            resolver: Arc::new(NoCollaborators),
        }
    }
}

impl ResourceMapperBuilder {
    pub fn resolver(self, resolver: impl CollaboratorResolver + 'static) -> Self {
        self.shared_resolver(Arc::new(resolver))
    }

    pub fn shared_resolver(mut self, resolver: Arc<dyn CollaboratorResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Custom sources must also answer for [`paginated_class`](crate::paginated_class)
    /// if paginated results are mapped.
    pub fn field_source(mut self, source: impl FieldSource + 'static) -> Self {
        self.field_source = Arc::new(source);
        self
    }

    pub fn rule_source(mut self, source: impl RuleSource + 'static) -> Self {
        self.rule_source = Arc::new(source);
        self
    }

    /// Adds a converter after those already registered.
    pub fn converter(mut self, match_type: MatchType, converter: impl Converter + 'static) -> Self {
        self.registry.register(match_type, converter);
        self
    }

    /// Replaces the whole registry, built-ins included.
    pub fn registry(mut self, registry: MapperRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn build(self) -> ResourceMapper {
        ResourceMapper {
            registry: self.registry,
            field_source: self.field_source,
            rule_source: self.rule_source,
            resolver: self.resolver,
            field_cache: RwLock::new(HashMap::new()),
        }
    }
}

// =============================================================================
// MAPPING PASS
// =============================================================================

/// A handle seen by the pass. Holding the input keeps its address from being
/// reused mid-pass.
struct Visit {
    input: Value,
    output: Option<Value>,
}

/// State of one top-level [`ResourceMapper::map`] call.
///
/// Converters receive the pass so they can map nested values with the same
/// visited set.
pub struct MappingPass<'a> {
    pub(crate) mapper: &'a ResourceMapper,
    visited: Mutex<HashMap<usize, Visit>>,
    // (raw identity, class address) -> wrapper built by auto-wrapping.
    pub(crate) wrappers: Mutex<HashMap<(usize, usize), Resource>>,
}

impl<'a> MappingPass<'a> {
    fn new(mapper: &'a ResourceMapper) -> Self {
        Self {
            mapper,
            visited: Mutex::new(HashMap::new()),
            wrappers: Mutex::new(HashMap::new()),
        }
    }

    pub fn mapper(&self) -> &'a ResourceMapper {
        self.mapper
    }

    /// Records `value` as visited. On a revisit returns the finished output,
    /// or the input handle while it is still in progress.
    fn enter(&self, id: usize, value: &Value) -> Option<Value> {
        let mut visited = lock(&self.visited);
        if let Some(visit) = visited.get(&id) {
            return Some(visit.output.clone().unwrap_or_else(|| visit.input.clone()));
        }
        visited.insert(
            id,
            Visit {
                input: value.clone(),
                output: None,
            },
        );
        None
    }

    fn finish(&self, id: usize, output: &Value) {
        if let Some(visit) = lock(&self.visited).get_mut(&id) {
            visit.output = Some(output.clone());
        }
    }

    /// Maps one value within this pass.
    pub fn map(&self, value: Value) -> BoxFuture<'_, Result<Value>> {
        async move {
            let id = match &value {
                Value::BigInt(n) => return Ok(Value::String(n.to_string())),
                other => other.identity(),
            };
            let Some(id) = id else {
                return self.map_unvisited(value).await;
            };
            if let Some(seen) = self.enter(id, &value) {
                trace!(kind = value.kind(), "Already visited, reusing result");
                return Ok(seen);
            }
            let output = self.map_unvisited(value).await?;
            self.finish(id, &output);
            Ok(output)
        }
        .boxed()
    }

    async fn map_unvisited(&self, value: Value) -> Result<Value> {
        if let Value::Array(items) = &value {
            let mapped = try_join_all(items.to_vec().into_iter().map(|item| self.map(item))).await?;
            return Ok(Value::from(mapped));
        }

        if let Some(converter) = self.mapper.registry.lookup(&value) {
            trace!(kind = value.kind(), "Converter matched");
            let converted = converter.convert(value, self).await?;
            return self.map(converted).await;
        }

        if let Value::Object(object) = &value {
            self.map_declared(object).await?;
        }
        Ok(value)
    }

    /// Maps the declared fields of a classed object in place. Fields the
    /// object does not hold are left absent.
    async fn map_declared(&self, object: &Object) -> Result<()> {
        let Some(class) = object.class() else {
            return Ok(());
        };
        let names = self.mapper.declared_fields(class);
        let mapped = try_join_all(
            names
                .iter()
                .filter_map(|name| object.get(name).map(|current| (name, current)))
                .map(|(name, current)| async move { Ok::<_, MapperError>((name, self.map(current).await?)) }),
        )
        .await?;
        for (name, value) in mapped {
            object.set(name.clone(), value);
        }
        Ok(())
    }
}

impl fmt::Debug for MappingPass<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappingPass")
            .field("visited", &lock(&self.visited).len())
            .finish()
    }
}
