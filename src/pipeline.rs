//! # Resource Field Pipeline
//!
//! Renders one [`Resource`] onto its own output:
//!
//! 1. Collect the override rules declared along the class chain, oldest
//!    ancestor first. The same rule attached to several classes runs once.
//! 2. Run every rule with its injected collaborators and map the values it
//!    returns. Rules run concurrently; their writes are applied in chain
//!    order, so a subclass rule beats its ancestor on a shared key.
//! 3. Once all rules are done, project each remaining declared field from the
//!    raw payload. Fields typed as a resource class are wrapped first (each
//!    element for collections), then mapped.
//!
//! The resource handle itself is the result, with its output populated.

use crate::class::{ClassRef, FieldMeta};
use crate::error::{BoxError, MapperError, Result};
use crate::mapper::{lock, MappingPass};
use crate::resource::Resource;
use crate::rule::{Injected, OverrideRule};
use crate::value::{Fields, Value};
use futures::future::try_join_all;
use std::sync::Arc;
use tracing::{debug, warn};

impl MappingPass<'_> {
    /// Populates `resource`'s output and returns the same handle.
    pub async fn map_resource(&self, resource: Resource) -> Result<Value> {
        let class = resource.class();
        let data = resource.data();
        let declared = self.mapper.declared_fields(class);
        let rules = self.collect_rules(class);
        debug!(
            class = class.name(),
            fields = declared.len(),
            rules = rules.len(),
            "Mapping resource"
        );

        let computed = try_join_all(
            rules
                .iter()
                .map(|(owner, rule)| self.apply_rule(owner, rule, data)),
        )
        .await?;
        let mut overrides = Fields::new();
        for fields in computed {
            overrides.extend(fields);
        }

        let defaults = try_join_all(
            declared
                .iter()
                .filter(|name| !overrides.contains_key(name.as_str()))
                .filter_map(|name| raw_field(data, name).map(|raw| (name, raw)))
                .map(|(name, raw)| async move {
                    let meta = self.mapper.field_meta(class, name);
                    let value = self.auto_wrap(class, name, meta.as_ref(), raw);
                    Ok::<_, MapperError>((name.clone(), self.map(value).await?))
                }),
        )
        .await?;
        let mut defaults: Fields = defaults.into_iter().collect();

        let mut output = Fields::with_capacity(declared.len() + overrides.len());
        for name in declared.iter() {
            if let Some(value) = overrides.shift_remove(name.as_str()) {
                output.insert(name.clone(), value);
            } else if let Some(value) = defaults.shift_remove(name.as_str()) {
                output.insert(name.clone(), value);
            }
        }
        output.extend(overrides);
        resource.commit(output);
        Ok(Value::Resource(resource))
    }

    fn collect_rules(&self, class: &ClassRef) -> Vec<(ClassRef, OverrideRule)> {
        let mut rules: Vec<(ClassRef, OverrideRule)> = Vec::new();
        for owner in class.ancestry().into_iter().rev() {
            if let Some(rule) = self.mapper.rule_source.rule(&owner) {
                if !rules.iter().any(|(_, seen)| seen.ptr_eq(&rule)) {
                    rules.push((owner, rule));
                }
            }
        }
        rules
    }

    fn inject(&self, rule: &OverrideRule) -> Result<Injected> {
        rule.injects()
            .iter()
            .map(|token| self.mapper.resolver.resolve(token))
            .collect::<Result<Vec<_>>>()
            .map(Injected::new)
    }

    async fn apply_rule(&self, owner: &ClassRef, rule: &OverrideRule, data: &Value) -> Result<Fields> {
        let injected = self.inject(rule)?;
        let fields = rule
            .compute(data, &injected)
            .await
            .map_err(|source| rule_error(owner, source))?;
        debug!(class = owner.name(), fields = fields.len(), "Override rule applied");

        let mapped = try_join_all(fields.into_iter().map(|(name, value)| async move {
            Ok::<_, MapperError>((name, self.map(value).await?))
        }))
        .await?;
        Ok(mapped.into_iter().collect())
    }

    fn auto_wrap(&self, class: &ClassRef, name: &str, meta: Option<&FieldMeta>, raw: Value) -> Value {
        let Some((meta, nested)) = meta.and_then(|m| m.nested_resource().map(|n| (m, n))) else {
            return raw;
        };
        if raw.is_null() {
            return raw;
        }
        if !meta.is_array {
            return self.wrap(nested, raw);
        }
        let items = match &raw {
            Value::Array(items) => items.to_vec(),
            Value::Set(items) => items.values(),
            other => {
                warn!(
                    class = class.name(),
                    field = name,
                    kind = other.kind(),
                    "Collection field does not hold a sequence, rendering as empty"
                );
                Vec::new()
            }
        };
        Value::array(items.into_iter().map(|item| {
            if item.is_null() {
                item
            } else {
                self.wrap(nested, item)
            }
        }))
    }

    // One wrapper per (raw object, class) within a pass, so raw cycles
    // reached through typed fields stop at the visited set.
    fn wrap(&self, class: &ClassRef, raw: Value) -> Value {
        if matches!(raw, Value::Resource(_)) {
            return raw;
        }
        let Some(id) = raw.identity() else {
            return Value::Resource(Resource::make(class, raw));
        };
        let key = (id, Arc::as_ptr(class) as usize);
        let resource = lock(&self.wrappers)
            .entry(key)
            .or_insert_with(|| Resource::make(class, raw))
            .clone();
        Value::Resource(resource)
    }
}

fn raw_field(data: &Value, name: &str) -> Option<Value> {
    match data {
        Value::Object(object) => object.get(name),
        Value::Map(map) => map.get(&Value::from(name)),
        _ => None,
    }
}

fn rule_error(owner: &ClassRef, source: BoxError) -> MapperError {
    match source.downcast::<MapperError>() {
        Ok(error) => *error,
        Err(source) => MapperError::Rule {
            class: owner.name().to_string(),
            source,
        },
    }
}

#[cfg(test)]
mod tests {
    use crate::class::{Class, ClassRef, FieldMeta, FieldSource};
    use crate::fields;
    use crate::mapper::ResourceMapper;
    use crate::resolver::ProviderMap;
    use crate::resource::Resource;
    use crate::rule::OverrideRule;
    use crate::value::{Object, Value};
    use crate::{InjectionToken, MapperError};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn rule_output_replaces_default_projection() {
        let class = Class::resource("UserResource")
            .field("id")
            .field("name")
            .rule(OverrideRule::from_fn(Vec::<InjectionToken>::new(), |data, _| {
                let name = data.field("name");
                Ok(fields! { "name" => name.as_str().unwrap_or_default().to_uppercase() })
            }))
            .build()
            .unwrap();
        let raw = Object::new().with("id", 1).with("name", "ada");

        let json = ResourceMapper::new()
            .map_to_json(Resource::make(&class, raw))
            .await
            .unwrap();
        assert_eq!(json, serde_json::json!({ "id": 1, "name": "ADA" }));
    }

    #[tokio::test]
    async fn output_follows_declaration_order_then_extra_override_keys() {
        let class = Class::resource("Row")
            .field("a")
            .field("b")
            .rule(OverrideRule::from_fn(Vec::<InjectionToken>::new(), |_, _| {
                Ok(fields! { "extra" => true, "b" => 20 })
            }))
            .build()
            .unwrap();
        let resource = Resource::make(&class, Object::new().with("a", 1).with("b", 2));
        ResourceMapper::new().map(resource.clone()).await.unwrap();
        let keys: Vec<String> = resource.output().keys().cloned().collect();
        assert_eq!(keys, ["a", "b", "extra"]);
        assert_eq!(resource.get("b").unwrap().as_i64(), Some(20));
    }

    #[tokio::test]
    async fn shared_rule_runs_once_per_resource() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let rule = OverrideRule::from_fn(Vec::<InjectionToken>::new(), move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(fields! { "seen" => true })
        });
        let base = Class::resource("Base").rule(rule.clone()).build().unwrap();
        let child = Class::resource("Child").extends(&base).rule(rule).build().unwrap();

        ResourceMapper::new().map(Resource::make(&child, Value::Null)).await.unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn collaborators_are_injected_in_order() {
        let class = Class::resource("Greeting")
            .rule(OverrideRule::from_fn(["salutation", "suffix"], |data, injected| {
                let salutation = injected.get::<String>(0)?;
                let suffix = injected.get::<char>(1)?;
                let name = data.field("name");
                Ok(fields! { "text" => format!("{salutation} {}{suffix}", name.as_str().unwrap_or("?")) })
            }))
            .build()
            .unwrap();
        let mapper = ResourceMapper::builder()
            .resolver(
                ProviderMap::new()
                    .provide("salutation", String::from("Hello"))
                    .provide("suffix", '!'),
            )
            .build();

        let json = mapper
            .map_to_json(Resource::make(&class, Object::new().with("name", "Ada")))
            .await
            .unwrap();
        assert_eq!(json["text"], "Hello Ada!");
    }

    #[tokio::test]
    async fn wrong_collaborator_type_surfaces_as_injection_mismatch() {
        let class = Class::resource("Broken")
            .rule(OverrideRule::from_fn(["n"], |_, injected| {
                injected.get::<String>(0)?;
                Ok(fields! {})
            }))
            .build()
            .unwrap();
        let mapper = ResourceMapper::builder()
            .resolver(ProviderMap::new().provide("n", 5u32))
            .build();
        let err = mapper.map(Resource::make(&class, Value::Null)).await.unwrap_err();
        assert!(matches!(err, MapperError::InjectionMismatch { index: 0, .. }));
    }

    #[tokio::test]
    async fn collection_field_holding_a_scalar_renders_empty() {
        let tag = Class::resource("Tag").field("label").build().unwrap();
        let post = Class::resource("Post").collection("tags", &tag).build().unwrap();
        let json = ResourceMapper::new()
            .map_to_json(Resource::make(&post, Object::new().with("tags", "oops")))
            .await
            .unwrap();
        assert_eq!(json, serde_json::json!({ "tags": [] }));
    }

    #[tokio::test]
    async fn raw_cycle_through_typed_field_terminates() {
        struct SelfLinked;
        impl FieldSource for SelfLinked {
            fn fields(&self, _: &ClassRef) -> Vec<String> {
                vec!["label".into(), "next".into()]
            }
            fn field_meta(&self, class: &ClassRef, name: &str) -> Option<FieldMeta> {
                (name == "next").then(|| FieldMeta::single(class))
            }
        }

        let class = Class::resource("Node").build().unwrap();
        let raw = Object::new().with("label", "loop");
        raw.set("next", Value::Object(raw.clone()));

        let mapper = ResourceMapper::builder().field_source(SelfLinked).build();
        let out = mapper.map(Resource::make(&class, raw)).await.unwrap();
        let next = out.as_resource().unwrap().get("next").unwrap();
        let next = next.as_resource().unwrap();
        assert_eq!(next.get("label").unwrap().as_str(), Some("loop"));
        assert!(next.get("next").unwrap().as_resource().unwrap().ptr_eq(next));
        assert!(matches!(out.to_json(), Err(MapperError::CyclicOutput)));
    }
}
