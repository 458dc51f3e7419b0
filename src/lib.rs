//! # Resource Mapper
//!
//! > **Turn arbitrary object graphs into plain, JSON-safe output.**
//!
//! Handlers hand back domain values: nested records, dates, byte blobs, big
//! integers, maps, sets, pages of results, sometimes graphs with cycles. This
//! crate walks such a graph and produces a tree that serializes without
//! surprises, rendering each record through an explicit *resource* declaration
//! instead of dumping every field it happens to carry.
//!
//! ## 🏗️ Design Philosophy
//!
//! ### Declarations, not reflection
//! A resource class lists the fields it exposes and, optionally, an override
//! rule that computes some of them. Anything not declared stays out of the
//! output, so a `password` column never leaks because someone forgot to strip it.
//!
//! ### One pass, one visited set
//! Each top-level [`ResourceMapper::map`] call tracks the handles it has
//! entered. A handle is processed at most once per call, which makes cyclic
//! and diamond-shaped graphs terminate. Nothing is cached between calls except
//! the per-class field lists.
//!
//! ### Converters are data
//! Dates, bytes, maps and sets are handled by entries of a [`MapperRegistry`]
//! consulted in order, first match wins. Applications append their own
//! [`Converter`]s for types the built-ins do not cover.
//!
//! ## 🗺️ Module Tour
//!
//! ### 1. The Data ([`value`], [`resource`])
//! - **Role**: The dynamic [`Value`] graph and the [`Resource`] / [`Paginated`] wrappers.
//! - **Key items**: [`Object`], [`Resource::make`], [`Resource::collection`], [`Resource::paginated`].
//!
//! ### 2. The Declarations ([`class`], [`rule`])
//! - **Role**: Which fields a class exposes, which rule overrides them.
//! - **Key items**: [`Class::resource`], [`OverrideRule::from_fn`], [`FieldSource`], [`RuleSource`].
//!
//! ### 3. The Engine ([`mapper`], [`pipeline`], [`registry`])
//! - **Role**: Recursive mapping, the resource field pipeline and the converter registry.
//! - **Key items**: [`ResourceMapper`], [`MappingPass`], [`MatchType`].
//!
//! ### 4. The Wiring ([`resolver`], [`mock`])
//! - **Role**: Collaborators injected into override rules, and a mock for tests.
//! - **Key items**: [`CollaboratorResolver`], [`ProviderMap`], [`mock::MockResolver`].
//!
//! ### 5. Observability
//! Every stage logs through `tracing`; see the [`tracing`](crate::tracing) module.
//!
//! ## 🚀 Quick Start
//!
//! ```rust
//! use resource_mapper::{fields, Class, Object, OverrideRule, ProviderMap, Resource, ResourceMapper};
//!
//! # #[tokio::main]
//! # async fn main() -> resource_mapper::Result<()> {
//! let author = Class::resource("AuthorResource").field("name").build()?;
//! let post = Class::resource("PostResource")
//!     .field("title")
//!     .nested("author", &author)
//!     .field("url")
//!     .rule(OverrideRule::from_fn(["BASE_URL"], |data, injected| {
//!         let base = injected.get::<String>(0)?;
//!         Ok(fields! { "url" => format!("{base}/posts/{}", data.field("id").as_i64().unwrap_or(0)) })
//!     }))
//!     .build()?;
//!
//! let mapper = ResourceMapper::builder()
//!     .resolver(ProviderMap::new().provide("BASE_URL", String::from("https://blog.example")))
//!     .build();
//!
//! let raw = Object::new()
//!     .with("id", 3)
//!     .with("title", "Hello")
//!     .with("author", Object::new().with("name", "Ada").with("email", "ada@example.com"));
//! let page = Resource::paginated(&post, [raw], 25);
//!
//! let json = mapper.map_to_json(page).await?;
//! assert_eq!(
//!     json,
//!     serde_json::json!({
//!         "data": [{
//!             "title": "Hello",
//!             "author": { "name": "Ada" },
//!             "url": "https://blog.example/posts/3"
//!         }],
//!         "total": 25
//!     })
//! );
//! # Ok(())
//! # }
//! ```
//!
//! ### Running the Demo
//!
//! ```bash
//! RUST_LOG=debug cargo run
//! ```

pub mod class;
pub mod error;
pub mod mapper;
pub mod mock;
pub mod pipeline;
pub mod registry;
pub mod resolver;
pub mod resource;
pub mod rule;
pub mod tracing;
pub mod value;

pub use class::{Class, ClassBuilder, ClassDeclarations, ClassKind, ClassRef, FieldMeta, FieldSource, RuleSource};
pub use error::{BoxError, MapperError, Result};
pub use mapper::{MappingPass, ResourceMapper, ResourceMapperBuilder};
pub use registry::{Converter, FnConverter, MapperRegistry, MatchType};
pub use resolver::{Collaborator, CollaboratorResolver, InjectionToken, NoCollaborators, ProviderMap};
pub use resource::{paginated_class, Paginated, Resource};
pub use rule::{FieldOverride, Injected, OverrideRule};
pub use value::{iso8601, Array, BigInt, Fields, MapContainer, Object, Opaque, SetContainer, Value};
