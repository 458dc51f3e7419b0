//! # Resource Mapper Demo
//!
//! Declares a small blog model, maps one page of posts and prints the JSON.
//!
//! 1. A `TagResource` nested as a collection inside `PostResource`.
//! 2. An override rule that injects a URL builder through a [`ProviderMap`].
//! 3. A subclass whose own rule replaces one of its parent's computed fields.

use chrono::{TimeZone, Utc};
use resource_mapper::tracing::setup_tracing;
use resource_mapper::{
    fields, BigInt, Class, MapContainer, Object, OverrideRule, Paginated, ProviderMap, Resource, ResourceMapper,
    SetContainer, Value,
};
use tracing::{info, Instrument};

/// Builds public links; injected into the post rule.
struct LinkBuilder {
    base: String,
}

impl LinkBuilder {
    fn post(&self, id: i64) -> String {
        format!("{}/posts/{id}", self.base)
    }
}

#[tokio::main]
async fn main() -> Result<(), String> {
    setup_tracing();

    info!("Declaring resource classes");
    let tag = Class::resource("TagResource").field("label").build().map_err(|e| e.to_string())?;
    let post = Class::resource("PostResource")
        .field("id")
        .field("title")
        .field("published_at")
        .field("views")
        .field("checksum")
        .field("meta")
        .collection("tags", &tag)
        .field("url")
        .rule(OverrideRule::from_fn(["LINKS"], |data, injected| {
            let links = injected.get::<LinkBuilder>(0)?;
            let id = data.field("id").as_i64().unwrap_or_default();
            Ok(fields! { "url" => links.post(id) })
        }))
        .build()
        .map_err(|e| e.to_string())?;
    let featured = Class::resource("FeaturedPostResource")
        .extends(&post)
        .field("badge")
        .rule(OverrideRule::from_fn(Vec::<&'static str>::new(), |data, _| {
            let title = data.field("title");
            Ok(fields! {
                "title" => format!("★ {}", title.as_str().unwrap_or_default()),
                "badge" => "featured",
            })
        }))
        .build()
        .map_err(|e| e.to_string())?;

    let mapper = ResourceMapper::builder()
        .resolver(ProviderMap::new().provide(
            "LINKS",
            LinkBuilder {
                base: "https://blog.example".to_string(),
            },
        ))
        .build();

    let views = BigInt::from(90_071_992_547_409_930_i64);
    let raw_post = |id: i64, title: &str| {
        Object::new()
            .with("id", id)
            .with("title", title)
            .with("author_password", "hunter2")
            .with("published_at", Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single())
            .with("views", views.clone())
            .with("checksum", Value::bytes(*b"rust"))
            .with("meta", MapContainer::new().with("lang", "en").with(1, true))
            .with(
                "tags",
                SetContainer::new()
                    .with(Object::new().with("label", "rust"))
                    .with(Object::new().with("label", "serde")),
            )
    };

    let page = Paginated::new(
        vec![
            Resource::make(&post, raw_post(1, "Hello")),
            Resource::make(&featured, raw_post(2, "Launch day")),
        ],
        42,
    );

    let json = async { mapper.map_to_json(page).await.map_err(|e| e.to_string()) }
        .instrument(tracing::info_span!("render_page"))
        .await?;

    info!(items = 2, total = 42, "Page rendered");
    println!("{json:#}");
    Ok(())
}
