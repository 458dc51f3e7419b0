//! # Resources & Pagination
//!
//! A [`Resource`] pairs a raw payload with the resource class that decides how
//! it is rendered. The payload is never touched: the mapper writes the output
//! fields onto the wrapper's own working copy, so every reference to the same
//! wrapper sees the rendered result.
//!
//! [`Paginated`] bundles one page of wrapped items with the size of the whole
//! collection and renders as `{ "data": [...], "total": n }`.

use crate::class::{Class, ClassRef};
use crate::value::{read, write, Fields, Object, Value};
use std::fmt;
use std::sync::{Arc, OnceLock, RwLock};

struct ResourceInner {
    class: ClassRef,
    data: Value,
    output: RwLock<Fields>,
}

/// Raw data tagged with its resource class.
#[derive(Clone)]
pub struct Resource(Arc<ResourceInner>);

impl Resource {
    pub fn new(class: &ClassRef, data: impl Into<Value>) -> Self {
        Self(Arc::new(ResourceInner {
            class: class.clone(),
            data: data.into(),
            output: RwLock::new(Fields::new()),
        }))
    }

    /// Wraps one raw item.
    pub fn make(class: &ClassRef, data: impl Into<Value>) -> Self {
        Self::new(class, data)
    }

    /// Wraps every raw item, preserving order.
    pub fn collection<I, V>(class: &ClassRef, items: I) -> Vec<Resource>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        items.into_iter().map(|item| Self::new(class, item)).collect()
    }

    /// Wraps every raw item of one page and records the collection size.
    pub fn paginated<I, V>(class: &ClassRef, items: I, total: u64) -> Paginated
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Paginated::new(Self::collection(class, items), total)
    }

    pub fn class(&self) -> &ClassRef {
        &self.0.class
    }

    /// The raw payload, as constructed.
    pub fn data(&self) -> &Value {
        &self.0.data
    }

    /// Rendered fields so far; empty until a mapping pass has run.
    pub fn output(&self) -> Fields {
        read(&self.0.output).clone()
    }

    /// One rendered field.
    pub fn get(&self, name: &str) -> Option<Value> {
        read(&self.0.output).get(name).cloned()
    }

    pub(crate) fn commit(&self, fields: Fields) {
        write(&self.0.output).extend(fields);
    }

    pub fn ptr_eq(&self, other: &Resource) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn addr(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("class", &self.0.class.name())
            .field("data", &self.0.data.kind())
            .field("output", &read(&self.0.output).keys().collect::<Vec<_>>())
            .finish()
    }
}

impl From<Vec<Resource>> for Value {
    fn from(items: Vec<Resource>) -> Self {
        Value::array(items)
    }
}

/// One page of resources plus the size of the full collection.
#[derive(Clone, Debug)]
pub struct Paginated {
    items: Vec<Resource>,
    total: u64,
}

impl Paginated {
    /// `total` may exceed `items.len()`.
    pub fn new(items: Vec<Resource>, total: u64) -> Self {
        Self { items, total }
    }

    pub fn items(&self) -> &[Resource] {
        &self.items
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Plain class backing paginated output; declares `data` and `total`.
pub fn paginated_class() -> &'static ClassRef {
    static CLASS: OnceLock<ClassRef> = OnceLock::new();
    CLASS.get_or_init(|| Class::plain("ResourcePaginated").field("data").field("total").finish())
}

impl From<Paginated> for Value {
    fn from(page: Paginated) -> Self {
        Value::Object(
            Object::of_class(paginated_class())
                .with("data", page.items)
                .with("total", page.total),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_class() -> ClassRef {
        Class::resource("UserResource").field("id").build().unwrap()
    }

    #[test]
    fn collection_wraps_each_item_in_order() {
        let class = user_class();
        let items = Resource::collection(&class, [1, 2, 3]);
        assert_eq!(items.len(), 3);
        assert_eq!(items[2].data().as_i64(), Some(3));
        assert!(items.iter().all(|r| Arc::ptr_eq(r.class(), &class)));
    }

    #[test]
    fn paginated_keeps_total_independent_of_page_size() {
        let class = user_class();
        let page = Resource::paginated(
            &class,
            [Object::new().with("id", 1), Object::new().with("id", 2)],
            10,
        );
        assert_eq!(page.len(), 2);
        assert_eq!(page.total(), 10);

        let value = Value::from(page);
        let object = value.as_object().unwrap();
        assert!(Arc::ptr_eq(object.class().unwrap(), paginated_class()));
        assert_eq!(object.get("data").unwrap().as_array().unwrap().len(), 2);
        assert_eq!(object.get("total").unwrap().as_i64(), Some(10));
    }

    #[test]
    fn fresh_resource_has_no_output() {
        let resource = Resource::make(&user_class(), Object::new().with("id", 5));
        assert!(resource.output().is_empty());
        assert_eq!(resource.data().field("id").as_i64(), Some(5));
    }
}
