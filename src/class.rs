//! # Classes & Declarations
//!
//! A [`Class`] is the runtime tag that tells the mapper which fields a value
//! advertises and which override rule applies to it. Classes form single
//! inheritance chains: a subclass inherits every field declaration and every
//! ancestor's override rule.
//!
//! The mapper never reads a `Class` directly. It asks a [`FieldSource`] for the
//! declared field list and per-field metadata, and a [`RuleSource`] for the rule
//! declared on each class of a chain. [`ClassDeclarations`] answers both from
//! what was passed to the [`ClassBuilder`]; plug in your own sources when the
//! declarations live elsewhere (generated code, configuration, ...).
//!
//! ```rust
//! use resource_mapper::{Class, ClassDeclarations, FieldSource};
//!
//! let user = Class::resource("UserResource").field("id").field("name").build().unwrap();
//! let admin = Class::resource("AdminResource")
//!     .extends(&user)
//!     .field("permissions")
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(ClassDeclarations.fields(&admin), ["id", "name", "permissions"]);
//! ```

use crate::error::{MapperError, Result};
use crate::rule::OverrideRule;
use std::fmt;
use std::sync::Arc;

/// Shared handle to a class. Classes are compared by identity.
pub type ClassRef = Arc<Class>;

/// Whether instances are resource wrappers or plain objects.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClassKind {
    Plain,
    Resource,
}

/// Type metadata attached to a declared field.
#[derive(Clone, Debug, Default)]
pub struct FieldMeta {
    /// The field holds a sequence of `element_type`.
    pub is_array: bool,
    /// Declared type of the field (or of its elements). Only resource classes
    /// trigger auto-wrapping.
    pub element_type: Option<ClassRef>,
}

impl FieldMeta {
    pub fn single(class: &ClassRef) -> Self {
        Self {
            is_array: false,
            element_type: Some(class.clone()),
        }
    }

    pub fn array_of(class: &ClassRef) -> Self {
        Self {
            is_array: true,
            element_type: Some(class.clone()),
        }
    }

    /// The resource class nested values of this field should be wrapped in.
    pub fn nested_resource(&self) -> Option<&ClassRef> {
        self.element_type.as_ref().filter(|class| class.is_resource())
    }
}

struct FieldDecl {
    name: String,
    meta: Option<FieldMeta>,
}

/// A declared class: name, parent, own fields and own override rule.
pub struct Class {
    name: String,
    kind: ClassKind,
    parent: Option<ClassRef>,
    fields: Vec<FieldDecl>,
    rule: Option<OverrideRule>,
}

impl Class {
    /// Starts declaring a plain (non-resource) class.
    pub fn plain(name: impl Into<String>) -> ClassBuilder {
        ClassBuilder::new(name, ClassKind::Plain)
    }

    /// Starts declaring a resource class.
    pub fn resource(name: impl Into<String>) -> ClassBuilder {
        ClassBuilder::new(name, ClassKind::Resource)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ClassKind {
        self.kind
    }

    pub fn is_resource(&self) -> bool {
        self.kind == ClassKind::Resource
    }

    pub fn parent(&self) -> Option<&ClassRef> {
        self.parent.as_ref()
    }

    /// Names declared directly on this class, in declaration order.
    pub fn own_fields(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// `None` when this class does not declare `name` itself;
    /// `Some(None)` when it declares it without type metadata.
    pub fn own_field_meta(&self, name: &str) -> Option<Option<&FieldMeta>> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.meta.as_ref())
    }

    pub fn own_rule(&self) -> Option<&OverrideRule> {
        self.rule.as_ref()
    }

    /// This class followed by its ancestors, most specific first.
    pub fn ancestry(self: &Arc<Self>) -> Vec<ClassRef> {
        let mut chain = vec![self.clone()];
        let mut current = self.parent.clone();
        while let Some(class) = current {
            current = class.parent.clone();
            chain.push(class);
        }
        chain
    }

    /// Reflexive: every class is a subclass of itself.
    pub fn is_subclass_of(&self, other: &Class) -> bool {
        let mut current = Some(self);
        while let Some(class) = current {
            if std::ptr::eq(class, other) {
                return true;
            }
            current = class.parent.as_deref();
        }
        false
    }
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Class")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("parent", &self.parent.as_ref().map(|p| p.name()))
            .field("fields", &self.own_fields().collect::<Vec<_>>())
            .field("has_rule", &self.rule.is_some())
            .finish()
    }
}

/// Fluent declaration of a [`Class`].
pub struct ClassBuilder {
    name: String,
    kind: ClassKind,
    parent: Option<ClassRef>,
    fields: Vec<FieldDecl>,
    rule: Option<OverrideRule>,
}

impl ClassBuilder {
    fn new(name: impl Into<String>, kind: ClassKind) -> Self {
        Self {
            name: name.into(),
            kind,
            parent: None,
            fields: Vec::new(),
            rule: None,
        }
    }

    pub fn extends(mut self, parent: &ClassRef) -> Self {
        self.parent = Some(parent.clone());
        self
    }

    /// Declares an output field with no type metadata.
    pub fn field(self, name: impl Into<String>) -> Self {
        self.declare(name.into(), None)
    }

    /// Declares a field holding a single value of `class`.
    pub fn nested(self, name: impl Into<String>, class: &ClassRef) -> Self {
        self.declare(name.into(), Some(FieldMeta::single(class)))
    }

    /// Declares a field holding a sequence of `class` values.
    pub fn collection(self, name: impl Into<String>, class: &ClassRef) -> Self {
        self.declare(name.into(), Some(FieldMeta::array_of(class)))
    }

    pub fn typed(self, name: impl Into<String>, meta: FieldMeta) -> Self {
        self.declare(name.into(), Some(meta))
    }

    /// Attaches the class's own override rule, replacing an earlier one.
    pub fn rule(mut self, rule: OverrideRule) -> Self {
        self.rule = Some(rule);
        self
    }

    // Redeclaring a name updates its metadata but keeps its position.
    fn declare(mut self, name: String, meta: Option<FieldMeta>) -> Self {
        match self.fields.iter_mut().find(|f| f.name == name) {
            Some(existing) => existing.meta = meta,
            None => self.fields.push(FieldDecl { name, meta }),
        }
        self
    }

    pub fn build(self) -> Result<ClassRef> {
        if let Some(parent) = &self.parent {
            if parent.kind != self.kind {
                return Err(MapperError::InvalidHierarchy {
                    class: self.name,
                    parent: parent.name.clone(),
                    reason: "resource and plain classes cannot extend each other",
                });
            }
        }
        Ok(self.finish())
    }

    pub(crate) fn finish(self) -> ClassRef {
        Arc::new(Class {
            name: self.name,
            kind: self.kind,
            parent: self.parent,
            fields: self.fields,
            rule: self.rule,
        })
    }
}

// =============================================================================
// DECLARATION SOURCES
// =============================================================================

/// Where the mapper learns which fields a class exposes.
pub trait FieldSource: Send + Sync {
    /// Output field names for `class`, inherited ones included.
    fn fields(&self, class: &ClassRef) -> Vec<String>;

    /// Type metadata for one field of `class`, if any was declared.
    fn field_meta(&self, class: &ClassRef, name: &str) -> Option<FieldMeta>;
}

/// Where the mapper learns which override rule a class declares.
pub trait RuleSource: Send + Sync {
    /// The rule declared directly on `class` (not inherited).
    fn rule(&self, class: &ClassRef) -> Option<OverrideRule>;
}

/// Reads declarations straight from the classes built with [`ClassBuilder`].
#[derive(Clone, Copy, Debug, Default)]
pub struct ClassDeclarations;

impl FieldSource for ClassDeclarations {
    /// Ancestors' fields first; a redeclared name keeps its first position.
    fn fields(&self, class: &ClassRef) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for ancestor in class.ancestry().iter().rev() {
            for name in ancestor.own_fields() {
                if !names.iter().any(|n| n == name) {
                    names.push(name.to_string());
                }
            }
        }
        names
    }

    /// The nearest declaration wins, even if it carries no metadata.
    fn field_meta(&self, class: &ClassRef, name: &str) -> Option<FieldMeta> {
        class
            .ancestry()
            .iter()
            .find_map(|c| c.own_field_meta(name))
            .flatten()
            .cloned()
    }
}

impl RuleSource for ClassDeclarations {
    fn rule(&self, class: &ClassRef) -> Option<OverrideRule> {
        class.own_rule().cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inherited_fields_come_first_without_duplicates() {
        let base = Class::resource("Base").field("id").field("name").build().unwrap();
        let child = Class::resource("Child")
            .extends(&base)
            .field("email")
            .field("id")
            .build()
            .unwrap();
        assert_eq!(ClassDeclarations.fields(&child), ["id", "name", "email"]);
    }

    #[test]
    fn nearest_field_meta_wins() {
        let tag = Class::resource("Tag").field("label").build().unwrap();
        let base = Class::resource("Base").collection("tags", &tag).build().unwrap();
        let child = Class::resource("Child").extends(&base).field("tags").build().unwrap();

        let meta = ClassDeclarations.field_meta(&base, "tags").unwrap();
        assert!(meta.is_array);
        assert!(Arc::ptr_eq(meta.nested_resource().unwrap(), &tag));
        assert!(ClassDeclarations.field_meta(&child, "tags").is_none());
        assert!(ClassDeclarations.field_meta(&child, "missing").is_none());
    }

    #[test]
    fn plain_element_types_are_not_nested_resources() {
        let address = Class::plain("Address").field("city").build().unwrap();
        assert!(FieldMeta::single(&address).nested_resource().is_none());
    }

    #[test]
    fn subclass_relation_walks_parents() {
        let a = Class::resource("A").build().unwrap();
        let b = Class::resource("B").extends(&a).build().unwrap();
        let c = Class::resource("C").extends(&b).build().unwrap();
        assert!(c.is_subclass_of(&a));
        assert!(c.is_subclass_of(&c));
        assert!(!a.is_subclass_of(&c));
        let names: Vec<_> = c.ancestry().iter().map(|k| k.name().to_string()).collect();
        assert_eq!(names, ["C", "B", "A"]);
    }

    #[test]
    fn kinds_cannot_be_mixed() {
        let plain = Class::plain("Plain").build().unwrap();
        let err = Class::resource("R").extends(&plain).build().unwrap_err();
        assert!(matches!(err, MapperError::InvalidHierarchy { .. }));
        assert!(err.is_configuration());
    }

    #[test]
    fn redeclared_field_keeps_position() {
        let tag = Class::resource("Tag").build().unwrap();
        let class = Class::resource("Post")
            .field("tags")
            .field("title")
            .collection("tags", &tag)
            .build()
            .unwrap();
        assert_eq!(class.own_fields().collect::<Vec<_>>(), ["tags", "title"]);
        assert!(class.own_field_meta("tags").flatten().unwrap().is_array);
    }
}
