// Copyright 2025 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Schema descriptors.
//!
//! A [`Schema`] is the static configuration of one node type: its kind, its
//! default raw value, inherited-flag overrides, how its children are shadowed,
//! which reconciliation strategy it uses, its custom methods and its lifecycle
//! mixins. Schemas are built once with [`SchemaBuilder`] and shared through
//! [`SchemaRef`].

use alloc::collections::BTreeMap;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use hashbrown::HashMap;
use umbra_value::{Key, Shape, Value};

use crate::error::ShadowError;
use crate::lifecycle::Lifecycle;
use crate::shadow::{Shadow, ShadowMut};

/// Shared handle to a [`Schema`].
pub type SchemaRef = Rc<Schema>;

/// Resolves a schema for a child the schema does not name.
///
/// Receives the child key and its raw value; `None` falls through to the next
/// resolution step.
pub type ChildDescriptor = Rc<dyn Fn(&Key, &Value) -> Option<SchemaRef>>;

/// Read-only custom method over a committed [`Shadow`].
pub type ReadMethod = Rc<dyn Fn(&Shadow, &[Value]) -> Result<Value, ShadowError>>;

/// Custom method bound to the live Property through a [`ShadowMut`].
pub type BoundMethod = Rc<dyn Fn(&mut ShadowMut<'_>, &[Value]) -> Result<Value, ShadowError>>;

/// Structural kind of a shadowed node.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Children addressed by field name.
    Record,
    /// Children addressed by position.
    Sequence,
    /// A leaf without children.
    Scalar,
}

impl NodeKind {
    /// Kind matching a value shape.
    #[must_use]
    pub fn of(shape: Shape) -> Self {
        match shape {
            Shape::Record => Self::Record,
            Shape::Sequence => Self::Sequence,
            Shape::Scalar => Self::Scalar,
        }
    }

    /// Returns `true` if a node of this kind can shadow `value`.
    ///
    /// Every kind accepts `Null`.
    #[must_use]
    pub fn accepts(self, value: &Value) -> bool {
        value.is_null() || Self::of(value.shape()) == self
    }

    /// Raw value a fresh node of this kind starts from.
    #[must_use]
    pub fn empty_value(self) -> Value {
        match self {
            Self::Record => Value::empty_record(),
            Self::Sequence => Value::empty_sequence(),
            Self::Scalar => Value::Null,
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Record => "record",
            Self::Sequence => "sequence",
            Self::Scalar => "scalar",
        })
    }
}

/// How the commit pass walks a node's children.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Every child of an invalid node is compared against its committed value.
    #[default]
    Full,
    /// Only keys marked dirty since the last tick are revisited. Intended for
    /// large keyed collections.
    Isolated,
}

#[derive(Clone)]
pub(crate) enum Method {
    Read(ReadMethod),
    Bound(BoundMethod),
}

/// Static configuration of one node type.
///
/// # Example
///
/// ```rust
/// use umbra_shadow::{NodeKind, Schema, Strategy};
/// use umbra_value::{Key, Value};
///
/// let todo = Schema::builder(NodeKind::Record)
///     .name("Todo")
///     .child("done", Schema::builder(NodeKind::Scalar).initial(false).build())
///     .build();
///
/// let todos = Schema::builder(NodeKind::Record)
///     .strategy(Strategy::Isolated)
///     .element(todo.clone())
///     .build();
///
/// assert_eq!(todo.child(&Key::from("done")).unwrap().initial(), Some(&Value::from(false)));
/// assert_eq!(todos.strategy(), Strategy::Isolated);
/// assert!(todos.element().is_some());
/// ```
pub struct Schema {
    name: Option<String>,
    kind: NodeKind,
    strategy: Strategy,
    initial: Option<Value>,
    readonly: Option<bool>,
    auto_shadow: Option<bool>,
    children: BTreeMap<Key, SchemaRef>,
    element: Option<SchemaRef>,
    descriptor: Option<ChildDescriptor>,
    methods: HashMap<String, Method>,
    hooks: Vec<Rc<dyn Lifecycle>>,
}

impl Schema {
    /// Starts a builder for a node of `kind`.
    #[must_use]
    pub fn builder(kind: NodeKind) -> SchemaBuilder {
        SchemaBuilder::new(kind)
    }

    /// Diagnostic name, if one was given.
    #[must_use]
    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Node kind.
    #[must_use]
    #[inline]
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Reconciliation strategy for the node's children.
    #[must_use]
    #[inline]
    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Default raw value.
    #[must_use]
    #[inline]
    pub fn initial(&self) -> Option<&Value> {
        self.initial.as_ref()
    }

    /// Explicit read-only flag; `None` inherits.
    #[must_use]
    #[inline]
    pub fn readonly(&self) -> Option<bool> {
        self.readonly
    }

    /// Explicit auto-shadow flag; `None` inherits.
    #[must_use]
    #[inline]
    pub fn auto_shadow(&self) -> Option<bool> {
        self.auto_shadow
    }

    /// Schema of a named child.
    #[must_use]
    pub fn child(&self, key: &Key) -> Option<&SchemaRef> {
        self.children.get(key)
    }

    /// Iterates the named children.
    pub fn children(&self) -> impl Iterator<Item = (&Key, &SchemaRef)> {
        self.children.iter()
    }

    /// Schema applied to every child not named explicitly.
    #[must_use]
    #[inline]
    pub fn element(&self) -> Option<&SchemaRef> {
        self.element.as_ref()
    }

    /// Just-in-time child descriptor.
    #[must_use]
    #[inline]
    pub fn descriptor(&self) -> Option<&ChildDescriptor> {
        self.descriptor.as_ref()
    }

    /// Returns `true` if a method of that name is registered.
    #[must_use]
    pub fn has_method(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    /// Lifecycle mixins, in registration order.
    #[must_use]
    pub fn hooks(&self) -> &[Rc<dyn Lifecycle>] {
        &self.hooks
    }

    pub(crate) fn method(&self, name: &str) -> Option<&Method> {
        self.methods.get(name)
    }

    /// Label used in log output.
    pub(crate) fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(match self.kind {
            NodeKind::Record => "record",
            NodeKind::Sequence => "sequence",
            NodeKind::Scalar => "scalar",
        })
    }
}

// Manual Debug impl since callbacks aren't Debug
impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut methods: Vec<&str> = self.methods.keys().map(String::as_str).collect();
        methods.sort_unstable();
        f.debug_struct("Schema")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("strategy", &self.strategy)
            .field("initial", &self.initial)
            .field("readonly", &self.readonly)
            .field("auto_shadow", &self.auto_shadow)
            .field("children", &self.children)
            .field("element", &self.element)
            .field("has_descriptor", &self.descriptor.is_some())
            .field("methods", &methods)
            .field("hooks", &self.hooks.len())
            .finish()
    }
}

/// Builder for [`Schema`].
pub struct SchemaBuilder {
    schema: Schema,
}

// Manual Debug impl since callbacks aren't Debug
impl fmt::Debug for SchemaBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SchemaBuilder").field(&self.schema).finish()
    }
}

impl SchemaBuilder {
    /// Creates a builder for a node of `kind` with no overrides.
    #[must_use]
    pub fn new(kind: NodeKind) -> Self {
        Self {
            schema: Schema {
                name: None,
                kind,
                strategy: Strategy::Full,
                initial: None,
                readonly: None,
                auto_shadow: None,
                children: BTreeMap::new(),
                element: None,
                descriptor: None,
                methods: HashMap::new(),
                hooks: Vec::new(),
            },
        }
    }

    /// Sets a diagnostic name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.schema.name = Some(name.into());
        self
    }

    /// Sets the default raw value.
    ///
    /// Used for the root when the store has no initial state, and for named
    /// children missing from their parent's value when the parent is first
    /// shadowed.
    #[must_use]
    pub fn initial(mut self, value: impl Into<Value>) -> Self {
        self.schema.initial = Some(value.into());
        self
    }

    /// Sets the explicit read-only flag.
    #[must_use]
    pub fn readonly(mut self, readonly: bool) -> Self {
        self.schema.readonly = Some(readonly);
        self
    }

    /// Sets the explicit auto-shadow flag.
    #[must_use]
    pub fn auto_shadow(mut self, auto_shadow: bool) -> Self {
        self.schema.auto_shadow = Some(auto_shadow);
        self
    }

    /// Names the schema of one child.
    #[must_use]
    pub fn child(mut self, key: impl Into<Key>, schema: SchemaRef) -> Self {
        self.schema.children.insert(key.into(), schema);
        self
    }

    /// Sets the schema applied to children not named explicitly.
    #[must_use]
    pub fn element(mut self, schema: SchemaRef) -> Self {
        self.schema.element = Some(schema);
        self
    }

    /// Sets the just-in-time child descriptor.
    #[must_use]
    pub fn descriptor<F>(mut self, descriptor: F) -> Self
    where
        F: Fn(&Key, &Value) -> Option<SchemaRef> + 'static,
    {
        self.schema.descriptor = Some(Rc::new(descriptor));
        self
    }

    /// Sets the reconciliation strategy.
    #[must_use]
    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.schema.strategy = strategy;
        self
    }

    /// Registers a read-only method callable through
    /// [`Shadow::call`](crate::Shadow::call).
    #[must_use]
    pub fn method<F>(mut self, name: impl Into<String>, method: F) -> Self
    where
        F: Fn(&Shadow, &[Value]) -> Result<Value, ShadowError> + 'static,
    {
        self.schema
            .methods
            .insert(name.into(), Method::Read(Rc::new(method)));
        self
    }

    /// Registers a method bound to the live Property, callable through
    /// [`ShadowMut::call`](crate::ShadowMut::call).
    #[must_use]
    pub fn bound_method<F>(mut self, name: impl Into<String>, method: F) -> Self
    where
        F: Fn(&mut ShadowMut<'_>, &[Value]) -> Result<Value, ShadowError> + 'static,
    {
        self.schema
            .methods
            .insert(name.into(), Method::Bound(Rc::new(method)));
        self
    }

    /// Appends a lifecycle mixin. Mixins run in registration order.
    #[must_use]
    pub fn hook(mut self, hook: Rc<dyn Lifecycle>) -> Self {
        self.schema.hooks.push(hook);
        self
    }

    /// Builds the schema.
    ///
    /// # Panics
    ///
    /// Panics if an isolated strategy is requested for a non-record kind, or
    /// if the initial value does not fit the kind.
    #[must_use]
    pub fn build(self) -> SchemaRef {
        let schema = self.schema;
        assert!(
            schema.strategy == Strategy::Full || schema.kind == NodeKind::Record,
            "isolated reconciliation needs a record schema, got {}",
            schema.kind
        );
        if let Some(initial) = &schema.initial {
            assert!(
                schema.kind.accepts(initial),
                "initial value {initial} does not fit a {} schema",
                schema.kind
            );
        }
        Rc::new(schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_accept_null_and_matching_shapes() {
        assert!(NodeKind::Record.accepts(&Value::Null));
        assert!(NodeKind::Record.accepts(&Value::empty_record()));
        assert!(!NodeKind::Record.accepts(&Value::empty_sequence()));
        assert!(NodeKind::Scalar.accepts(&Value::from("x")));
        assert!(!NodeKind::Scalar.accepts(&Value::empty_record()));
    }

    #[test]
    fn builder_collects_configuration() {
        let leaf = Schema::builder(NodeKind::Scalar).initial(0).build();
        let schema = Schema::builder(NodeKind::Record)
            .name("Counter")
            .readonly(true)
            .child("count", leaf)
            .method("double", |shadow, _| {
                let count = shadow.get("count").and_then(|c| c.as_i64()).unwrap_or(0);
                Ok(Value::from(count * 2))
            })
            .build();

        assert_eq!(schema.name(), Some("Counter"));
        assert_eq!(schema.readonly(), Some(true));
        assert_eq!(schema.auto_shadow(), None);
        assert!(schema.has_method("double"));
        assert!(!schema.has_method("triple"));
        assert_eq!(schema.children().count(), 1);
    }

    #[test]
    #[should_panic(expected = "isolated reconciliation needs a record schema")]
    fn isolated_sequences_are_rejected() {
        let _ = Schema::builder(NodeKind::Sequence)
            .strategy(Strategy::Isolated)
            .build();
    }
}
