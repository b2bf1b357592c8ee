// Copyright 2025 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Child schema resolution.

use log::warn;
use umbra_value::{Key, Value};

use crate::registry::SchemaRegistry;
use crate::schema::{Schema, SchemaRef};

/// Which resolution step produced a child schema.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Resolution {
    /// The parent schema names the child.
    Named,
    /// The parent's just-in-time descriptor produced it.
    JustInTime,
    /// The parent's element schema.
    Element,
    /// The registry's default for the child's key.
    Registry,
    /// Inferred from the child's value shape.
    Inferred,
}

/// Decides how the children of one live node are shadowed.
///
/// Resolution order, first match wins:
///
/// 1. a schema the parent names for the key,
/// 2. the parent's just-in-time descriptor,
/// 3. the parent's element schema,
/// 4. the registry default registered under the key's name,
/// 5. inference from the value shape, only while auto-shadowing is on.
///
/// A resolved schema whose kind cannot shadow the value falls back to
/// inference, with a warning.
///
/// # Example
///
/// ```rust
/// use umbra_shadow::{NodeKind, Resolution, Schema, SchemaRegistry, Shader};
/// use umbra_value::{Key, Value};
///
/// let registry = SchemaRegistry::new();
/// let parent = Schema::builder(NodeKind::Record)
///     .child("tags", Schema::builder(NodeKind::Sequence).build())
///     .build();
///
/// let shader = Shader::new(&parent, &registry, true);
/// let (_, how) = shader.resolve(&Key::from("tags"), &Value::empty_sequence()).unwrap();
/// assert_eq!(how, Resolution::Named);
/// let (_, how) = shader.resolve(&Key::from("other"), &Value::from(1)).unwrap();
/// assert_eq!(how, Resolution::Inferred);
///
/// let strict = Shader::new(&parent, &registry, false);
/// assert!(strict.resolve(&Key::from("other"), &Value::from(1)).is_none());
/// ```
#[derive(Debug)]
pub struct Shader<'a> {
    schema: &'a Schema,
    registry: &'a SchemaRegistry,
    auto_shadow: bool,
}

impl<'a> Shader<'a> {
    /// Creates a shader for a node shadowed with `schema`; `auto_shadow` is the
    /// node's effective flag.
    #[must_use]
    pub fn new(schema: &'a Schema, registry: &'a SchemaRegistry, auto_shadow: bool) -> Self {
        Self {
            schema,
            registry,
            auto_shadow,
        }
    }

    /// Resolves the schema for the child at `key` holding `value`.
    ///
    /// `None` means the child stays unmounted.
    #[must_use]
    pub fn resolve(&self, key: &Key, value: &Value) -> Option<(SchemaRef, Resolution)> {
        let Some((schema, how)) = self.explicit(key, value) else {
            return self.infer(value);
        };
        if schema.kind().accepts(value) {
            return Some((schema, how));
        }
        warn!(
            "{how:?} schema `{}` for child `{key}` of `{}` cannot shadow a {} value; inferring",
            schema.label(),
            self.schema.label(),
            value.shape()
        );
        self.infer(value)
    }

    fn explicit(&self, key: &Key, value: &Value) -> Option<(SchemaRef, Resolution)> {
        if let Some(schema) = self.schema.child(key) {
            return Some((schema.clone(), Resolution::Named));
        }
        if let Some(descriptor) = self.schema.descriptor()
            && let Some(schema) = descriptor(key, value)
        {
            return Some((schema, Resolution::JustInTime));
        }
        if let Some(schema) = self.schema.element() {
            return Some((schema.clone(), Resolution::Element));
        }
        let schema = self.registry.by_name(key.name()?)?;
        Some((schema.clone(), Resolution::Registry))
    }

    fn infer(&self, value: &Value) -> Option<(SchemaRef, Resolution)> {
        self.auto_shadow
            .then(|| (self.registry.infer(value), Resolution::Inferred))
    }
}
