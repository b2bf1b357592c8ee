// Copyright 2025 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Store-wide schema registry.

use alloc::format;
use alloc::string::String;

use hashbrown::HashMap;
use umbra_value::{Shape, Value};

use crate::error::ShadowError;
use crate::schema::{NodeKind, Schema, SchemaRef};

/// Default-by-name schemas plus the generic schemas used for inference.
///
/// A child whose key matches a registered name is shadowed with that schema
/// when its parent names no schema for it. Children nothing resolves for are
/// shadowed with the generic schema matching their value shape.
///
/// # Example
///
/// ```rust
/// use umbra_shadow::{NodeKind, Schema, SchemaRegistry};
/// use umbra_value::Value;
///
/// let mut registry = SchemaRegistry::new();
/// registry
///     .register("author", Schema::builder(NodeKind::Record).name("Author").build())
///     .unwrap();
///
/// assert_eq!(registry.by_name("author").and_then(|s| s.name()), Some("Author"));
/// assert!(registry.register("author", Schema::builder(NodeKind::Record).build()).is_err());
/// assert_eq!(registry.infer(&Value::from(3)).kind(), NodeKind::Scalar);
/// ```
#[derive(Debug)]
pub struct SchemaRegistry {
    by_name: HashMap<String, SchemaRef>,
    record: SchemaRef,
    sequence: SchemaRef,
    scalar: SchemaRef,
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaRegistry {
    /// Creates a registry with no named schemas.
    #[must_use]
    pub fn new() -> Self {
        Self {
            by_name: HashMap::new(),
            record: Schema::builder(NodeKind::Record).build(),
            sequence: Schema::builder(NodeKind::Sequence).build(),
            scalar: Schema::builder(NodeKind::Scalar).build(),
        }
    }

    /// Registers the default schema for children keyed `name`.
    ///
    /// Fails with [`ShadowError::IdentityConflict`] if the name is taken.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        schema: SchemaRef,
    ) -> Result<(), ShadowError> {
        let name = name.into();
        if self.by_name.contains_key(&name) {
            return Err(ShadowError::IdentityConflict {
                message: format!("schema `{name}` is already registered"),
            });
        }
        self.by_name.insert(name, schema);
        Ok(())
    }

    /// Default schema registered for `name`.
    #[must_use]
    pub fn by_name(&self, name: &str) -> Option<&SchemaRef> {
        self.by_name.get(name)
    }

    /// Number of named schemas.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// Returns `true` if no names are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Generic schema for a value shape.
    #[must_use]
    pub fn generic(&self, shape: Shape) -> &SchemaRef {
        match shape {
            Shape::Record => &self.record,
            Shape::Sequence => &self.sequence,
            Shape::Scalar => &self.scalar,
        }
    }

    /// Generic schema inferred from `value`.
    #[must_use]
    pub fn infer(&self, value: &Value) -> SchemaRef {
        self.generic(value.shape()).clone()
    }
}
