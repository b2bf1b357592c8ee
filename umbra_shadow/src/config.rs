// Copyright 2025 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Store configuration.

use umbra_value::{Shape, Value};

use crate::registry::SchemaRegistry;
use crate::schema::SchemaRef;

/// Everything a [`Store`](crate::Store) needs to shadow its first tick.
///
/// Built with [`StoreConfig::builder`].
#[derive(Debug)]
pub struct StoreConfig {
    pub(crate) root_schema: SchemaRef,
    pub(crate) registry: SchemaRegistry,
    pub(crate) initial_state: Value,
    pub(crate) notify_unchanged: bool,
}

impl StoreConfig {
    /// Creates a builder with every option at its default.
    #[must_use]
    pub fn builder() -> StoreConfigBuilder {
        StoreConfigBuilder::new()
    }

    /// Schema of the root position.
    #[must_use]
    pub fn root_schema(&self) -> &SchemaRef {
        &self.root_schema
    }

    /// State shadowed as tick 0.
    #[must_use]
    pub fn initial_state(&self) -> &Value {
        &self.initial_state
    }

    /// Whether subscribers hear about ticks that changed nothing.
    #[must_use]
    pub fn notify_unchanged(&self) -> bool {
        self.notify_unchanged
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Builder for [`StoreConfig`].
///
/// # Example
///
/// ```rust
/// use umbra_shadow::{NodeKind, StoreConfig};
/// use umbra_value::Value;
///
/// // Without a root schema one is inferred from the initial state.
/// let config = StoreConfig::builder()
///     .initial_state(Value::empty_sequence())
///     .notify_unchanged(false)
///     .build();
/// assert_eq!(config.root_schema().kind(), NodeKind::Sequence);
/// assert!(!config.notify_unchanged());
///
/// // Without an initial state, an empty value of the root kind is used.
/// let config = StoreConfig::builder().build();
/// assert_eq!(config.initial_state(), &Value::empty_record());
/// ```
#[derive(Debug)]
pub struct StoreConfigBuilder {
    root_schema: Option<SchemaRef>,
    registry: SchemaRegistry,
    initial_state: Option<Value>,
    notify_unchanged: bool,
}

impl StoreConfigBuilder {
    /// Creates a builder with every option at its default.
    #[must_use]
    pub fn new() -> Self {
        Self {
            root_schema: None,
            registry: SchemaRegistry::new(),
            initial_state: None,
            notify_unchanged: true,
        }
    }

    /// Sets the schema of the root position.
    #[must_use]
    pub fn root_schema(mut self, schema: SchemaRef) -> Self {
        self.root_schema = Some(schema);
        self
    }

    /// Sets the registry consulted for default-by-name schemas.
    #[must_use]
    pub fn registry(mut self, registry: SchemaRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Sets the state shadowed as tick 0.
    #[must_use]
    pub fn initial_state(mut self, value: impl Into<Value>) -> Self {
        self.initial_state = Some(value.into());
        self
    }

    /// Sets whether subscribers are called for ticks that changed nothing.
    /// Defaults to `true`.
    #[must_use]
    pub fn notify_unchanged(mut self, notify: bool) -> Self {
        self.notify_unchanged = notify;
        self
    }

    /// Resolves defaults and builds the configuration.
    #[must_use]
    pub fn build(self) -> StoreConfig {
        let root_schema = match (self.root_schema, &self.initial_state) {
            (Some(schema), _) => schema,
            (None, Some(value)) => self.registry.infer(value),
            (None, None) => self.registry.generic(Shape::Record).clone(),
        };
        let initial_state = self.initial_state.unwrap_or_else(|| {
            root_schema
                .initial()
                .cloned()
                .unwrap_or_else(|| root_schema.kind().empty_value())
        });
        StoreConfig {
            root_schema,
            registry: self.registry,
            initial_state,
            notify_unchanged: self.notify_unchanged,
        }
    }
}

impl Default for StoreConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
