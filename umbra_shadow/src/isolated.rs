// Copyright 2025 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Keyed writes on collections reconciled with [`Strategy::Isolated`].
//!
//! Every write records the touched key as dirty on the owner, so the next
//! commit revisits only those entries. Entries never written keep their
//! Snapshots without being visited.
//!
//! [`Strategy::Isolated`]: crate::Strategy::Isolated

use alloc::vec::Vec;
use core::fmt;

use umbra_value::{Key, Shape, Value};

use crate::error::ShadowError;
use crate::id::PropertyId;
use crate::store::Store;

/// Write view over an isolated collection, from [`ShadowMut::isolated`].
///
/// [`ShadowMut::isolated`]: crate::ShadowMut::isolated
///
/// # Example
///
/// ```rust
/// use umbra_shadow::{NodeKind, Schema, Store, StoreConfig, Strategy};
/// use umbra_value::Value;
///
/// let todos = Schema::builder(NodeKind::Record)
///     .strategy(Strategy::Isolated)
///     .initial(Value::empty_record())
///     .build();
/// let root = Schema::builder(NodeKind::Record).child("todos", todos).build();
/// let mut store = Store::new(StoreConfig::builder().root_schema(root).build());
///
/// store.edit_root().child("todos")?.isolated()?.set("t1", "write docs")?;
/// store.flush();
///
/// let todos = store.shadow().get("todos").unwrap();
/// assert_eq!(todos.get("t1").unwrap().as_str(), Some("write docs"));
/// # Ok::<(), umbra_shadow::ShadowError>(())
/// ```
pub struct IsolatedMut<'s> {
    store: &'s mut Store,
    pid: PropertyId,
}

impl<'s> IsolatedMut<'s> {
    pub(crate) fn new(store: &'s mut Store, pid: PropertyId) -> Self {
        Self { store, pid }
    }

    /// Sets the entry at `key`.
    pub fn set(&mut self, key: impl Into<Key>, value: impl Into<Value>) -> Result<(), ShadowError> {
        let changed = self
            .store
            .engine
            .set_child(self.pid, key.into(), value.into())?;
        if changed {
            self.store.schedule();
        }
        Ok(())
    }

    /// Removes the entry at `key`, returning its staged value.
    pub fn remove(&mut self, key: impl Into<Key>) -> Result<Option<Value>, ShadowError> {
        let removed = self.store.engine.remove_child(self.pid, &key.into())?;
        if removed.is_some() {
            self.store.schedule();
        }
        Ok(removed)
    }

    /// Removes every entry.
    pub fn clear(&mut self) -> Result<(), ShadowError> {
        for key in self.keys() {
            self.remove(key)?;
        }
        Ok(())
    }

    /// Replays every field of a serialized record through [`set`](Self::set).
    ///
    /// Entries missing from `record` are kept.
    pub fn restore(&mut self, record: &Value) -> Result<(), ShadowError> {
        let fields = record.as_record().ok_or(ShadowError::WrongShape {
            expected: Shape::Record,
            found: record.shape(),
        })?;
        for (name, value) in fields {
            self.set(name.clone(), value.clone())?;
        }
        Ok(())
    }

    /// Staged value of the entry at `key`.
    #[must_use]
    pub fn get(&self, key: impl Into<Key>) -> Option<Value> {
        self.store
            .engine
            .staged_value(self.pid)?
            .get(&key.into())
            .cloned()
    }

    /// Staged entry keys.
    #[must_use]
    pub fn keys(&self) -> Vec<Key> {
        self.store.engine.staged_keys(self.pid)
    }

    /// Number of staged entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.store
            .engine
            .staged_value(self.pid)
            .map_or(0, |value| value.len())
    }

    /// `true` if no entry is staged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for IsolatedMut<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IsolatedMut")
            .field("pid", &self.pid)
            .finish_non_exhaustive()
    }
}
