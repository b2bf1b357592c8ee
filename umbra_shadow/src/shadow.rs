// Copyright 2025 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Views over shadowed positions.
//!
//! A [`Shadow`] reads one committed Snapshot. A [`ShadowMut`] borrows the
//! [`Store`] mutably and writes the staged next state of one Property; every
//! successful write schedules a tick.

use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use umbra_value::{Key, Path, Shape, Value};

use crate::engine::Mutation;
use crate::error::ShadowError;
use crate::id::PropertyId;
use crate::isolated::IsolatedMut;
use crate::schema::{Method, NodeKind, Strategy};
use crate::snapshot::Snapshot;
use crate::store::Store;

/// Read view over one committed position.
///
/// Cloning is cheap. A Shadow keeps its Snapshot alive, so it keeps reading the
/// tick it was taken from; [`is_active`](Self::is_active) tells whether a newer
/// tick has replaced it.
///
/// # Example
///
/// ```rust
/// use umbra_shadow::Store;
/// use umbra_value::Value;
///
/// let store = Store::with_state(Value::record([(
///     "todos",
///     Value::sequence([Value::from("write docs"), Value::from("ship")]),
/// )]));
///
/// let todos = store.shadow().get("todos").unwrap();
/// assert_eq!(todos.len(), 2);
/// assert_eq!(todos.last().unwrap().as_str(), Some("ship"));
/// ```
#[derive(Clone)]
pub struct Shadow {
    snapshot: Rc<Snapshot>,
}

impl Shadow {
    pub(crate) fn new(snapshot: Rc<Snapshot>) -> Self {
        Self { snapshot }
    }

    /// The Property this view belongs to.
    #[must_use]
    #[inline]
    pub fn pid(&self) -> PropertyId {
        self.snapshot.property()
    }

    /// Raw value.
    #[must_use]
    #[inline]
    pub fn value(&self) -> &Value {
        self.snapshot.value()
    }

    /// Node kind of the schema the position was shadowed with.
    #[must_use]
    #[inline]
    pub fn kind(&self) -> NodeKind {
        self.snapshot.schema().kind()
    }

    /// Tick that built the underlying Snapshot.
    #[must_use]
    #[inline]
    pub fn tick(&self) -> u64 {
        self.snapshot.tick()
    }

    /// `false` once a later tick replaced the underlying Snapshot.
    #[must_use]
    #[inline]
    pub fn is_active(&self) -> bool {
        self.snapshot.is_active()
    }

    /// The underlying Snapshot.
    #[must_use]
    #[inline]
    pub fn snapshot(&self) -> &Rc<Snapshot> {
        &self.snapshot
    }

    /// Shadowed child at `key`; `None` if absent or unmounted.
    #[must_use]
    pub fn get(&self, key: impl Into<Key>) -> Option<Self> {
        self.snapshot.child(&key.into()).map(Self::new)
    }

    /// Shadowed descendant at `path`.
    #[must_use]
    pub fn at(&self, path: &Path) -> Option<Self> {
        path.iter()
            .try_fold(self.clone(), |shadow, key| shadow.snapshot.child(key).map(Self::new))
    }

    /// Keys of the raw value, in enumeration order.
    #[must_use]
    pub fn keys(&self) -> Vec<Key> {
        self.value().keys()
    }

    /// Number of entries in the raw value.
    #[must_use]
    pub fn len(&self) -> usize {
        self.value().len()
    }

    /// `true` if the raw value has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.value().is_empty()
    }

    /// Mounted children with their keys.
    pub fn iter(&self) -> impl Iterator<Item = (Key, Self)> + '_ {
        self.snapshot
            .child_keys()
            .into_iter()
            .filter_map(|key| Some((key.clone(), self.get(key)?)))
    }

    /// See [`Value::as_bool`].
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        self.value().as_bool()
    }

    /// See [`Value::as_i64`].
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        self.value().as_i64()
    }

    /// See [`Value::as_f64`].
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        self.value().as_f64()
    }

    /// See [`Value::as_str`].
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        self.value().as_str()
    }

    /// First item of a shadowed sequence.
    #[must_use]
    pub fn first(&self) -> Option<Self> {
        self.get(0)
    }

    /// Last item of a shadowed sequence.
    #[must_use]
    pub fn last(&self) -> Option<Self> {
        let len = self.value().as_sequence()?.len();
        self.get(len.checked_sub(1)?)
    }

    /// Calls a read method registered on the schema.
    ///
    /// Bound methods need write access; call them through
    /// [`ShadowMut::call`].
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value, ShadowError> {
        match self.snapshot.schema().method(name) {
            Some(Method::Read(method)) => method(self, args),
            _ => Err(ShadowError::UnknownMethod { name: name.into() }),
        }
    }

    /// `true` if both views read the same Snapshot.
    #[must_use]
    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.snapshot, &other.snapshot)
    }
}

impl fmt::Debug for Shadow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shadow")
            .field("pid", &self.pid())
            .field("tick", &self.tick())
            .field("value", self.value())
            .finish()
    }
}

/// Write view over one live Property.
///
/// Writes go to the staged next state; reads through
/// [`shadow`](Self::shadow) still see the last committed tick until
/// [`Store::flush`] runs.
///
/// # Example
///
/// ```rust
/// use umbra_shadow::Store;
/// use umbra_value::Value;
///
/// let mut store = Store::with_state(Value::record([("a", Value::record([("x", Value::from(1))]))]));
/// store.edit_root().child("a")?.set("x", 2)?;
/// store.flush();
///
/// assert_eq!(store.shadow().get("a").and_then(|a| a.get("x")).and_then(|x| x.as_i64()), Some(2));
/// # Ok::<(), umbra_shadow::ShadowError>(())
/// ```
pub struct ShadowMut<'s> {
    store: &'s mut Store,
    pid: PropertyId,
}

impl<'s> ShadowMut<'s> {
    pub(crate) fn new(store: &'s mut Store, pid: PropertyId) -> Self {
        Self { store, pid }
    }

    /// The Property being written.
    #[must_use]
    #[inline]
    pub fn pid(&self) -> PropertyId {
        self.pid
    }

    /// Committed view of the Property.
    pub fn shadow(&self) -> Result<Shadow, ShadowError> {
        self.store.lookup(self.pid)
    }

    /// Staged value, including writes not committed yet.
    #[must_use]
    pub fn staged(&self) -> Option<Value> {
        self.store.engine.staged_value(self.pid)
    }

    /// Applies `mutator` to the staged value.
    ///
    /// Returns whether anything was invalidated.
    pub fn update<F>(&mut self, mutator: F) -> Result<bool, ShadowError>
    where
        F: FnOnce(&mut Value) -> Mutation,
    {
        let changed = self.store.engine.update(self.pid, mutator)?;
        self.written(changed);
        Ok(changed)
    }

    /// Replaces the value; the subtree is rebuilt at the next tick.
    pub fn replace(&mut self, value: impl Into<Value>) -> Result<(), ShadowError> {
        let value = value.into();
        self.update(move |slot| {
            *slot = value;
            Mutation::Replace
        })?;
        Ok(())
    }

    /// Sets the child at `key`.
    pub fn set(&mut self, key: impl Into<Key>, value: impl Into<Value>) -> Result<(), ShadowError> {
        let changed = self
            .store
            .engine
            .set_child(self.pid, key.into(), value.into())?;
        self.written(changed);
        Ok(())
    }

    /// Removes the child at `key`, returning its staged value.
    pub fn remove(&mut self, key: impl Into<Key>) -> Result<Option<Value>, ShadowError> {
        let removed = self.store.engine.remove_child(self.pid, &key.into())?;
        self.written(removed.is_some());
        Ok(removed)
    }

    /// Write view over the mounted child at `key`.
    pub fn child(&mut self, key: impl Into<Key>) -> Result<ShadowMut<'_>, ShadowError> {
        let key = key.into();
        let path = self.store.engine.writable(self.pid)?;
        let child = self
            .store
            .engine
            .child_of(self.pid, &key)
            .ok_or(ShadowError::UnmountedChild { path, key })?;
        Ok(ShadowMut::new(&mut *self.store, child))
    }

    /// Appends an item to a sequence.
    pub fn push(&mut self, value: impl Into<Value>) -> Result<(), ShadowError> {
        let len = self.sequence_len()?;
        self.splice(len, 0, [value.into()])?;
        Ok(())
    }

    /// Removes the last item of a sequence.
    pub fn pop(&mut self) -> Result<Option<Value>, ShadowError> {
        let Some(last) = self.sequence_len()?.checked_sub(1) else {
            return Ok(None);
        };
        Ok(self.splice(last, 1, Vec::new())?.pop())
    }

    /// Inserts an item into a sequence, shifting later items up.
    pub fn insert(&mut self, index: usize, value: impl Into<Value>) -> Result<(), ShadowError> {
        self.splice(index, 0, [value.into()])?;
        Ok(())
    }

    /// Removes the item at `index` from a sequence.
    pub fn remove_at(&mut self, index: usize) -> Result<Value, ShadowError> {
        let len = self.sequence_len()?;
        if index >= len {
            return Err(ShadowError::IndexOutOfBounds { index, len });
        }
        self.splice(index, 1, Vec::new())?
            .pop()
            .ok_or(ShadowError::IndexOutOfBounds { index, len })
    }

    /// Replaces `delete` items starting at `index` with `items`, returning the
    /// removed items.
    ///
    /// Items after the edit keep their Property and, if untouched, their
    /// Snapshot.
    pub fn splice<I>(
        &mut self,
        index: usize,
        delete: usize,
        items: I,
    ) -> Result<Vec<Value>, ShadowError>
    where
        I: IntoIterator<Item = Value>,
    {
        let items: Vec<Value> = items.into_iter().collect();
        let inserted = items.len();
        let removed = self.store.engine.splice(self.pid, index, delete, items)?;
        self.written(inserted > 0 || !removed.is_empty());
        Ok(removed)
    }

    /// Empties a sequence or record.
    pub fn clear(&mut self) -> Result<(), ShadowError> {
        let staged = self.staged().unwrap_or_default();
        match staged.shape() {
            Shape::Sequence => {
                self.splice(0, staged.len(), Vec::new())?;
            }
            Shape::Record if !staged.is_empty() => {
                self.update(|slot| {
                    *slot = Value::empty_record();
                    Mutation::Changed
                })?;
            }
            Shape::Record => {}
            found => {
                return Err(ShadowError::WrongShape {
                    expected: Shape::Sequence,
                    found,
                });
            }
        }
        Ok(())
    }

    /// Calls a method registered on the schema.
    ///
    /// Read methods run on the committed view; bound methods run against this
    /// write view.
    pub fn call(&mut self, name: &str, args: &[Value]) -> Result<Value, ShadowError> {
        let method = self
            .store
            .engine
            .node(self.pid)?
            .schema
            .method(name)
            .cloned()
            .ok_or_else(|| ShadowError::UnknownMethod {
                name: String::from(name),
            })?;
        match method {
            Method::Read(method) => method(&self.shadow()?, args),
            Method::Bound(method) => method(self, args),
        }
    }

    /// Keyed write view of an isolated collection.
    pub fn isolated(&mut self) -> Result<IsolatedMut<'_>, ShadowError> {
        let node = self.store.engine.node(self.pid)?;
        if node.schema.strategy() != Strategy::Isolated {
            return Err(ShadowError::WrongShape {
                expected: Shape::Record,
                found: self.staged().map_or(Shape::Scalar, |value| value.shape()),
            });
        }
        Ok(IsolatedMut::new(&mut *self.store, self.pid))
    }

    fn sequence_len(&self) -> Result<usize, ShadowError> {
        let staged = self
            .staged()
            .ok_or(ShadowError::ObsoleteProperty { pid: self.pid })?;
        staged
            .as_sequence()
            .map(<[Value]>::len)
            .ok_or(ShadowError::WrongShape {
                expected: Shape::Sequence,
                found: staged.shape(),
            })
    }

    fn written(&mut self, changed: bool) {
        if changed {
            self.store.schedule();
        }
    }
}

impl fmt::Debug for ShadowMut<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShadowMut")
            .field("pid", &self.pid)
            .finish_non_exhaustive()
    }
}
