// Copyright 2025 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Immutable per-tick records of one position.

use alloc::collections::BTreeMap;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::{Cell, OnceCell, RefCell};
use core::fmt;

use umbra_value::{Key, Value};

use crate::id::PropertyId;
use crate::schema::SchemaRef;

pub(crate) type SharedEntries = Rc<RefCell<BTreeMap<Key, Rc<Snapshot>>>>;

/// Child Snapshots of a Snapshot.
pub(crate) enum SnapshotChildren {
    Leaf,
    /// Owned by this Snapshot alone.
    Owned(BTreeMap<Key, Rc<Snapshot>>),
    /// Shared with every other Snapshot of an isolated owner.
    Shared(SharedEntries),
}

/// One position's state as committed by one tick.
///
/// The raw value and the child links never change once built. A Snapshot is
/// retired (made inactive) when a later tick installs its replacement.
pub struct Snapshot {
    serial: u64,
    property: PropertyId,
    tick: u64,
    value: Value,
    schema: SchemaRef,
    children: SnapshotChildren,
    keys: OnceCell<Vec<Key>>,
    active: Cell<bool>,
}

impl Snapshot {
    pub(crate) fn new(
        serial: u64,
        property: PropertyId,
        tick: u64,
        value: Value,
        schema: SchemaRef,
        children: SnapshotChildren,
    ) -> Self {
        Self {
            serial,
            property,
            tick,
            value,
            schema,
            children,
            keys: OnceCell::new(),
            active: Cell::new(true),
        }
    }

    /// Unique serial number.
    #[must_use]
    #[inline]
    pub fn serial(&self) -> u64 {
        self.serial
    }

    /// Property this Snapshot belongs to.
    #[must_use]
    #[inline]
    pub fn property(&self) -> PropertyId {
        self.property
    }

    /// Tick that built this Snapshot.
    #[must_use]
    #[inline]
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Raw value.
    #[must_use]
    #[inline]
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Schema the position was shadowed with.
    #[must_use]
    #[inline]
    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    /// `false` once a newer Snapshot replaced this one.
    #[must_use]
    #[inline]
    pub fn is_active(&self) -> bool {
        self.active.get()
    }

    pub(crate) fn retire(&self) {
        self.active.set(false);
    }

    /// Mounted child at `key`.
    pub(crate) fn child(&self, key: &Key) -> Option<Rc<Self>> {
        match &self.children {
            SnapshotChildren::Leaf => None,
            SnapshotChildren::Owned(map) => map.get(key).cloned(),
            SnapshotChildren::Shared(entries) => entries.borrow().get(key).cloned(),
        }
    }

    /// Keys of mounted children, in enumeration order.
    pub(crate) fn child_keys(&self) -> Vec<Key> {
        match &self.children {
            SnapshotChildren::Leaf => Vec::new(),
            SnapshotChildren::Owned(map) => {
                self.keys.get_or_init(|| map.keys().cloned().collect()).clone()
            }
            SnapshotChildren::Shared(entries) => entries.borrow().keys().cloned().collect(),
        }
    }

    /// Number of mounted children.
    pub(crate) fn child_count(&self) -> usize {
        match &self.children {
            SnapshotChildren::Leaf => 0,
            SnapshotChildren::Owned(map) => map.len(),
            SnapshotChildren::Shared(entries) => entries.borrow().len(),
        }
    }
}

impl fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snapshot")
            .field("serial", &self.serial)
            .field("property", &self.property)
            .field("tick", &self.tick)
            .field("value", &self.value)
            .field("schema", &self.schema.label())
            .field("children", &self.child_count())
            .field("active", &self.active.get())
            .finish_non_exhaustive()
    }
}
