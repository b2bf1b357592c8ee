// Copyright 2025 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Properties: the persistent identity of tree positions.
//!
//! Properties live in a generational [`Arena`]. Each one owns the current
//! [`Snapshot`] of its position, the ids of its mounted children and the
//! per-tick pending state the write protocol accumulates until the next
//! commit.

use alloc::collections::{BTreeMap, BTreeSet};
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;

use umbra_value::Key;

use crate::id::PropertyId;
use crate::schema::{SchemaRef, Strategy};
use crate::snapshot::Snapshot;

/// Lifecycle state of a Property.
///
/// `Unshadowed → Shadowed → (Shadowed ⇄ InvalidPending) → Unshadowing →
/// Obsolete`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PropertyState {
    /// Allocated, first Snapshot not built yet.
    Unshadowed,
    /// Up to date with the last committed tick.
    Shadowed,
    /// A write at or beneath this position waits for the next commit.
    InvalidPending,
    /// Being torn down.
    Unshadowing,
    /// Torn down; the id no longer resolves.
    Obsolete,
}

/// Writes accumulated since the last commit.
#[derive(Debug, Default)]
pub(crate) struct Pending {
    /// A write happened at or beneath this position.
    pub(crate) invalid: bool,
    /// The position was wholly replaced; descendant writes are ignored.
    pub(crate) replaced: bool,
    /// The value here was written as a whole rather than through a child key.
    /// Isolated collections at or beneath it revisit every entry.
    pub(crate) direct: bool,
    /// Removed from its parent by a sequence splice; writes are ignored.
    pub(crate) detached: bool,
    /// Child map as of the last commit, saved before the first splice.
    pub(crate) saved_children: Option<BTreeMap<Key, PropertyId>>,
    /// Children detached by splices, torn down at commit.
    pub(crate) orphans: Vec<PropertyId>,
}

/// Side record of a node reconciled with the isolated strategy.
#[derive(Debug, Default)]
pub(crate) struct IsolatedRecord {
    /// Entry Snapshots, shared by every Snapshot of the owner.
    pub(crate) entries: Rc<RefCell<BTreeMap<Key, Rc<Snapshot>>>>,
    /// Keys written since the last commit.
    pub(crate) dirty: BTreeSet<Key>,
}

#[derive(Debug)]
pub(crate) struct PropertyNode {
    pub(crate) serial: u64,
    pub(crate) parent: Option<PropertyId>,
    pub(crate) key: Option<Key>,
    pub(crate) schema: SchemaRef,
    pub(crate) readonly: Option<bool>,
    pub(crate) auto_shadow: Option<bool>,
    pub(crate) state: PropertyState,
    pub(crate) snapshot: Option<Rc<Snapshot>>,
    pub(crate) children: BTreeMap<Key, PropertyId>,
    pub(crate) pending: Pending,
    pub(crate) isolated: Option<IsolatedRecord>,
    /// Last tick a `did_*` hook ran for this Property.
    pub(crate) did_tick: Option<u64>,
}

impl PropertyNode {
    pub(crate) fn new(
        serial: u64,
        parent: Option<PropertyId>,
        key: Option<Key>,
        schema: SchemaRef,
    ) -> Self {
        Self {
            serial,
            parent,
            key,
            readonly: schema.readonly(),
            auto_shadow: schema.auto_shadow(),
            isolated: (schema.strategy() == Strategy::Isolated)
                .then(IsolatedRecord::default),
            schema,
            state: PropertyState::Unshadowed,
            snapshot: None,
            children: BTreeMap::new(),
            pending: Pending::default(),
            did_tick: None,
        }
    }

    /// Writes here are dropped for the rest of the tick.
    #[inline]
    pub(crate) fn blocks_writes(&self) -> bool {
        self.pending.replaced || self.pending.detached
    }
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    node: Option<PropertyNode>,
}

/// Generational slot storage for Properties.
#[derive(Debug, Default)]
pub(crate) struct Arena {
    slots: Vec<Slot>,
    free: Vec<u32>,
    len: usize,
}

impl Arena {
    pub(crate) fn insert(&mut self, node: PropertyNode) -> PropertyId {
        self.len += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.generation = slot.generation.wrapping_add(1);
            slot.node = Some(node);
            return PropertyId::new(index, slot.generation);
        }
        #[expect(
            clippy::cast_possible_truncation,
            reason = "more than u32::MAX live properties is not supported"
        )]
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 1,
            node: Some(node),
        });
        PropertyId::new(index, 1)
    }

    pub(crate) fn remove(&mut self, id: PropertyId) -> Option<PropertyNode> {
        let slot = self.slots.get_mut(id.slot())?;
        if slot.generation != id.generation() {
            return None;
        }
        let node = slot.node.take()?;
        self.free.push(id.index());
        self.len -= 1;
        Some(node)
    }

    #[inline]
    pub(crate) fn get(&self, id: PropertyId) -> Option<&PropertyNode> {
        let slot = self.slots.get(id.slot())?;
        if slot.generation != id.generation() {
            return None;
        }
        slot.node.as_ref()
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, id: PropertyId) -> Option<&mut PropertyNode> {
        let slot = self.slots.get_mut(id.slot())?;
        if slot.generation != id.generation() {
            return None;
        }
        slot.node.as_mut()
    }

    #[inline]
    pub(crate) fn contains(&self, id: PropertyId) -> bool {
        self.get(id).is_some()
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// Iterates live Properties.
    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = (PropertyId, &mut PropertyNode)> {
        self.slots.iter_mut().enumerate().filter_map(|(index, slot)| {
            #[expect(
                clippy::cast_possible_truncation,
                reason = "slot count is bounded by u32 ids"
            )]
            let id = PropertyId::new(index as u32, slot.generation);
            slot.node.as_mut().map(|node| (id, node))
        })
    }
}

/// Walks from `start` up the parent chain, returning the first explicit flag
/// `pick` finds.
pub(crate) fn walk_inherited<F>(arena: &Arena, start: Option<PropertyId>, pick: F) -> Option<bool>
where
    F: Fn(&PropertyNode) -> Option<bool>,
{
    let mut current = start;
    while let Some(id) = current {
        let node = arena.get(id)?;
        if let Some(flag) = pick(node) {
            return Some(flag);
        }
        current = node.parent;
    }
    None
}
