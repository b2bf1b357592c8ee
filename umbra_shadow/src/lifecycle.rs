// Copyright 2025 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Lifecycle mixins attached to schemas.

use core::fmt;

use umbra_value::{Key, Path, Value};

use crate::engine::Engine;
use crate::id::PropertyId;
use crate::property::PropertyState;
use crate::shadow::Shadow;

/// Lifecycle notifications for Properties shadowed by a schema.
///
/// Every method has a no-op default. Mixins attached to one schema run in
/// registration order.
///
/// Ordering within a tick:
///
/// - `will_update` runs before the commit pass on every invalid Property,
///   outermost first.
/// - `will_shadow` runs when a Property is first materialized, during the pass.
/// - `will_unshadow` / `did_unshadow` bracket the depth-first teardown of a
///   removed or replaced subtree, during the pass.
/// - `did_shadow` / `did_update` run after the pass, root first, at most once
///   per Property per tick.
/// - `child_invalidated` runs synchronously on every ancestor of a written
///   position, nearest first.
pub trait Lifecycle {
    /// The Property is about to get its first Snapshot.
    fn will_shadow(&self, _cx: &HookContext<'_>) {}

    /// The Property got its first Snapshot.
    fn did_shadow(&self, _cx: &HookContext<'_>) {}

    /// The Property is invalid and will be reconciled.
    fn will_update(&self, _cx: &HookContext<'_>) {}

    /// The Property got a fresh Snapshot.
    fn did_update(&self, _cx: &HookContext<'_>) {}

    /// The Property and its subtree are about to be torn down.
    fn will_unshadow(&self, _cx: &HookContext<'_>) {}

    /// The Property has been torn down; its id is obsolete from here on.
    fn did_unshadow(&self, _cx: &HookContext<'_>) {}

    /// A write at or beneath `child` invalidated this Property. `source` is the
    /// Property that was written.
    fn child_invalidated(&self, _cx: &HookContext<'_>, _child: PropertyId, _source: PropertyId) {}
}

/// Read-only view of the Property a lifecycle hook runs for.
pub struct HookContext<'a> {
    pub(crate) engine: &'a Engine,
    pub(crate) pid: PropertyId,
}

impl HookContext<'_> {
    /// The Property being notified.
    #[must_use]
    #[inline]
    pub fn pid(&self) -> PropertyId {
        self.pid
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> PropertyState {
        self.engine
            .arena
            .get(self.pid)
            .map_or(PropertyState::Obsolete, |node| node.state)
    }

    /// Key within the parent; `None` for the root.
    #[must_use]
    pub fn key(&self) -> Option<&Key> {
        self.engine.arena.get(self.pid)?.key.as_ref()
    }

    /// Path from the root.
    #[must_use]
    pub fn path(&self) -> Path {
        self.engine.path_of(self.pid).unwrap_or_default()
    }

    /// Raw value of the current Snapshot, once one exists.
    #[must_use]
    pub fn value(&self) -> Option<&Value> {
        Some(self.engine.snapshot_of(self.pid)?.value())
    }

    /// View over the current Snapshot, once one exists.
    #[must_use]
    pub fn shadow(&self) -> Option<Shadow> {
        self.engine.snapshot_of(self.pid).cloned().map(Shadow::new)
    }

    /// Tick being committed, or the last committed tick outside a flush.
    #[must_use]
    #[inline]
    pub fn tick(&self) -> u64 {
        self.engine.tick
    }
}

impl fmt::Debug for HookContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookContext")
            .field("pid", &self.pid)
            .field("state", &self.state())
            .field("tick", &self.engine.tick)
            .finish_non_exhaustive()
    }
}
