// Copyright 2025 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The commit pass.
//!
//! Runs once per tick, depth-first from the root, turning the staged future
//! value into the next Snapshot tree:
//!
//! - a valid position whose staged value is the committed one keeps its
//!   Snapshot (`Visit::Reused`);
//! - an invalid or value-changed position gets a fresh Snapshot and its
//!   children are reconciled in turn (`Visit::Updated`);
//! - a replaced position, or one whose schema kind no longer fits its value, is
//!   torn down (`Visit::Removed`) and rebuilt from scratch (`Visit::Created`).

use alloc::collections::BTreeMap;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::mem;

use log::{debug, trace, warn};
use umbra_value::{Key, Value};

use crate::engine::Engine;
use crate::id::PropertyId;
use crate::property::{Pending, PropertyNode, PropertyState};
use crate::schema::{NodeKind, Schema, SchemaRef, Strategy};
use crate::shader::Shader;
use crate::snapshot::{Snapshot, SnapshotChildren};

/// How the commit pass treated one position.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Visit {
    /// The committed Snapshot was kept.
    Reused,
    /// A fresh Snapshot replaced the committed one.
    Updated,
    /// A new Property was materialized.
    Created,
    /// The Property was torn down.
    Removed,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Touch {
    Created,
    Updated,
}

/// How a Property's children are reached by the pass.
#[derive(Copy, Clone, Debug)]
enum Rebuild {
    /// First Snapshot of a new Property.
    Fresh,
    /// An existing Property. `forced` skips the isolated dirty-key shortcut.
    Update { forced: bool },
}

/// Bookkeeping for one pass.
pub(crate) struct CommitCx<'t> {
    touched: Vec<(PropertyId, Touch)>,
    visit: &'t mut dyn FnMut(PropertyId, Visit),
}

impl<'t> CommitCx<'t> {
    pub(crate) fn new(visit: &'t mut dyn FnMut(PropertyId, Visit)) -> Self {
        Self {
            touched: Vec::new(),
            visit,
        }
    }

    fn record(&mut self, pid: PropertyId, visit: Visit) {
        trace!("{visit:?} {pid}");
        (self.visit)(pid, visit);
        match visit {
            Visit::Created => self.touched.push((pid, Touch::Created)),
            Visit::Updated => self.touched.push((pid, Touch::Updated)),
            Visit::Reused | Visit::Removed => {}
        }
    }

    pub(crate) fn into_touched(self) -> Vec<(PropertyId, Touch)> {
        self.touched
    }
}

impl Engine {
    /// Commits the staged future as the next tick.
    ///
    /// `visit` is called for every position the pass reaches. Returns the new
    /// root Snapshot.
    pub(crate) fn commit(&mut self, visit: &mut dyn FnMut(PropertyId, Visit)) -> Option<Rc<Snapshot>> {
        self.tick += 1;
        let root = self.root;
        let node = self.arena.get(root)?;
        let schema = node.schema.clone();
        let replaced = node.pending.replaced;
        if !node.pending.invalid && !replaced {
            // Only unchanged writes happened; their detached copies are dropped.
            self.discard_future();
            visit(root, Visit::Reused);
            debug!("tick {}: nothing to reconcile", self.tick);
            return self.root_snapshot().cloned();
        }

        self.notify_will_update(root);

        let next = match self.take_future() {
            Some(value) => value,
            None => self.root_snapshot()?.value().clone(),
        };
        let mut cx = CommitCx::new(visit);
        let snapshot = if replaced {
            self.teardown(root, &mut cx);
            let (pid, snapshot) = self.create_node(None, None, schema, next, &mut cx);
            self.root = pid;
            snapshot
        } else {
            self.commit_node(root, next, false, &mut cx)?
        };
        let touched = cx.into_touched();
        self.fire_did_hooks(&touched);
        debug!(
            "tick {}: reconciled {} position(s), {} live",
            self.tick,
            touched.len(),
            self.arena.len()
        );
        Some(snapshot)
    }

    /// `will_update` on every invalid Property, outermost first.
    fn notify_will_update(&self, pid: PropertyId) {
        let Some(node) = self.arena.get(pid) else {
            return;
        };
        if !node.pending.invalid || node.blocks_writes() {
            return;
        }
        self.fire(pid, |hook, cx| hook.will_update(cx));
        match &node.isolated {
            Some(record) => {
                for key in &record.dirty {
                    if let Some(&child) = node.children.get(key) {
                        self.notify_will_update(child);
                    }
                }
            }
            None => {
                for &child in node.children.values() {
                    self.notify_will_update(child);
                }
            }
        }
    }

    /// `did_shadow` / `did_update` root-first, once per Property per tick.
    pub(crate) fn fire_did_hooks(&mut self, touched: &[(PropertyId, Touch)]) {
        let tick = self.tick;
        for &(pid, touch) in touched {
            // Skips Properties created and torn down within the same pass.
            let Some(node) = self.arena.get_mut(pid) else {
                continue;
            };
            if node.did_tick == Some(tick) {
                continue;
            }
            node.did_tick = Some(tick);
            match touch {
                Touch::Created => self.fire(pid, |hook, cx| hook.did_shadow(cx)),
                Touch::Updated => self.fire(pid, |hook, cx| hook.did_update(cx)),
            }
        }
    }

    /// Reconciles an existing Property against its staged value.
    ///
    /// `forced` is set beneath a position written as a whole; isolated
    /// collections then revisit every entry instead of their dirty keys.
    fn commit_node(
        &mut self,
        pid: PropertyId,
        next: Value,
        forced: bool,
        cx: &mut CommitCx<'_>,
    ) -> Option<Rc<Snapshot>> {
        let node = self.arena.get(pid)?;
        let current = node.snapshot.clone()?;
        if is_reusable(node, &current, &next) {
            cx.record(pid, Visit::Reused);
            return Some(current);
        }
        cx.record(pid, Visit::Updated);
        let forced = forced || node.pending.direct;
        let schema = node.schema.clone();
        let mut value = next;
        let rebuild = Rebuild::Update { forced };
        let children = self.commit_children(pid, &schema, &mut value, rebuild, cx);
        let snapshot = Rc::new(Snapshot::new(
            self.next_serial(),
            pid,
            self.tick,
            value,
            schema,
            children,
        ));
        let node = self.arena.get_mut(pid)?;
        node.pending = Pending::default();
        node.state = PropertyState::Shadowed;
        if let Some(previous) = node.snapshot.replace(snapshot.clone()) {
            previous.retire();
        }
        Some(snapshot)
    }

    fn commit_children(
        &mut self,
        pid: PropertyId,
        schema: &Schema,
        value: &mut Value,
        rebuild: Rebuild,
        cx: &mut CommitCx<'_>,
    ) -> SnapshotChildren {
        if schema.kind() == NodeKind::Scalar {
            return SnapshotChildren::Leaf;
        }
        let forced = match rebuild {
            Rebuild::Fresh => false,
            Rebuild::Update { forced } => forced,
        };
        match (schema.strategy(), rebuild) {
            (Strategy::Full, _) => {
                SnapshotChildren::Owned(self.commit_keyed(pid, value, forced, cx))
            }
            (Strategy::Isolated, Rebuild::Fresh) => {
                let entries = Rc::new(RefCell::new(self.commit_keyed(pid, value, false, cx)));
                if let Some(record) = self
                    .arena
                    .get_mut(pid)
                    .and_then(|node| node.isolated.as_mut())
                {
                    record.entries = entries.clone();
                }
                SnapshotChildren::Shared(entries)
            }
            (Strategy::Isolated, Rebuild::Update { .. }) => {
                self.commit_isolated(pid, value, forced, cx)
            }
        }
    }

    /// Walks every child key of `value`, reusing, updating, mounting and
    /// tearing down children as needed.
    fn commit_keyed(
        &mut self,
        pid: PropertyId,
        value: &mut Value,
        forced: bool,
        cx: &mut CommitCx<'_>,
    ) -> BTreeMap<Key, Rc<Snapshot>> {
        let mut snapshots = BTreeMap::new();
        let Some(node) = self.arena.get_mut(pid) else {
            return snapshots;
        };
        let mut previous = mem::take(&mut node.children);
        let mut doomed = mem::take(&mut node.pending.orphans);
        node.pending.saved_children = None;

        previous.retain(|key, child| {
            let keep = value.get(key).is_some();
            if !keep {
                doomed.push(*child);
            }
            keep
        });
        for child in doomed {
            self.teardown(child, cx);
        }

        let mut children = BTreeMap::new();
        for key in value.keys() {
            let Some(child_value) = value.get(&key).cloned() else {
                continue;
            };
            let outcome = match previous.remove(&key) {
                Some(child) => self.reconcile_child(pid, child, &key, child_value, forced, cx),
                None => self.mount(pid, &key, child_value, cx),
            };
            if let Some((child, snapshot)) = outcome {
                sync_child(value, &key, &snapshot);
                children.insert(key.clone(), child);
                snapshots.insert(key, snapshot);
            }
        }
        if let Some(node) = self.arena.get_mut(pid) {
            node.children = children;
        }
        snapshots
    }

    /// Revisits only the keys written since the last tick, or every entry when
    /// the owner's value was written as a whole.
    fn commit_isolated(
        &mut self,
        pid: PropertyId,
        value: &mut Value,
        forced: bool,
        cx: &mut CommitCx<'_>,
    ) -> SnapshotChildren {
        let Some(node) = self.arena.get_mut(pid) else {
            return SnapshotChildren::Leaf;
        };
        let written_here = node.pending.invalid;
        let Some(record) = node.isolated.as_mut() else {
            return SnapshotChildren::Leaf;
        };
        let entries = record.entries.clone();
        let dirty = mem::take(&mut record.dirty);
        // A value change arriving from above bypasses the dirty keys.
        if forced || !written_here {
            trace!("isolated {pid}: revisiting every entry");
            let all = self.commit_keyed(pid, value, forced, cx);
            *entries.borrow_mut() = all;
            return SnapshotChildren::Shared(entries);
        }
        trace!("isolated {pid}: {} dirty key(s)", dirty.len());

        for key in dirty {
            let existing = self.child_of(pid, &key);
            let outcome = match (existing, value.get(&key).cloned()) {
                (Some(child), Some(child_value)) => {
                    self.reconcile_child(pid, child, &key, child_value, false, cx)
                }
                (Some(child), None) => {
                    self.teardown(child, cx);
                    None
                }
                (None, Some(child_value)) => self.mount(pid, &key, child_value, cx),
                (None, None) => None,
            };
            let Some(node) = self.arena.get_mut(pid) else {
                break;
            };
            match outcome {
                Some((child, snapshot)) => {
                    sync_child(value, &key, &snapshot);
                    node.children.insert(key.clone(), child);
                    entries.borrow_mut().insert(key, snapshot);
                }
                None => {
                    node.children.remove(&key);
                    entries.borrow_mut().remove(&key);
                }
            }
        }
        SnapshotChildren::Shared(entries)
    }

    /// Updates `child` in place when its kind still fits, otherwise remounts.
    fn reconcile_child(
        &mut self,
        parent: PropertyId,
        child: PropertyId,
        key: &Key,
        value: Value,
        forced: bool,
        cx: &mut CommitCx<'_>,
    ) -> Option<(PropertyId, Rc<Snapshot>)> {
        let in_place = self
            .arena
            .get(child)
            .is_some_and(|node| !node.pending.replaced && node.schema.kind().accepts(&value));
        if in_place {
            return Some((child, self.commit_node(child, value, forced, cx)?));
        }
        self.teardown(child, cx);
        self.mount(parent, key, value, cx)
    }

    /// Materializes a new child, if the parent's shader resolves a schema.
    fn mount(
        &mut self,
        parent: PropertyId,
        key: &Key,
        value: Value,
        cx: &mut CommitCx<'_>,
    ) -> Option<(PropertyId, Rc<Snapshot>)> {
        let node = self.arena.get(parent)?;
        let shader = Shader::new(&node.schema, &self.registry, self.is_auto_shadow(parent));
        let (schema, _) = shader.resolve(key, &value)?;
        Some(self.create_node(Some(parent), Some(key.clone()), schema, value, cx))
    }

    /// Allocates a Property and builds its first Snapshot, children included.
    pub(crate) fn create_node(
        &mut self,
        parent: Option<PropertyId>,
        key: Option<Key>,
        schema: SchemaRef,
        value: Value,
        cx: &mut CommitCx<'_>,
    ) -> (PropertyId, Rc<Snapshot>) {
        let serial = self.next_serial();
        let pid = self
            .arena
            .insert(PropertyNode::new(serial, parent, key, schema.clone()));
        cx.record(pid, Visit::Created);
        self.fire(pid, |hook, hcx| hook.will_shadow(hcx));

        let mut value = value;
        seed_defaults(&schema, &mut value);
        let children = self.commit_children(pid, &schema, &mut value, Rebuild::Fresh, cx);
        let snapshot = Rc::new(Snapshot::new(
            self.next_serial(),
            pid,
            self.tick,
            value,
            schema,
            children,
        ));
        if let Some(node) = self.arena.get_mut(pid) {
            node.snapshot = Some(snapshot.clone());
            node.state = PropertyState::Shadowed;
        }
        (pid, snapshot)
    }

    /// Tears `pid` and its subtree down, depth-first, and frees the slots.
    fn teardown(&mut self, pid: PropertyId, cx: &mut CommitCx<'_>) {
        let Some(node) = self.arena.get_mut(pid) else {
            return;
        };
        node.state = PropertyState::Unshadowing;
        self.fire(pid, |hook, hcx| hook.will_unshadow(hcx));

        let Some(node) = self.arena.get_mut(pid) else {
            return;
        };
        let mut doomed: Vec<PropertyId> = node.children.values().copied().collect();
        doomed.append(&mut node.pending.orphans);
        for child in doomed {
            self.teardown(child, cx);
        }

        if let Some(node) = self.arena.get_mut(pid) {
            node.state = PropertyState::Obsolete;
            if let Some(snapshot) = &node.snapshot {
                snapshot.retire();
            }
        }
        self.fire(pid, |hook, hcx| hook.did_unshadow(hcx));
        self.arena.remove(pid);
        cx.record(pid, Visit::Removed);
    }
}

/// A valid position whose staged value is the committed one.
///
/// Values that are equal but not shared come from paths detached by writes
/// that changed nothing; those are kept too.
fn is_reusable(node: &PropertyNode, current: &Snapshot, next: &Value) -> bool {
    !node.pending.invalid
        && !node.pending.replaced
        && (next.same(current.value()) || next == current.value())
}

/// Points the parent's value at the child's committed value so identities line
/// up for the next tick.
fn sync_child(value: &mut Value, key: &Key, snapshot: &Snapshot) {
    if value
        .get(key)
        .is_some_and(|held| !held.same(snapshot.value()))
    {
        if let Err(err) = value.insert(key.clone(), snapshot.value().clone()) {
            warn!("could not point `{key}` at its committed value: {err}");
        }
    }
}

/// Fills named children that carry an initial value and are missing.
fn seed_defaults(schema: &Schema, value: &mut Value) {
    if schema.kind() != NodeKind::Record {
        return;
    }
    for (key, child) in schema.children() {
        let Some(initial) = child.initial() else {
            continue;
        };
        if value.get(key).is_some() {
            continue;
        }
        if value.is_null() {
            *value = Value::empty_record();
        }
        if let Err(err) = value.insert(key.clone(), initial.clone()) {
            warn!("could not seed default for `{key}`: {err}");
        }
    }
}
