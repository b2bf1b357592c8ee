// Copyright 2025 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The write protocol.
//!
//! Writes never touch committed Snapshots. The first write of a tick stages a
//! future root value from the committed one; every write then edits that
//! future in place, detaching each level on its path once, and invalidates the
//! written Property and all of its ancestors. The commit pass (see
//! `reconcile.rs`) turns the future into the next Snapshot tree.

use alloc::rc::Rc;
use alloc::vec::Vec;
use core::mem;

use log::debug;
use smallvec::SmallVec;
use umbra_value::{Key, Path, Shape, Value};

use crate::error::ShadowError;
use crate::id::PropertyId;
use crate::lifecycle::{HookContext, Lifecycle};
use crate::property::{Arena, Pending, PropertyNode, PropertyState, walk_inherited};
use crate::reconcile::{CommitCx, Visit};
use crate::registry::SchemaRegistry;
use crate::schema::SchemaRef;
use crate::shader::Shader;
use crate::snapshot::Snapshot;

/// What a mutator did to the staged value it was handed.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Mutation {
    /// Nothing changed. The position is still invalidated if the value's
    /// identity changed anyway.
    Unchanged,
    /// The value changed; children are diffed at commit.
    Changed,
    /// The value was wholly replaced; the subtree is rebuilt at commit and
    /// descendant writes are ignored for the rest of the tick.
    Replace,
}

pub(crate) struct Engine {
    pub(crate) arena: Arena,
    pub(crate) registry: SchemaRegistry,
    pub(crate) root: PropertyId,
    pub(crate) tick: u64,
    next_serial: u64,
    /// Staged next root value, created by the first write of a tick.
    future: Option<Value>,
}

impl Engine {
    /// Shadows `value` with `schema` as tick 0, returning the root Snapshot.
    pub(crate) fn new(
        registry: SchemaRegistry,
        schema: SchemaRef,
        value: Value,
    ) -> (Self, Rc<Snapshot>) {
        let mut engine = Self {
            arena: Arena::default(),
            registry,
            root: PropertyId::new(0, 0),
            tick: 0,
            next_serial: 0,
            future: None,
        };
        let mut ignore = |_: PropertyId, _: Visit| {};
        let mut cx = CommitCx::new(&mut ignore);
        let (root, snapshot) = engine.create_node(None, None, schema, value, &mut cx);
        engine.root = root;
        let touched = cx.into_touched();
        engine.fire_did_hooks(&touched);
        debug!("shadowed initial state: {} position(s)", engine.arena.len());
        (engine, snapshot)
    }

    pub(crate) fn next_serial(&mut self) -> u64 {
        self.next_serial += 1;
        self.next_serial
    }

    /// Runs `call` for every lifecycle mixin of `pid`'s schema.
    pub(crate) fn fire<F>(&self, pid: PropertyId, call: F)
    where
        F: Fn(&dyn Lifecycle, &HookContext<'_>),
    {
        let Some(node) = self.arena.get(pid) else {
            return;
        };
        let cx = HookContext { engine: self, pid };
        for hook in node.schema.hooks() {
            call(hook.as_ref(), &cx);
        }
    }

    pub(crate) fn node(&self, pid: PropertyId) -> Result<&PropertyNode, ShadowError> {
        self.arena
            .get(pid)
            .filter(|node| {
                !matches!(
                    node.state,
                    PropertyState::Unshadowing | PropertyState::Obsolete
                )
            })
            .ok_or(ShadowError::ObsoleteProperty { pid })
    }

    pub(crate) fn snapshot_of(&self, pid: PropertyId) -> Option<&Rc<Snapshot>> {
        self.arena.get(pid)?.snapshot.as_ref()
    }

    pub(crate) fn root_snapshot(&self) -> Option<&Rc<Snapshot>> {
        self.snapshot_of(self.root)
    }

    /// Path from the root, following the keys as staged this tick.
    pub(crate) fn path_of(&self, pid: PropertyId) -> Option<Path> {
        let mut keys: SmallVec<[Key; 8]> = SmallVec::new();
        let mut current = pid;
        loop {
            let node = self.arena.get(current)?;
            match (node.parent, &node.key) {
                (Some(parent), Some(key)) => {
                    keys.push(key.clone());
                    current = parent;
                }
                _ => break,
            }
        }
        Some(keys.into_iter().rev().collect())
    }

    pub(crate) fn is_readonly(&self, pid: PropertyId) -> bool {
        walk_inherited(&self.arena, Some(pid), |node| node.readonly).unwrap_or(false)
    }

    pub(crate) fn is_auto_shadow(&self, pid: PropertyId) -> bool {
        walk_inherited(&self.arena, Some(pid), |node| node.auto_shadow).unwrap_or(true)
    }

    /// Returns `true` if a write to `pid` must be dropped this tick.
    fn is_blocked(&self, pid: PropertyId) -> bool {
        let Some(node) = self.arena.get(pid) else {
            return false;
        };
        if node.pending.detached {
            return true;
        }
        let mut current = node.parent;
        while let Some(id) = current {
            let Some(ancestor) = self.arena.get(id) else {
                break;
            };
            if ancestor.blocks_writes() {
                return true;
            }
            current = ancestor.parent;
        }
        false
    }

    /// Checks that `pid` is live and writable, returning its path.
    pub(crate) fn writable(&self, pid: PropertyId) -> Result<Path, ShadowError> {
        self.node(pid)?;
        let path = self
            .path_of(pid)
            .ok_or(ShadowError::ObsoleteProperty { pid })?;
        if self.is_readonly(pid) {
            return Err(ShadowError::ReadOnly { path });
        }
        Ok(path)
    }

    /// The staged value at `pid`, or its committed value before any write.
    pub(crate) fn staged_value(&self, pid: PropertyId) -> Option<Value> {
        match &self.future {
            Some(future) => future.pointer(&self.path_of(pid)?).cloned(),
            None => self.snapshot_of(pid).map(|s| s.value().clone()),
        }
    }

    /// The staged root value, if any write happened this tick.
    pub(crate) fn staged_root(&self) -> Option<&Value> {
        self.future.as_ref()
    }

    /// Applies `mutator` to the staged value of `pid`.
    ///
    /// Returns whether the write invalidated anything. Writes beneath a
    /// position replaced this tick are dropped and return `Ok(false)`.
    pub(crate) fn update<F>(&mut self, pid: PropertyId, mutator: F) -> Result<bool, ShadowError>
    where
        F: FnOnce(&mut Value) -> Mutation,
    {
        let path = self.writable(pid)?;
        let changed = self.stage(pid, &path, mutator)?;
        if changed {
            self.mark_direct(pid);
        }
        Ok(changed)
    }

    pub(crate) fn take_future(&mut self) -> Option<Value> {
        self.future.take()
    }

    pub(crate) fn discard_future(&mut self) {
        self.future = None;
    }

    /// Stages a new root value, bypassing read-only flags.
    pub(crate) fn stage_root(&mut self, value: Value, mutation: Mutation) {
        let root = self.root;
        self.future = Some(value);
        self.invalidate(root, mutation == Mutation::Replace);
        self.mark_direct(root);
    }

    /// A write not routed through a key. Dirty keys no longer describe what
    /// changed beneath `pid`.
    fn mark_direct(&mut self, pid: PropertyId) {
        if let Some(node) = self.arena.get_mut(pid) {
            node.pending.direct = true;
        }
    }

    pub(crate) fn stage<F>(
        &mut self,
        pid: PropertyId,
        path: &Path,
        mutator: F,
    ) -> Result<bool, ShadowError>
    where
        F: FnOnce(&mut Value) -> Mutation,
    {
        if self.is_blocked(pid) {
            debug!("ignoring write to `{path}`: it was replaced or removed this tick");
            return Ok(false);
        }
        if self.future.is_none() {
            self.future = self.root_snapshot().map(|s| s.value().clone());
        }
        let target = self
            .future
            .as_mut()
            .and_then(|future| future.pointer_mut(path))
            .ok_or_else(|| ShadowError::MissingParentValue { path: path.clone() })?;
        let before = target.identity();
        let mutation = mutator(target);
        if mutation == Mutation::Unchanged && target.identity() == before {
            return Ok(false);
        }
        self.invalidate(pid, mutation == Mutation::Replace);
        Ok(true)
    }

    /// Marks `pid` invalid and walks to the root, notifying every ancestor.
    fn invalidate(&mut self, pid: PropertyId, replace: bool) {
        if let Some(node) = self.arena.get_mut(pid) {
            node.pending.invalid = true;
            node.pending.replaced |= replace;
            if node.state == PropertyState::Shadowed {
                node.state = PropertyState::InvalidPending;
            }
        }
        let mut child = pid;
        while let Some((parent, key)) = self
            .arena
            .get(child)
            .and_then(|node| Some((node.parent?, node.key.clone()?)))
        {
            if let Some(node) = self.arena.get_mut(parent) {
                node.pending.invalid = true;
                if node.state == PropertyState::Shadowed {
                    node.state = PropertyState::InvalidPending;
                }
                if let Some(record) = &mut node.isolated {
                    record.dirty.insert(key);
                }
            }
            self.fire(parent, |hook, cx| hook.child_invalidated(cx, child, pid));
            child = parent;
        }
    }

    /// Records `key` as written on an isolated owner.
    pub(crate) fn mark_dirty(&mut self, owner: PropertyId, key: Key) {
        if let Some(record) = self
            .arena
            .get_mut(owner)
            .and_then(|node| node.isolated.as_mut())
        {
            record.dirty.insert(key);
        }
    }

    /// Mounted child id at `key`.
    pub(crate) fn child_of(&self, pid: PropertyId, key: &Key) -> Option<PropertyId> {
        self.arena.get(pid)?.children.get(key).copied()
    }

    /// Fails with [`ShadowError::UnmountedChild`] if no schema would shadow
    /// `value` at `key`.
    fn check_mountable(
        &self,
        pid: PropertyId,
        path: &Path,
        key: &Key,
        value: &Value,
    ) -> Result<(), ShadowError> {
        let node = self.node(pid)?;
        let shader = Shader::new(&node.schema, &self.registry, self.is_auto_shadow(pid));
        if shader.resolve(key, value).is_none() {
            return Err(ShadowError::UnmountedChild {
                path: path.clone(),
                key: key.clone(),
            });
        }
        Ok(())
    }

    /// Sets the child at `key`.
    ///
    /// A mounted child is written through its own Property: scalars change in
    /// place, compounds replace the child's subtree. Otherwise the child is
    /// added to the parent's value.
    pub(crate) fn set_child(
        &mut self,
        pid: PropertyId,
        key: Key,
        value: Value,
    ) -> Result<bool, ShadowError> {
        if let Some(child) = self.child_of(pid, &key) {
            let replace = value.shape() != Shape::Scalar;
            return self.update(child, move |slot| {
                *slot = value;
                if replace {
                    Mutation::Replace
                } else {
                    Mutation::Changed
                }
            });
        }
        let path = self.writable(pid)?;
        self.check_mountable(pid, &path, &key, &value)?;
        let mut failure = None;
        let changed = self.stage(pid, &path, |slot| {
            match slot.insert(key.clone(), value) {
                Ok(_) => Mutation::Changed,
                Err(err) => {
                    failure = Some(err);
                    Mutation::Unchanged
                }
            }
        })?;
        if let Some(err) = failure {
            return Err(err.into());
        }
        if changed {
            self.mark_dirty(pid, key);
        }
        Ok(changed)
    }

    /// Removes the child at `key`. Sequence items after it shift down.
    pub(crate) fn remove_child(
        &mut self,
        pid: PropertyId,
        key: &Key,
    ) -> Result<Option<Value>, ShadowError> {
        if let Key::Index(index) = *key {
            let removed = self.splice(pid, index, 1, Vec::new())?;
            return Ok(removed.into_iter().next());
        }
        let path = self.writable(pid)?;
        let mut outcome = Ok(None);
        let changed = self.stage(pid, &path, |slot| {
            outcome = slot.remove(key);
            match outcome {
                Ok(Some(_)) => Mutation::Changed,
                _ => Mutation::Unchanged,
            }
        })?;
        let removed = outcome?;
        if changed {
            self.mark_dirty(pid, key.clone());
        }
        Ok(removed)
    }

    /// Replaces `delete` items of the sequence at `pid` starting at `index`.
    ///
    /// Mounted items after the edit are re-keyed immediately, so they keep
    /// their Property (and, if untouched, their Snapshot) across the move.
    pub(crate) fn splice(
        &mut self,
        pid: PropertyId,
        index: usize,
        delete: usize,
        items: Vec<Value>,
    ) -> Result<Vec<Value>, ShadowError> {
        let path = self.writable(pid)?;
        let inserted = items.len();
        let mut outcome = Ok(Vec::new());
        let changed = self.stage(pid, &path, |slot| {
            outcome = slot.splice(index, delete, items);
            match &outcome {
                Ok(removed) if removed.is_empty() && inserted == 0 => Mutation::Unchanged,
                Ok(_) => Mutation::Changed,
                Err(_) => Mutation::Unchanged,
            }
        })?;
        let removed = outcome?;
        if changed {
            self.rekey(pid, index, removed.len(), inserted);
            self.mark_direct(pid);
        }
        Ok(removed)
    }

    /// Shifts mounted sequence children after a splice and detaches the ones
    /// that were cut out.
    fn rekey(&mut self, pid: PropertyId, index: usize, removed: usize, inserted: usize) {
        let Some(node) = self.arena.get_mut(pid) else {
            return;
        };
        if node.pending.saved_children.is_none() {
            node.pending.saved_children = Some(node.children.clone());
        }
        let mut detached = Vec::new();
        let mut moved = Vec::new();
        for (key, child) in mem::take(&mut node.children) {
            let next = match key {
                Key::Index(i) if i >= index + removed => Key::Index(i - removed + inserted),
                Key::Index(i) if i >= index => {
                    detached.push(child);
                    continue;
                }
                key => key,
            };
            moved.push((child, next.clone()));
            node.children.insert(next, child);
        }
        node.pending.orphans.extend(detached.iter().copied());
        for (child, key) in moved {
            if let Some(node) = self.arena.get_mut(child) {
                node.key = Some(key);
            }
        }
        for child in detached {
            if let Some(node) = self.arena.get_mut(child) {
                node.pending.detached = true;
            }
        }
    }

    /// Drops everything staged since the last commit.
    pub(crate) fn discard_pending(&mut self) {
        self.discard_future();
        let mut restored = Vec::new();
        for (_, node) in self.arena.iter_mut() {
            if let Some(saved) = node.pending.saved_children.take() {
                restored.extend(saved.iter().map(|(key, child)| (key.clone(), *child)));
                node.children = saved;
            }
            node.pending = Pending::default();
            if let Some(record) = &mut node.isolated {
                record.dirty.clear();
            }
            if node.state == PropertyState::InvalidPending {
                node.state = PropertyState::Shadowed;
            }
        }
        for (key, child) in restored {
            if let Some(node) = self.arena.get_mut(child) {
                node.key = Some(key);
            }
        }
    }

    /// Keys of the staged value at `pid`.
    pub(crate) fn staged_keys(&self, pid: PropertyId) -> Vec<Key> {
        self.staged_value(pid)
            .map(|value| value.keys())
            .unwrap_or_default()
    }
}
