// Copyright 2025 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Offline persistence of committed state.
//!
//! An [`OfflineListener`] writes every committed root value to an
//! [`OfflineStorage`]; [`Store::restore_offline`](crate::Store::restore_offline)
//! reads it back into a fresh store.

use alloc::rc::Rc;
use core::cell::RefCell;

use log::debug;
use umbra_value::Value;

use crate::listener::Listener;
use crate::shadow::Shadow;

/// Where offline state lives.
pub trait OfflineStorage {
    /// Last persisted state, if any.
    fn get_offline_data(&self) -> Option<Value>;

    /// Persists `state`.
    fn set_offline_data(&mut self, state: Value);

    /// Drops any backups kept of earlier states.
    fn delete_backups(&mut self);
}

impl<S: OfflineStorage + ?Sized> OfflineStorage for Rc<RefCell<S>> {
    fn get_offline_data(&self) -> Option<Value> {
        self.borrow().get_offline_data()
    }

    fn set_offline_data(&mut self, state: Value) {
        self.borrow_mut().set_offline_data(state);
    }

    fn delete_backups(&mut self) {
        self.borrow_mut().delete_backups();
    }
}

/// In-memory [`OfflineStorage`] keeping the current state and one backup.
#[derive(Clone, Debug, Default)]
pub struct MemoryStorage {
    current: Option<Value>,
    backup: Option<Value>,
}

impl MemoryStorage {
    /// Creates an empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The state persisted before the current one.
    #[must_use]
    pub fn backup(&self) -> Option<&Value> {
        self.backup.as_ref()
    }
}

impl OfflineStorage for MemoryStorage {
    fn get_offline_data(&self) -> Option<Value> {
        self.current.clone()
    }

    fn set_offline_data(&mut self, state: Value) {
        self.backup = self.current.replace(state);
    }

    fn delete_backups(&mut self) {
        self.backup = None;
    }
}

/// Persists the root value after every committed tick.
///
/// A tick that replaced the whole tree with
/// [`Store::change_state`](crate::Store::change_state) also drops the storage's
/// backups, since they belong to the previous tree.
///
/// # Example
///
/// ```rust
/// use std::cell::RefCell;
/// use std::rc::Rc;
///
/// use umbra_shadow::{MemoryStorage, OfflineListener, OfflineStorage, Store};
/// use umbra_value::Value;
///
/// let storage = Rc::new(RefCell::new(MemoryStorage::new()));
/// let mut store = Store::with_state(Value::empty_record());
/// store.add_listener(OfflineListener::new(storage.clone()));
///
/// store.edit_root().set("theme", "dark")?;
/// store.flush();
///
/// let mut restored = Store::with_state(Value::empty_record());
/// assert!(restored.restore_offline(&storage));
/// restored.flush();
/// assert_eq!(restored.state(), storage.get_offline_data().unwrap());
/// # Ok::<(), umbra_shadow::ShadowError>(())
/// ```
#[derive(Debug)]
pub struct OfflineListener<S> {
    storage: S,
}

impl<S: OfflineStorage> OfflineListener<S> {
    /// Persists into `storage`.
    #[must_use]
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// The wrapped storage.
    #[must_use]
    pub fn storage(&self) -> &S {
        &self.storage
    }
}

impl<S: OfflineStorage> Listener for OfflineListener<S> {
    fn on_post_update(&mut self, root: &Shadow, _previous: Option<&Shadow>) {
        debug!("persisting tick {}", root.tick());
        self.storage.set_offline_data(root.value().clone());
    }

    fn on_post_state_update(&mut self, _root: &Shadow) {
        self.storage.delete_backups();
    }
}
