// Copyright 2025 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Engine-level access to one Property.

use alloc::format;
use alloc::string::String;
use core::fmt;

use umbra_value::{Key, Path, Value};

use crate::engine::Mutation;
use crate::error::ShadowError;
use crate::id::PropertyId;
use crate::property::PropertyState;
use crate::shadow::Shadow;
use crate::store::Store;

/// Saved raw value of one Property, see [`Access::checkpoint`].
#[derive(Clone, Debug, PartialEq)]
pub struct Checkpoint {
    pid: PropertyId,
    value: Value,
}

impl Checkpoint {
    /// Property the checkpoint was taken from.
    #[must_use]
    pub fn pid(&self) -> PropertyId {
        self.pid
    }

    /// Saved value.
    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }
}

/// Internals of one Property: lifecycle state, paths, flags and
/// checkpoints.
///
/// Obtained from [`Store::access`].
///
/// # Example
///
/// ```rust
/// use umbra_shadow::Store;
/// use umbra_value::Value;
///
/// let mut store = Store::with_state(Value::record([("a", Value::record([("x", Value::from(1))]))]));
/// let x = store.shadow().get("a").and_then(|a| a.get("x")).unwrap();
///
/// let access = store.access(&x);
/// assert_eq!(access.dotted_path()?, "a.x");
/// let saved = access.checkpoint()?;
///
/// store.edit_root().child("a")?.set("x", 5)?;
/// store.flush();
/// store.access(&x).rollback(&saved)?;
/// store.flush();
/// assert_eq!(store.state().pointer(&"a.x".parse().unwrap()), Some(&Value::from(1)));
/// # Ok::<(), umbra_shadow::ShadowError>(())
/// ```
pub struct Access<'s> {
    store: &'s mut Store,
    pid: PropertyId,
}

impl<'s> Access<'s> {
    pub(crate) fn new(store: &'s mut Store, pid: PropertyId) -> Self {
        Self { store, pid }
    }

    /// The Property.
    #[must_use]
    #[inline]
    pub fn pid(&self) -> PropertyId {
        self.pid
    }

    /// Serial number assigned when the Property was created.
    pub fn serial(&self) -> Result<u64, ShadowError> {
        Ok(self.store.engine.node(self.pid)?.serial)
    }

    /// Lifecycle state; [`PropertyState::Obsolete`] once the id is stale.
    #[must_use]
    pub fn state(&self) -> PropertyState {
        self.store
            .engine
            .arena
            .get(self.pid)
            .map_or(PropertyState::Obsolete, |node| node.state)
    }

    /// Key within the parent; `None` for the root.
    pub fn key(&self) -> Result<Option<Key>, ShadowError> {
        Ok(self.store.engine.node(self.pid)?.key.clone())
    }

    /// Parent Property; `None` for the root.
    pub fn parent(&self) -> Result<Option<PropertyId>, ShadowError> {
        Ok(self.store.engine.node(self.pid)?.parent)
    }

    /// Committed raw value.
    pub fn raw(&self) -> Result<Value, ShadowError> {
        Ok(self.store.lookup(self.pid)?.value().clone())
    }

    /// Staged raw value, including writes not committed yet.
    #[must_use]
    pub fn staged(&self) -> Option<Value> {
        self.store.engine.staged_value(self.pid)
    }

    /// Path from the root.
    pub fn path(&self) -> Result<Path, ShadowError> {
        self.store.engine.node(self.pid)?;
        self.store
            .engine
            .path_of(self.pid)
            .ok_or(ShadowError::ObsoleteProperty { pid: self.pid })
    }

    /// Path in dotted form, `""` for the root.
    pub fn dotted_path(&self) -> Result<String, ShadowError> {
        Ok(self.path()?.dotted())
    }

    /// Path in slash form, `"/"` for the root.
    pub fn slash_path(&self) -> Result<String, ShadowError> {
        Ok(self.path()?.slash())
    }

    /// Saves the committed raw value.
    pub fn checkpoint(&self) -> Result<Checkpoint, ShadowError> {
        Ok(Checkpoint {
            pid: self.pid,
            value: self.raw()?,
        })
    }

    /// Stages the value saved by `checkpoint`.
    ///
    /// Fails with [`ShadowError::IdentityConflict`] if the checkpoint was taken
    /// from another Property.
    pub fn rollback(&mut self, checkpoint: &Checkpoint) -> Result<(), ShadowError> {
        if checkpoint.pid != self.pid {
            return Err(ShadowError::IdentityConflict {
                message: format!(
                    "checkpoint of {} cannot roll back {}",
                    checkpoint.pid, self.pid
                ),
            });
        }
        let value = checkpoint.value.clone();
        let changed = self.store.engine.update(self.pid, move |slot| {
            *slot = value;
            Mutation::Changed
        })?;
        if changed {
            self.store.schedule();
        }
        Ok(())
    }

    /// Runs `callback` after the next completed tick.
    pub fn wait_for<F>(&mut self, callback: F)
    where
        F: FnOnce(&mut Store) + 'static,
    {
        self.store.wait_for(callback);
    }

    /// Committed view of any live Property.
    pub fn lookup(&self, pid: PropertyId) -> Result<Shadow, ShadowError> {
        self.store.lookup(pid)
    }

    /// Effective read-only flag.
    #[must_use]
    pub fn is_readonly(&self) -> bool {
        self.store.engine.is_readonly(self.pid)
    }

    /// Effective auto-shadow flag.
    #[must_use]
    pub fn is_auto_shadow(&self) -> bool {
        self.store.engine.is_auto_shadow(self.pid)
    }

    /// Sets or clears (`None`) the explicit read-only flag. Descendants without
    /// their own flag inherit it.
    pub fn set_readonly(&mut self, readonly: Option<bool>) -> Result<(), ShadowError> {
        self.store.engine.node(self.pid)?;
        if let Some(node) = self.store.engine.arena.get_mut(self.pid) {
            node.readonly = readonly;
        }
        Ok(())
    }

    /// Sets or clears (`None`) the explicit auto-shadow flag. Takes effect
    /// for children mounted from the next tick on.
    pub fn set_auto_shadow(&mut self, auto_shadow: Option<bool>) -> Result<(), ShadowError> {
        self.store.engine.node(self.pid)?;
        if let Some(node) = self.store.engine.arena.get_mut(self.pid) {
            node.auto_shadow = auto_shadow;
        }
        Ok(())
    }
}

impl fmt::Debug for Access<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Access")
            .field("pid", &self.pid)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
