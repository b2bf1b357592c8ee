// Copyright 2025 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The store: owner of the shadowed tree and its tick loop.

use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::string::ToString;
use alloc::vec::Vec;
use core::fmt;
use core::mem;

use log::debug;
use umbra_value::Value;

use crate::access::Access;
use crate::config::StoreConfig;
use crate::engine::{Engine, Mutation};
use crate::error::ShadowError;
use crate::id::{ListenerId, PropertyId, SubscriptionId};
use crate::listener::Listener;
use crate::offline::OfflineStorage;
use crate::reconcile::Visit;
use crate::registry::SchemaRegistry;
use crate::scheduler::{ActionError, Scheduler};
use crate::shadow::{Shadow, ShadowMut};
use crate::snapshot::Snapshot;

type Subscriber = Box<dyn FnMut(&Store, &Shadow, Option<&Shadow>)>;

/// Result of [`Store::flush`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FlushOutcome {
    /// No tick was scheduled.
    Idle,
    /// Tick `tick` committed.
    Committed {
        /// The committed tick.
        tick: u64,
    },
    /// The tick was aborted and its pending writes discarded.
    Aborted {
        /// Why.
        error: ShadowError,
    },
}

/// Owns a shadowed state tree and runs its ticks.
///
/// Writes through [`edit`](Self::edit), [`edit_root`](Self::edit_root),
/// [`change_state`](Self::change_state) and
/// [`dispatch_update`](Self::dispatch_update) are staged and schedule a tick.
/// The host runs the tick by calling [`flush`](Self::flush), typically from
/// its task queue after the [waker](Self::set_waker) fired.
///
/// A flush runs, in order: `on_pre_update` listeners, the queued action,
/// `on_pre_state_update` listeners after [`change_state`](Self::change_state),
/// `will_update` hooks, the commit pass, `did_shadow`/`did_update` hooks,
/// `on_post_update` listeners, [`wait_for`](Self::wait_for) callbacks and
/// finally subscribers.
///
/// # Example
///
/// ```rust
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// use umbra_shadow::{FlushOutcome, Store};
/// use umbra_value::Value;
///
/// let mut store = Store::with_state(Value::record([("count", Value::from(0))]));
/// let seen = Rc::new(Cell::new(0));
/// store.subscribe({
///     let seen = seen.clone();
///     move |_, root, _| seen.set(root.get("count").and_then(|c| c.as_i64()).unwrap_or(-1))
/// });
///
/// store.dispatch_update(|store| {
///     store.edit_root().set("count", 1)?;
///     Ok(None)
/// })?;
/// assert!(store.is_scheduled());
/// assert_eq!(store.flush(), FlushOutcome::Committed { tick: 1 });
/// assert_eq!(seen.get(), 1);
/// assert_eq!(store.flush(), FlushOutcome::Idle);
/// # Ok::<(), umbra_shadow::ShadowError>(())
/// ```
pub struct Store {
    pub(crate) engine: Engine,
    current: Rc<Snapshot>,
    scheduler: Scheduler,
    notify_unchanged: bool,
    listeners: Vec<(ListenerId, Box<dyn Listener>)>,
    subscribers: Vec<(SubscriptionId, Subscriber)>,
    next_handle: u64,
}

impl Store {
    /// Creates a store and shadows the configured initial state as tick 0.
    #[must_use]
    pub fn new(config: StoreConfig) -> Self {
        let (engine, current) =
            Engine::new(config.registry, config.root_schema, config.initial_state);
        Self {
            engine,
            current,
            scheduler: Scheduler::default(),
            notify_unchanged: config.notify_unchanged,
            listeners: Vec::new(),
            subscribers: Vec::new(),
            next_handle: 0,
        }
    }

    /// Creates a store over `state` with every other option at its default.
    #[must_use]
    pub fn with_state(state: impl Into<Value>) -> Self {
        Self::new(StoreConfig::builder().initial_state(state).build())
    }

    /// Root view of the last committed tick.
    #[must_use]
    pub fn shadow(&self) -> Shadow {
        Shadow::new(self.current.clone())
    }

    /// Raw state of the last committed tick.
    #[must_use]
    pub fn state(&self) -> Value {
        self.current.value().clone()
    }

    /// Last committed tick; 0 for the initial state.
    #[must_use]
    pub fn tick(&self) -> u64 {
        self.engine.tick
    }

    /// `true` if writes are waiting for [`flush`](Self::flush).
    #[must_use]
    pub fn is_scheduled(&self) -> bool {
        self.scheduler.scheduled
    }

    /// Schema registry of this store.
    #[must_use]
    pub fn registry(&self) -> &SchemaRegistry {
        &self.engine.registry
    }

    /// Write view over the Property `shadow` reads.
    pub fn edit(&mut self, shadow: &Shadow) -> ShadowMut<'_> {
        let pid = shadow.pid();
        ShadowMut::new(self, pid)
    }

    /// Write view over the root Property.
    pub fn edit_root(&mut self) -> ShadowMut<'_> {
        let pid = self.engine.root;
        ShadowMut::new(self, pid)
    }

    /// Engine-level access to the Property `shadow` reads.
    pub fn access(&mut self, shadow: &Shadow) -> Access<'_> {
        let pid = shadow.pid();
        Access::new(self, pid)
    }

    /// Committed view of a live Property.
    ///
    /// Fails with [`ShadowError::ObsoleteProperty`] once `pid` was torn down.
    pub fn lookup(&self, pid: PropertyId) -> Result<Shadow, ShadowError> {
        self.engine.node(pid)?;
        self.engine
            .snapshot_of(pid)
            .cloned()
            .map(Shadow::new)
            .ok_or(ShadowError::ObsoleteProperty { pid })
    }

    /// Stages `state` as the whole next tree; every Property is shadowed anew.
    pub fn change_state(&mut self, state: impl Into<Value>) {
        self.engine.stage_root(state.into(), Mutation::Replace);
        self.scheduler.state_replaced = true;
        self.schedule();
    }

    /// Queues the reconciliation action for the next tick.
    ///
    /// Only one action may be queued per tick; a second call before
    /// [`flush`](Self::flush) fails with [`ShadowError::ConcurrentDispatch`].
    pub fn dispatch_update<F>(&mut self, action: F) -> Result<(), ShadowError>
    where
        F: FnOnce(&mut Self) -> Result<Option<Value>, ActionError> + 'static,
    {
        self.scheduler.queue_action(Box::new(action))
    }

    /// Runs `callback` after the next completed tick. Does not schedule one.
    pub fn wait_for<F>(&mut self, callback: F)
    where
        F: FnOnce(&mut Self) + 'static,
    {
        self.scheduler.waiters.push(Box::new(callback));
    }

    /// Calls `callback` after every committed tick with the new root view and
    /// the previous one.
    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&Self, &Shadow, Option<&Shadow>) + 'static,
    {
        let id = SubscriptionId(self.next_handle());
        self.subscribers.push((id, Box::new(callback)));
        id
    }

    /// Removes a subscriber. Returns `false` if it was already gone.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sid, _)| *sid != id);
        self.subscribers.len() != before
    }

    /// Adds a store listener.
    pub fn add_listener(&mut self, listener: impl Listener + 'static) -> ListenerId {
        let id = ListenerId(self.next_handle());
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Removes a listener. Returns `false` if it was already gone.
    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        self.listeners.len() != before
    }

    /// Sets the hook called whenever a tick becomes scheduled.
    pub fn set_waker<F>(&mut self, waker: F)
    where
        F: Fn() + 'static,
    {
        self.scheduler.waker = Some(Rc::new(waker));
    }

    /// Stages the state kept in `storage`, if there is one.
    ///
    /// Returns whether anything was restored.
    pub fn restore_offline(&mut self, storage: &impl OfflineStorage) -> bool {
        let Some(state) = storage.get_offline_data() else {
            return false;
        };
        debug!("restoring offline state");
        self.change_state(state);
        true
    }

    /// Runs the scheduled tick, if any.
    pub fn flush(&mut self) -> FlushOutcome {
        if !self.scheduler.scheduled {
            return FlushOutcome::Idle;
        }
        self.scheduler.scheduled = false;
        let tick = self.engine.tick + 1;
        for (_, listener) in &mut self.listeners {
            listener.on_pre_update(tick);
        }
        if let Some(action) = self.scheduler.take_action() {
            let result = action(self);
            self.scheduler.finish_action();
            match result {
                Ok(Some(root)) => self.engine.stage_root(root, Mutation::Changed),
                Ok(None) => {}
                Err(err) => {
                    return self.abort(ShadowError::ActionFailed {
                        message: err.to_string(),
                    });
                }
            }
        }
        let state_replaced = mem::take(&mut self.scheduler.state_replaced);
        if state_replaced && let Some(next) = self.engine.staged_root().cloned() {
            for (_, listener) in &mut self.listeners {
                listener.on_pre_state_update(&next);
            }
        }
        let kind = self.current.schema().kind();
        if let Some(staged) = self.engine.staged_root()
            && !kind.accepts(staged)
        {
            let found = staged.shape();
            return self.abort(ShadowError::NodeTypeMismatch {
                expected: kind,
                found,
            });
        }

        let previous = self.shadow();
        let listeners = &mut self.listeners;
        let mut visit = |pid: PropertyId, outcome: Visit| {
            for (_, listener) in listeners.iter_mut() {
                listener.on_reconcile(pid, outcome);
            }
        };
        let Some(committed) = self.engine.commit(&mut visit) else {
            let pid = self.engine.root;
            return self.abort(ShadowError::ObsoleteProperty { pid });
        };
        self.current = committed;
        let root = self.shadow();
        let changed = !root.ptr_eq(&previous);
        debug!(
            "tick {} committed{}",
            self.engine.tick,
            if changed { "" } else { " (unchanged)" }
        );

        for (_, listener) in &mut self.listeners {
            listener.on_post_update(&root, Some(&previous));
        }
        if state_replaced {
            for (_, listener) in &mut self.listeners {
                listener.on_post_state_update(&root);
            }
        }
        for waiter in mem::take(&mut self.scheduler.waiters) {
            waiter(self);
        }
        if changed || self.notify_unchanged {
            let mut subscribers = mem::take(&mut self.subscribers);
            for (_, subscriber) in &mut subscribers {
                subscriber(self, &root, Some(&previous));
            }
            subscribers.append(&mut self.subscribers);
            self.subscribers = subscribers;
        }
        FlushOutcome::Committed {
            tick: self.engine.tick,
        }
    }

    /// Discards the tick's pending writes and reports `error`.
    fn abort(&mut self, error: ShadowError) -> FlushOutcome {
        debug!("tick {} aborted: {error}", self.engine.tick + 1);
        self.engine.discard_pending();
        self.scheduler.state_replaced = false;
        for (_, listener) in &mut self.listeners {
            listener.on_error(&error);
        }
        FlushOutcome::Aborted { error }
    }

    pub(crate) fn schedule(&mut self) {
        self.scheduler.schedule();
    }

    fn next_handle(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("tick", &self.engine.tick)
            .field("root", &self.engine.root)
            .field("properties", &self.engine.arena.len())
            .field("scheduler", &self.scheduler)
            .field("listeners", &self.listeners.len())
            .field("subscribers", &self.subscribers.len())
            .finish_non_exhaustive()
    }
}
