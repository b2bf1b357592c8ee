// Copyright 2025 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tick scheduling.
//!
//! Writes only mark the store as scheduled and wake the host once; the host
//! runs [`Store::flush`](crate::Store::flush) from its own task queue.

use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::fmt;

use umbra_value::Value;

use crate::error::ShadowError;
use crate::store::Store;

/// Error type actions may fail with.
pub type ActionError = Box<dyn core::error::Error>;

/// A reconciliation action queued with
/// [`Store::dispatch_update`](crate::Store::dispatch_update).
///
/// It runs at the start of the tick with write access to the store. `Ok(Some)`
/// replaces the root value for the tick.
pub type Action = Box<dyn FnOnce(&mut Store) -> Result<Option<Value>, ActionError>>;

pub(crate) type Waiter = Box<dyn FnOnce(&mut Store)>;

pub(crate) type Waker = Rc<dyn Fn()>;

#[derive(Default)]
pub(crate) struct Scheduler {
    pub(crate) scheduled: bool,
    /// An action is running; writes it makes belong to the current tick.
    pub(crate) in_action: bool,
    /// `change_state` staged a new tree this tick.
    pub(crate) state_replaced: bool,
    pub(crate) action: Option<Action>,
    pub(crate) waiters: Vec<Waiter>,
    pub(crate) waker: Option<Waker>,
}

impl Scheduler {
    /// Marks a tick as due. Returns `true` if the host should be woken.
    pub(crate) fn schedule(&mut self) -> bool {
        if self.scheduled || self.in_action {
            return false;
        }
        self.scheduled = true;
        if let Some(waker) = &self.waker {
            waker();
        }
        true
    }

    pub(crate) fn queue_action(&mut self, action: Action) -> Result<(), ShadowError> {
        if self.action.is_some() || self.in_action {
            return Err(ShadowError::ConcurrentDispatch);
        }
        self.action = Some(action);
        self.schedule();
        Ok(())
    }

    pub(crate) fn take_action(&mut self) -> Option<Action> {
        let action = self.action.take();
        self.in_action = action.is_some();
        action
    }

    pub(crate) fn finish_action(&mut self) {
        self.in_action = false;
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("scheduled", &self.scheduled)
            .field("in_action", &self.in_action)
            .field("state_replaced", &self.state_replaced)
            .field("action", &self.action.is_some())
            .field("waiters", &self.waiters.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;

    #[test]
    fn wakes_once_per_tick() {
        let woken = Rc::new(Cell::new(0));
        let mut scheduler = Scheduler {
            waker: Some({
                let woken = woken.clone();
                Rc::new(move || woken.set(woken.get() + 1))
            }),
            ..Scheduler::default()
        };
        assert!(scheduler.schedule());
        assert!(!scheduler.schedule());
        assert_eq!(woken.get(), 1);

        scheduler.scheduled = false;
        assert!(scheduler.schedule());
        assert_eq!(woken.get(), 2);
    }

    #[test]
    fn one_action_per_tick() {
        let mut scheduler = Scheduler::default();
        scheduler.queue_action(Box::new(|_| Ok(None))).unwrap();
        assert_eq!(
            scheduler.queue_action(Box::new(|_| Ok(None))),
            Err(ShadowError::ConcurrentDispatch)
        );
        assert!(scheduler.scheduled);

        let _action = scheduler.take_action().unwrap();
        assert!(scheduler.in_action);
        assert_eq!(
            scheduler.queue_action(Box::new(|_| Ok(None))),
            Err(ShadowError::ConcurrentDispatch)
        );
        scheduler.finish_action();
        assert!(scheduler.queue_action(Box::new(|_| Ok(None))).is_ok());
    }
}
