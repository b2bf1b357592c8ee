// Copyright 2025 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Store-level observers.

use alloc::rc::Rc;
use core::cell::RefCell;

use umbra_value::Value;

use crate::error::ShadowError;
use crate::id::PropertyId;
use crate::reconcile::Visit;
use crate::shadow::Shadow;

/// Observer of store ticks. Every method has a no-op default.
///
/// For one flush the calls arrive in this order:
///
/// 1. [`on_pre_update`](Self::on_pre_update),
/// 2. [`on_pre_state_update`](Self::on_pre_state_update) if
///    [`Store::change_state`](crate::Store::change_state) staged a new tree,
/// 3. [`on_reconcile`](Self::on_reconcile) for every position the commit pass
///    visits,
/// 4. [`on_post_update`](Self::on_post_update),
/// 5. [`on_post_state_update`](Self::on_post_state_update) after a
///    `change_state` tick.
///
/// An aborted tick calls [`on_error`](Self::on_error) instead of 3 to 5.
pub trait Listener {
    /// A whole new state tree is about to be shadowed.
    fn on_pre_state_update(&mut self, _next: &Value) {}

    /// A whole new state tree was shadowed.
    fn on_post_state_update(&mut self, _root: &Shadow) {}

    /// Tick `tick` is about to run.
    fn on_pre_update(&mut self, _tick: u64) {}

    /// A tick committed; `previous` is the root before it.
    fn on_post_update(&mut self, _root: &Shadow, _previous: Option<&Shadow>) {}

    /// A tick was aborted.
    fn on_error(&mut self, _error: &ShadowError) {}

    /// The commit pass reached `pid`.
    fn on_reconcile(&mut self, _pid: PropertyId, _visit: Visit) {}
}

/// Lets the caller keep a handle on a listener the store owns.
impl<L: Listener + ?Sized> Listener for Rc<RefCell<L>> {
    fn on_pre_state_update(&mut self, next: &Value) {
        self.borrow_mut().on_pre_state_update(next);
    }

    fn on_post_state_update(&mut self, root: &Shadow) {
        self.borrow_mut().on_post_state_update(root);
    }

    fn on_pre_update(&mut self, tick: u64) {
        self.borrow_mut().on_pre_update(tick);
    }

    fn on_post_update(&mut self, root: &Shadow, previous: Option<&Shadow>) {
        self.borrow_mut().on_post_update(root, previous);
    }

    fn on_error(&mut self, error: &ShadowError) {
        self.borrow_mut().on_error(error);
    }

    fn on_reconcile(&mut self, pid: PropertyId, visit: Visit) {
        self.borrow_mut().on_reconcile(pid, visit);
    }
}
