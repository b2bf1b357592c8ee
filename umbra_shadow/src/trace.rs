// Copyright 2025 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Explainability helpers for the commit pass.
//!
//! [`VisitRecorder`] is a [`Listener`] that keeps the positions the last tick
//! visited and what it did to each. Useful in tests and when checking that a
//! write reconciled only what it should have.

use alloc::vec::Vec;

use hashbrown::HashMap;

use crate::id::PropertyId;
use crate::listener::Listener;
use crate::reconcile::Visit;

/// Records every position the most recent commit pass visited.
///
/// Share it with the store as an `Rc<RefCell<VisitRecorder>>` to read it
/// back.
///
/// # Example
///
/// ```rust
/// use std::cell::RefCell;
/// use std::rc::Rc;
///
/// use umbra_shadow::{Store, Visit, VisitRecorder};
/// use umbra_value::Value;
///
/// let mut store = Store::with_state(Value::record([
///     ("a", Value::from(1)),
///     ("b", Value::from(2)),
/// ]));
/// let recorder = Rc::new(RefCell::new(VisitRecorder::new()));
/// store.add_listener(recorder.clone());
///
/// store.edit_root().set("a", 10)?;
/// store.flush();
///
/// let recorder = recorder.borrow();
/// let b = store.shadow().get("b").unwrap().pid();
/// assert_eq!(recorder.visit(b), Some(Visit::Reused));
/// assert_eq!(recorder.count(Visit::Updated), 2);
/// # Ok::<(), umbra_shadow::ShadowError>(())
/// ```
#[derive(Clone, Debug, Default)]
pub struct VisitRecorder {
    visits: Vec<(PropertyId, Visit)>,
    last: HashMap<PropertyId, Visit>,
}

impl VisitRecorder {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears everything recorded.
    pub fn clear(&mut self) {
        self.visits.clear();
        self.last.clear();
    }

    /// Visits of the last tick, in pass order.
    #[must_use]
    pub fn visits(&self) -> &[(PropertyId, Visit)] {
        &self.visits
    }

    /// What the last tick did to `pid`, if it reached it.
    #[must_use]
    pub fn visit(&self, pid: PropertyId) -> Option<Visit> {
        self.last.get(&pid).copied()
    }

    /// Number of positions that got `visit`.
    #[must_use]
    pub fn count(&self, visit: Visit) -> usize {
        self.visits.iter().filter(|(_, v)| *v == visit).count()
    }

    /// Positions the last tick did anything but reuse.
    pub fn touched(&self) -> impl Iterator<Item = PropertyId> + '_ {
        self.visits
            .iter()
            .filter(|(_, visit)| *visit != Visit::Reused)
            .map(|(pid, _)| *pid)
    }
}

impl Listener for VisitRecorder {
    fn on_pre_update(&mut self, _tick: u64) {
        self.clear();
    }

    fn on_reconcile(&mut self, pid: PropertyId, visit: Visit) {
        self.visits.push((pid, visit));
        self.last.insert(pid, visit);
    }
}
