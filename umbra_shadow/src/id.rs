// Copyright 2025 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Identifiers handed out by a [`Store`](crate::Store).

use core::fmt;

/// Generational handle of a Property, the persistent identity of one tree
/// position.
///
/// It consists of a slot index and a generation counter:
///
/// - A fresh slot starts at generation `1`.
/// - When a Property is torn down its slot is freed; any `PropertyId` that
///   pointed to it is now stale.
/// - Reusing a freed slot increments its generation, so stale ids never alias
///   a live Property.
///
/// Use [`Store::lookup`](crate::Store::lookup) to check whether an id is still
/// live.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PropertyId(u32, u32);

impl PropertyId {
    #[inline]
    pub(crate) const fn new(index: u32, generation: u32) -> Self {
        Self(index, generation)
    }

    /// Arena slot index.
    #[must_use]
    #[inline]
    pub const fn index(self) -> u32 {
        self.0
    }

    /// Generation of the slot when this id was issued.
    #[must_use]
    #[inline]
    pub const fn generation(self) -> u32 {
        self.1
    }

    #[inline]
    pub(crate) const fn slot(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PropertyId({}v{})", self.0, self.1)
    }
}

impl fmt::Display for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.0, self.1)
    }
}

/// Handle returned by [`Store::subscribe`](crate::Store::subscribe).
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(pub(crate) u64);

/// Handle returned by [`Store::add_listener`](crate::Store::add_listener).
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(pub(crate) u64);
