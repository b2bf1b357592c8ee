// Copyright 2025 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use thiserror::Error;

use crate::key::Key;
use crate::value::Shape;

/// Errors raised by structural edits on a [`Value`](crate::Value).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    /// The operation needs a different shape of value.
    #[error("expected a {expected} value, found a {found}")]
    WrongShape {
        /// Shape the operation works on.
        expected: Shape,
        /// Shape of the value it was given.
        found: Shape,
    },
    /// The key kind cannot address a child of this value.
    #[error("key `{key}` cannot address a child of a {shape} value")]
    WrongKey {
        /// Offending key.
        key: Key,
        /// Shape of the value being addressed.
        shape: Shape,
    },
    /// A sequence position lies past the end.
    #[error("index {index} is out of bounds for a sequence of length {len}")]
    IndexOutOfBounds {
        /// Requested position.
        index: usize,
        /// Sequence length at the time of the edit.
        len: usize,
    },
}
