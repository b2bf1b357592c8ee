// Copyright 2025 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use alloc::string::String;

use thiserror::Error;
use umbra_value::{Key, Path, Shape, ValueError};

use crate::id::PropertyId;
use crate::schema::NodeKind;

/// Errors raised by the shadowing runtime.
///
/// Structural and concurrency errors are returned synchronously from the
/// write API. Operation errors happen while a tick is being flushed; they are
/// reported to [`Listener::on_error`](crate::Listener::on_error) and abort the
/// tick.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShadowError {
    /// A write addressed a position whose parent has no staged value.
    #[error("no staged value exists at `{path}`")]
    MissingParentValue {
        /// Position of the write.
        path: Path,
    },
    /// The child is not shadowed because auto-shadowing is off and no schema
    /// resolved for it.
    #[error("child `{key}` of `{path}` is not shadowed")]
    UnmountedChild {
        /// Parent position.
        path: Path,
        /// Unmounted key.
        key: Key,
    },
    /// The position is read-only, explicitly or through an ancestor.
    #[error("`{path}` is read-only")]
    ReadOnly {
        /// Position of the rejected write.
        path: Path,
    },
    /// An identity was bound twice, or a token was used against the wrong
    /// Property.
    #[error("identity conflict: {message}")]
    IdentityConflict {
        /// What collided.
        message: String,
    },
    /// The operation needs a different shape of value.
    #[error("expected a {expected} value, found a {found}")]
    WrongShape {
        /// Shape the operation works on.
        expected: Shape,
        /// Shape actually present.
        found: Shape,
    },
    /// A sequence position lies past the end.
    #[error("index {index} is out of bounds for a sequence of length {len}")]
    IndexOutOfBounds {
        /// Requested position.
        index: usize,
        /// Sequence length.
        len: usize,
    },
    /// No method of that name is registered on the node's schema, or it needs
    /// write access.
    #[error("no method `{name}` is callable here")]
    UnknownMethod {
        /// Requested method name.
        name: String,
    },
    /// A reconciliation action is already queued for this tick.
    #[error("an update action is already queued for this tick")]
    ConcurrentDispatch,
    /// The Property has been torn down.
    #[error("property {pid} is obsolete")]
    ObsoleteProperty {
        /// Stale id.
        pid: PropertyId,
    },
    /// A dispatched action failed.
    #[error("update action failed: {message}")]
    ActionFailed {
        /// Rendered cause.
        message: String,
    },
    /// The staged root value does not fit the root schema.
    #[error("root expects a {expected} value, found a {found}")]
    NodeTypeMismatch {
        /// Kind the root schema accepts.
        expected: NodeKind,
        /// Shape of the staged root value.
        found: Shape,
    },
}

impl From<ValueError> for ShadowError {
    fn from(err: ValueError) -> Self {
        match err {
            ValueError::WrongShape { expected, found } => Self::WrongShape { expected, found },
            ValueError::WrongKey { key, shape } => Self::WrongShape {
                expected: match key {
                    Key::Index(_) => Shape::Sequence,
                    Key::Name(_) => Shape::Record,
                },
                found: shape,
            },
            ValueError::IndexOutOfBounds { index, len } => Self::IndexOutOfBounds { index, len },
        }
    }
}
