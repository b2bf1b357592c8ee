// Copyright 2025 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Umbra Value: persistent state trees.
//!
//! This crate provides the raw, plain-data side of Umbra: a tree of records,
//! sequences and scalar leaves that an application owns as its state.
//!
//! ## Core Concepts
//!
//! - [`Value`] - a node; compound nodes are `Arc`-shared, so clones are
//!   shallow and unchanged subtrees are shared between versions.
//! - [`Key`] / [`Path`] - addressing, with dotted (`a.b.0`) and slash
//!   (`/a/b/0`) renderings.
//! - [`Value::same`] - reference identity: shared allocation for compounds,
//!   equality for scalars. Reconciliation in `umbra_shadow` keys off this.
//!
//! ## Quick Start
//!
//! ```rust
//! use umbra_value::{Key, Path, Value};
//!
//! let committed = Value::record([
//!     ("todos", Value::sequence([Value::from("write docs")])),
//!     ("filter", Value::from("all")),
//! ]);
//!
//! // Stage the next version: only the edited path is copied.
//! let mut next = committed.clone();
//! next.pointer_mut(&Path::parse_dotted("todos"))
//!     .unwrap()
//!     .insert(Key::Index(1), Value::from("ship"))
//!     .unwrap();
//!
//! let filter = Key::from("filter");
//! assert!(committed.get(&filter).unwrap().same(next.get(&filter).unwrap()));
//! assert!(!committed.same(&next));
//! assert_eq!(next.pointer(&Path::parse_dotted("todos")).unwrap().len(), 2);
//! ```
//!
//! ## Features
//!
//! - `serde`: `Serialize`/`Deserialize` for [`Value`], [`Key`] and [`Path`].
//!   Values use an untagged, JSON-like encoding.
//!
//! ## `no_std` Support
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

mod error;
mod key;
mod path;
mod value;

pub use error::ValueError;
pub use key::Key;
pub use path::Path;
pub use value::{Children, Identity, Record, Sequence, Shape, Value};
