// Copyright 2025 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Umbra Shadow: a reactive shadow of a raw state tree.
//!
//! A [`Store`] owns a raw state tree ([`umbra_value::Value`]) and mirrors it
//! with a parallel tree of immutable per-tick [`Snapshot`]s, read through
//! [`Shadow`] views. Writes never touch committed Snapshots: they are staged,
//! and the host flushes them as a *tick* that builds the next Snapshot tree,
//! sharing every unchanged subtree with the previous one.
//!
//! ## Concepts
//!
//! - A *Property* is the persistent identity of one tree position, addressed
//!   by a [`PropertyId`]. It survives ticks as long as its position does, and
//!   sequence splices move it along with its item.
//! - A [`Snapshot`] is one Property's immutable record for one tick. Unchanged
//!   positions keep their Snapshot across ticks, so `Rc` identity tells
//!   whether anything beneath changed ([`Shadow::ptr_eq`]).
//! - A [`Schema`] describes a node type: its [`NodeKind`], initial value,
//!   flags, child schemas, methods and [`Lifecycle`] mixins. The [`Shader`]
//!   resolves which schema shadows each child.
//! - [`Strategy::Isolated`] collections reconcile only the keys written since
//!   the last tick, which keeps large keyed collections cheap.
//!
//! ## Ticks
//!
//! Writes through [`ShadowMut`], [`Store::change_state`] and
//! [`Store::dispatch_update`] schedule a tick and call the host's waker, if
//! one is set with [`Store::set_waker`]. [`Store::flush`] runs it: the queued
//! action, `will_update` hooks, the commit pass, `did_*` hooks, store
//! [`Listener`]s, [`Store::wait_for`] callbacks and subscribers. A failing
//! action aborts the tick and discards everything staged for it.
//!
//! ## Quick Start
//!
//! ```rust
//! use umbra_shadow::Store;
//! use umbra_value::Value;
//!
//! let mut store = Store::with_state(Value::record([
//!     ("title", Value::from("groceries")),
//!     ("items", Value::sequence([Value::from("milk"), Value::from("eggs")])),
//! ]));
//! let before = store.shadow();
//!
//! store.edit_root().child("items")?.push("bread")?;
//! store.flush();
//!
//! let after = store.shadow();
//! assert_eq!(after.get("items").unwrap().len(), 3);
//! // Untouched subtrees are shared between ticks.
//! assert!(after.get("title").unwrap().ptr_eq(&before.get("title").unwrap()));
//! // Untouched items keep their identity too.
//! let milk = |root: &umbra_shadow::Shadow| root.get("items").and_then(|i| i.first()).unwrap();
//! assert!(milk(&after).ptr_eq(&milk(&before)));
//! // The old view still reads the old tick.
//! assert!(!before.is_active());
//! assert_eq!(before.get("items").unwrap().len(), 2);
//! # Ok::<(), umbra_shadow::ShadowError>(())
//! ```
//!
//! ## Logging
//!
//! Uses the [`log`] facade: `debug!` per committed or aborted tick and for
//! dropped writes, `trace!` per reconciled position, `warn!` for schema
//! fallbacks. No logger is installed.
//!
//! ## Features
//!
//! - `serde`: enables `serde` support in `umbra_value`.
//!
//! ## `no_std` Support
//!
//! This crate is `no_std` and uses `alloc`. It is single-threaded: stores and
//! Snapshots are `Rc`-shared.

#![no_std]

extern crate alloc;

mod access;
mod config;
mod engine;
mod error;
mod id;
mod isolated;
mod lifecycle;
mod listener;
mod offline;
mod property;
mod reconcile;
mod registry;
mod scheduler;
mod schema;
mod shader;
mod shadow;
mod snapshot;
mod store;
mod trace;

pub use access::{Access, Checkpoint};
pub use config::{StoreConfig, StoreConfigBuilder};
pub use engine::Mutation;
pub use error::ShadowError;
pub use id::{ListenerId, PropertyId, SubscriptionId};
pub use isolated::IsolatedMut;
pub use lifecycle::{HookContext, Lifecycle};
pub use listener::Listener;
pub use offline::{MemoryStorage, OfflineListener, OfflineStorage};
pub use property::PropertyState;
pub use reconcile::Visit;
pub use registry::SchemaRegistry;
pub use scheduler::{Action, ActionError};
pub use schema::{
    BoundMethod, ChildDescriptor, NodeKind, ReadMethod, Schema, SchemaBuilder, SchemaRef,
    Strategy,
};
pub use shader::{Resolution, Shader};
pub use shadow::{Shadow, ShadowMut};
pub use snapshot::Snapshot;
pub use store::{FlushOutcome, Store};
pub use trace::VisitRecorder;
