// Copyright 2025 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tests for the commit pass: structural sharing, identity preservation and
//! the write protocol.

use std::cell::RefCell;
use std::rc::Rc;

use umbra_shadow::{
    FlushOutcome, Mutation, NodeKind, Schema, Shadow, ShadowError, ShadowMut, Store, StoreConfig,
    Visit, VisitRecorder,
};
use umbra_value::{Key, Path, Value};

fn at(store: &Store, dotted: &str) -> Shadow {
    store.shadow().at(&Path::parse_dotted(dotted)).unwrap()
}

fn nested() -> Store {
    Store::with_state(Value::record([
        ("a", Value::record([("x", Value::from(1))])),
        ("b", Value::record([("y", Value::from(2))])),
    ]))
}

fn todo(title: &str) -> Value {
    Value::record([("title", Value::from(title))])
}

fn todos() -> Store {
    Store::with_state(Value::record([(
        "items",
        Value::sequence([todo("a"), todo("b"), todo("c")]),
    )]))
}

#[test]
fn round_trip_nested_write() {
    let mut store = nested();
    let a = at(&store, "a");

    store.edit(&a).set("x", 2).unwrap();
    assert!(store.is_scheduled());
    // Nothing is visible before the tick runs.
    assert_eq!(at(&store, "a.x").as_i64(), Some(1));

    assert_eq!(store.flush(), FlushOutcome::Committed { tick: 1 });
    assert_eq!(
        store.state(),
        Value::record([
            ("a", Value::record([("x", Value::from(2))])),
            ("b", Value::record([("y", Value::from(2))])),
        ])
    );
    assert_eq!(at(&store, "a.x").as_i64(), Some(2));
    assert_eq!(at(&store, "a").pid(), a.pid());
}

#[test]
fn untouched_subtrees_keep_their_snapshots() {
    let mut store = nested();
    let before = store.shadow();

    store.edit_root().child("a").unwrap().set("x", 2).unwrap();
    store.flush();
    let after = store.shadow();

    assert!(!after.ptr_eq(&before));
    assert!(!after.get("a").unwrap().ptr_eq(&before.get("a").unwrap()));
    assert!(after.get("b").unwrap().ptr_eq(&before.get("b").unwrap()));
    assert!(before.get("b").unwrap().is_active());
    assert!(!before.get("a").unwrap().is_active());
    assert_eq!(after.pid(), before.pid());
}

#[test]
fn ticks_without_writes_reuse_the_root() {
    let mut store = nested();
    let before = store.shadow();

    store.dispatch_update(|_| Ok(None)).unwrap();
    assert_eq!(store.flush(), FlushOutcome::Committed { tick: 1 });
    assert!(store.shadow().ptr_eq(&before));
    assert!(before.is_active());
}

#[test]
fn invalidation_reaches_ancestors_only() {
    let mut store = nested();
    let recorder = Rc::new(RefCell::new(VisitRecorder::new()));
    store.add_listener(recorder.clone());
    let b = at(&store, "b");
    let y = at(&store, "b.y");

    store.edit_root().child("a").unwrap().set("x", 3).unwrap();
    store.flush();

    let recorder = recorder.borrow();
    assert_eq!(recorder.count(Visit::Updated), 3);
    assert_eq!(recorder.visit(store.shadow().pid()), Some(Visit::Updated));
    assert_eq!(recorder.visit(at(&store, "a.x").pid()), Some(Visit::Updated));
    assert_eq!(recorder.visit(b.pid()), Some(Visit::Reused));
    // A reused subtree is not descended into.
    assert_eq!(recorder.visit(y.pid()), None);
}

#[test]
fn replace_drops_later_descendant_writes() {
    let mut store = nested();
    let a = at(&store, "a");
    let x = at(&store, "a.x");

    store
        .edit(&a)
        .replace(Value::record([("x", Value::from(10))]))
        .unwrap();
    let written = store
        .edit(&x)
        .update(|value| {
            *value = Value::from(99);
            Mutation::Changed
        })
        .unwrap();
    assert!(!written);
    store.flush();

    assert_eq!(at(&store, "a.x").as_i64(), Some(10));
    assert_ne!(at(&store, "a").pid(), a.pid());
    assert_eq!(
        store.lookup(x.pid()).unwrap_err(),
        ShadowError::ObsoleteProperty { pid: x.pid() }
    );
    assert!(store.edit(&x).set("z", 1).is_err());
}

#[test]
fn unchanged_mutations_do_not_schedule() {
    let mut store = nested();
    let written = store
        .edit_root()
        .update(|_| Mutation::Unchanged)
        .unwrap();
    assert!(!written);
    assert!(!store.is_scheduled());
    assert_eq!(store.flush(), FlushOutcome::Idle);
}

#[test]
fn removing_an_item_moves_the_rest_with_their_identity() {
    let mut store = todos();
    let first = at(&store, "items.0");
    let second = at(&store, "items.1");
    let third = at(&store, "items.2");

    let removed = store
        .edit_root()
        .child("items")
        .unwrap()
        .remove_at(0)
        .unwrap();
    assert_eq!(removed, todo("a"));
    store.flush();

    let items = at(&store, "items");
    assert_eq!(items.len(), 2);
    assert!(items.get(0).unwrap().ptr_eq(&second));
    assert!(items.get(1).unwrap().ptr_eq(&third));
    assert!(store.lookup(first.pid()).is_err());
    assert_eq!(store.access(&third).dotted_path().unwrap(), "items.1");
}

#[test]
fn inserting_an_item_shifts_later_items() {
    let mut store = todos();
    let first = at(&store, "items.0");
    let second = at(&store, "items.1");

    {
        let mut root = store.edit_root();
        let mut items = root.child("items").unwrap();
        items.insert(1, todo("new")).unwrap();
        // The moved item can still be written through its own Property.
        store_title(&mut items, 2, "b!");
    }
    store.flush();

    let items = at(&store, "items");
    assert_eq!(items.len(), 4);
    assert!(items.get(0).unwrap().ptr_eq(&first));
    assert_eq!(items.get(1).unwrap().value(), &todo("new"));
    assert_eq!(items.get(2).unwrap().pid(), second.pid());
    assert_eq!(items.get(2).unwrap().value(), &todo("b!"));
}

fn store_title(items: &mut ShadowMut<'_>, index: usize, title: &str) {
    items.child(index).unwrap().set("title", title).unwrap();
}

#[test]
fn sequence_helpers() {
    let mut store = Store::with_state(Value::record([(
        "list",
        Value::sequence([Value::from(1), Value::from(2)]),
    )]));
    {
        let mut root = store.edit_root();
        let mut list = root.child("list").unwrap();
        list.push(3).unwrap();
        assert_eq!(list.pop().unwrap(), Some(Value::from(3)));
        assert_eq!(
            list.splice(0, 1, [Value::from(7), Value::from(8)]).unwrap(),
            vec![Value::from(1)]
        );
        assert_eq!(
            list.remove_at(5).unwrap_err(),
            ShadowError::IndexOutOfBounds { index: 5, len: 3 }
        );
    }
    store.flush();
    assert_eq!(
        at(&store, "list").value(),
        &Value::sequence([Value::from(7), Value::from(8), Value::from(2)])
    );

    store.edit_root().child("list").unwrap().clear().unwrap();
    store.flush();
    let list = at(&store, "list");
    assert!(list.is_empty());
    assert!(list.first().is_none());
    assert!(list.last().is_none());
}

#[test]
fn sequence_operations_reject_records() {
    let mut store = nested();
    let err = store.edit_root().child("a").unwrap().push(1).unwrap_err();
    assert!(matches!(err, ShadowError::WrongShape { .. }));
}

#[test]
fn changing_kind_remounts_the_child() {
    let mut store = nested();
    let a = at(&store, "a");

    store.edit_root().set("a", 5).unwrap();
    store.flush();

    let now = at(&store, "a");
    assert_eq!(now.kind(), NodeKind::Scalar);
    assert_ne!(now.pid(), a.pid());
    assert_eq!(now.as_i64(), Some(5));
}

#[test]
fn removing_a_field_tears_the_child_down() {
    let mut store = nested();
    let b = at(&store, "b");

    assert_eq!(
        store.edit_root().remove("b").unwrap(),
        Some(Value::record([("y", Value::from(2))]))
    );
    assert_eq!(store.edit_root().remove("missing").unwrap(), None);
    store.flush();

    assert!(store.shadow().get("b").is_none());
    assert!(store.lookup(b.pid()).is_err());
    assert_eq!(store.shadow().keys(), vec![Key::from("a")]);
}

#[test]
fn failed_action_discards_every_pending_write() {
    let mut store = todos();
    let before = store.shadow();
    let third = at(&store, "items.2");

    store
        .edit_root()
        .child("items")
        .unwrap()
        .remove_at(0)
        .unwrap();
    store
        .dispatch_update(|store| {
            store.edit_root().set("extra", true)?;
            Err("validation failed".into())
        })
        .unwrap();

    let outcome = store.flush();
    assert_eq!(
        outcome,
        FlushOutcome::Aborted {
            error: ShadowError::ActionFailed {
                message: "validation failed".into()
            }
        }
    );
    assert!(store.shadow().ptr_eq(&before));
    assert_eq!(store.tick(), 0);
    assert!(!store.is_scheduled());
    // Re-keyed items are back at their committed positions.
    assert_eq!(store.access(&third).dotted_path().unwrap(), "items.2");

    // The next tick starts from the committed state.
    store.edit_root().set("extra", false).unwrap();
    assert_eq!(store.flush(), FlushOutcome::Committed { tick: 1 });
    assert_eq!(at(&store, "items").len(), 3);
    assert_eq!(at(&store, "extra").as_bool(), Some(false));
}

#[test]
fn action_results_replace_the_root_value() {
    let mut store = nested();
    let b = at(&store, "b");
    store
        .dispatch_update(|store| {
            let mut next = store.state();
            next.insert(Key::from("c"), Value::from("new"))?;
            Ok(Some(next))
        })
        .unwrap();
    store.flush();

    assert_eq!(at(&store, "c").as_str(), Some("new"));
    // The rest of the tree is diffed, not rebuilt.
    assert!(at(&store, "b").ptr_eq(&b));
}

#[test]
fn change_state_reshadows_everything() {
    let mut store = nested();
    let root = store.shadow();
    let b = at(&store, "b");

    store.change_state(Value::record([("b", Value::record([("y", Value::from(2))]))]));
    store.flush();

    assert_ne!(store.shadow().pid(), root.pid());
    assert_ne!(at(&store, "b").pid(), b.pid());
    assert!(store.shadow().get("a").is_none());
}

#[test]
fn root_kind_mismatch_aborts() {
    let mut store = nested();
    store.change_state(Value::from(3));
    assert_eq!(
        store.flush(),
        FlushOutcome::Aborted {
            error: ShadowError::NodeTypeMismatch {
                expected: NodeKind::Record,
                found: umbra_value::Shape::Scalar,
            }
        }
    );
    assert_eq!(at(&store, "a.x").as_i64(), Some(1));
}

#[test]
fn named_children_start_from_their_initial_value() {
    let schema = Schema::builder(NodeKind::Record)
        .child(
            "count",
            Schema::builder(NodeKind::Scalar).initial(0).build(),
        )
        .child(
            "tags",
            Schema::builder(NodeKind::Sequence)
                .initial(Value::empty_sequence())
                .build(),
        )
        .build();
    let store = Store::new(StoreConfig::builder().root_schema(schema).build());

    assert_eq!(at(&store, "count").as_i64(), Some(0));
    assert_eq!(at(&store, "tags").kind(), NodeKind::Sequence);
    assert_eq!(
        store.state(),
        Value::record([
            ("count", Value::from(0)),
            ("tags", Value::empty_sequence()),
        ])
    );
}

#[test]
fn children_stay_unmounted_without_auto_shadow() {
    let schema = Schema::builder(NodeKind::Record)
        .auto_shadow(false)
        .child("known", Schema::builder(NodeKind::Scalar).build())
        .build();
    let mut store = Store::new(
        StoreConfig::builder()
            .root_schema(schema)
            .initial_state(Value::record([
                ("known", Value::from(1)),
                ("extra", Value::from(2)),
            ]))
            .build(),
    );

    assert!(store.shadow().get("known").is_some());
    assert!(store.shadow().get("extra").is_none());
    assert_eq!(store.shadow().keys().len(), 2);

    let err = store.edit_root().set("other", 3).unwrap_err();
    assert!(matches!(err, ShadowError::UnmountedChild { .. }));
    let err = store.edit_root().child("extra").err();
    assert!(matches!(err, Some(ShadowError::UnmountedChild { .. })));

    let root = store.shadow();
    store.access(&root).set_auto_shadow(Some(true)).unwrap();
    store.edit_root().set("other", 3).unwrap();
    store.flush();
    assert_eq!(at(&store, "other").as_i64(), Some(3));
}

#[test]
fn schema_methods() {
    let counter = Schema::builder(NodeKind::Record)
        .initial(Value::record([("count", Value::from(0))]))
        .method("doubled", |shadow, _| {
            let count = shadow.get("count").and_then(|c| c.as_i64()).unwrap_or(0);
            Ok(Value::from(count * 2))
        })
        .bound_method("add", |this, args| {
            let by = args.first().and_then(Value::as_i64).unwrap_or(1);
            let count = this
                .staged()
                .and_then(|v| v.get(&Key::from("count")).and_then(Value::as_i64))
                .unwrap_or(0);
            this.set("count", count + by)?;
            Ok(Value::Null)
        })
        .build();
    let mut store = Store::new(StoreConfig::builder().root_schema(counter).build());

    store.edit_root().call("add", &[Value::from(3)]).unwrap();
    store.edit_root().call("add", &[]).unwrap();
    store.flush();

    let root = store.shadow();
    assert_eq!(root.call("doubled", &[]).unwrap(), Value::from(8));
    assert_eq!(
        root.call("add", &[]).unwrap_err(),
        ShadowError::UnknownMethod { name: "add".into() }
    );
    assert_eq!(store.edit_root().call("doubled", &[]).unwrap(), Value::from(8));
    assert!(store.edit_root().call("missing", &[]).is_err());
}
