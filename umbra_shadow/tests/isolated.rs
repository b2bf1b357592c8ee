// Copyright 2025 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tests for isolated collections: only written keys are reconciled.

use std::cell::RefCell;
use std::rc::Rc;

use umbra_shadow::{
    FlushOutcome, Mutation, NodeKind, Schema, Shadow, ShadowError, Store, StoreConfig, Strategy, Visit,
    VisitRecorder,
};
use umbra_value::{Key, Path, Value};

fn entries(count: usize) -> Value {
    Value::record((0..count).map(|i| (format!("t{i:04}"), Value::from(format!("todo {i}")))))
}

fn store_with(strategy: Strategy, state: Value) -> Store {
    let todos = Schema::builder(NodeKind::Record).strategy(strategy).build();
    let root = Schema::builder(NodeKind::Record)
        .child("todos", todos)
        .build();
    Store::new(
        StoreConfig::builder()
            .root_schema(root)
            .initial_state(Value::record([("todos", state)]))
            .build(),
    )
}

fn at(store: &Store, dotted: &str) -> Shadow {
    store.shadow().at(&Path::parse_dotted(dotted)).unwrap()
}

fn recorded(store: &mut Store) -> Rc<RefCell<VisitRecorder>> {
    let recorder = Rc::new(RefCell::new(VisitRecorder::new()));
    store.add_listener(recorder.clone());
    recorder
}

fn entry_shadows(store: &Store) -> Vec<(Key, Shadow)> {
    at(store, "todos").iter().collect()
}

/// Every committed entry Snapshot holds the value its owner committed.
fn assert_entries_match_value(store: &Store) {
    let todos = at(store, "todos");
    let shadows = entry_shadows(store);
    assert_eq!(shadows.len(), todos.value().len());
    for (key, shadow) in shadows {
        assert_eq!(Some(shadow.value()), todos.value().get(&key), "entry `{key}`");
    }
}

#[test]
fn one_write_reconciles_only_the_entry_and_its_ancestors() {
    let mut store = store_with(Strategy::Isolated, entries(1000));
    let recorder = recorded(&mut store);
    let before = entry_shadows(&store);
    assert_eq!(before.len(), 1000);

    store
        .edit_root()
        .child("todos")
        .unwrap()
        .isolated()
        .unwrap()
        .set("t0500", "done")
        .unwrap();
    store.flush();

    let recorder = recorder.borrow();
    assert_eq!(recorder.visits().len(), 3);
    assert_eq!(recorder.count(Visit::Updated), 3);

    let after = entry_shadows(&store);
    let kept = before
        .iter()
        .zip(&after)
        .filter(|((_, old), (_, new))| old.ptr_eq(new))
        .count();
    assert_eq!(kept, 999);
    assert_eq!(at(&store, "todos.t0500").as_str(), Some("done"));
    assert_eq!(at(&store, "todos.t0500").pid(), before[500].1.pid());
}

#[test]
fn full_strategy_visits_every_sibling() {
    let mut store = store_with(Strategy::Full, entries(1000));
    let recorder = recorded(&mut store);

    store
        .edit_root()
        .child("todos")
        .unwrap()
        .set("t0500", "done")
        .unwrap();
    store.flush();

    let recorder = recorder.borrow();
    assert_eq!(recorder.count(Visit::Updated), 3);
    assert_eq!(recorder.count(Visit::Reused), 999);
}

#[test]
fn nested_writes_mark_their_entry_dirty() {
    let state = Value::record((0..50).map(|i| {
        (
            format!("t{i:04}"),
            Value::record([("title", Value::from(format!("todo {i}")))]),
        )
    }));
    let mut store = store_with(Strategy::Isolated, state);
    let recorder = recorded(&mut store);
    let entry = at(&store, "todos.t0007");
    let sibling = at(&store, "todos.t0008");

    store.edit(&entry).set("done", true).unwrap();
    store.flush();

    let recorder = recorder.borrow();
    assert_eq!(recorder.count(Visit::Updated), 3);
    assert_eq!(recorder.count(Visit::Reused), 1);
    assert_eq!(recorder.count(Visit::Created), 1);
    assert_eq!(recorder.visit(sibling.pid()), None);
    assert!(at(&store, "todos.t0008").ptr_eq(&sibling));
    assert_eq!(at(&store, "todos.t0007.done").as_bool(), Some(true));
}

#[test]
fn entries_can_be_added_removed_cleared_and_restored() {
    let mut store = store_with(Strategy::Isolated, entries(3));
    let old_todos = at(&store, "todos");
    let second = at(&store, "todos.t0001");

    {
        let mut root = store.edit_root();
        let mut todos = root.child("todos").unwrap();
        let mut todos = todos.isolated().unwrap();
        todos.set("new", "fresh").unwrap();
        assert_eq!(todos.remove("t0001").unwrap(), Some(Value::from("todo 1")));
        assert_eq!(todos.remove("t0001").unwrap(), None);
        assert_eq!(todos.len(), 3);
        assert_eq!(todos.get("new"), Some(Value::from("fresh")));
    }
    store.flush();

    assert_eq!(
        at(&store, "todos").iter().map(|(key, _)| key).collect::<Vec<_>>(),
        [Key::from("new"), Key::from("t0000"), Key::from("t0002")]
    );
    assert!(store.lookup(second.pid()).is_err());
    // Older owner Snapshots share the entry map and see newer entries, while
    // their raw value stays as committed.
    assert!(old_todos.get("new").is_some());
    assert_eq!(old_todos.len(), 3);
    assert!(old_todos.value().get(&Key::from("new")).is_none());

    store
        .edit_root()
        .child("todos")
        .unwrap()
        .isolated()
        .unwrap()
        .clear()
        .unwrap();
    store.flush();
    let todos = at(&store, "todos");
    assert!(todos.is_empty());
    assert_eq!(todos.iter().count(), 0);

    store
        .edit_root()
        .child("todos")
        .unwrap()
        .isolated()
        .unwrap()
        .restore(&entries(2))
        .unwrap();
    store.flush();
    assert_eq!(at(&store, "todos").len(), 2);
    assert_eq!(at(&store, "todos.t0001").as_str(), Some("todo 1"));
}

#[test]
fn restore_needs_a_record() {
    let mut store = store_with(Strategy::Isolated, entries(1));
    let err = store
        .edit_root()
        .child("todos")
        .unwrap()
        .isolated()
        .unwrap()
        .restore(&Value::from(3))
        .unwrap_err();
    assert!(matches!(err, ShadowError::WrongShape { .. }));
}

#[test]
fn direct_owner_writes_revisit_every_entry() {
    let mut store = store_with(Strategy::Isolated, entries(10));
    let recorder = recorded(&mut store);
    let todos = at(&store, "todos");

    store
        .edit(&todos)
        .update(|value| match value.insert(Key::from("zz"), Value::from(1)) {
            Ok(_) => Mutation::Changed,
            Err(_) => Mutation::Unchanged,
        })
        .unwrap();
    store.flush();

    let recorder = recorder.borrow();
    assert_eq!(recorder.count(Visit::Reused), 10);
    assert_eq!(recorder.count(Visit::Created), 1);
    assert_eq!(at(&store, "todos.zz").as_i64(), Some(1));
}

#[test]
fn ancestor_writes_and_entry_writes_share_a_tick() {
    let state = Value::record([("a", Value::from(1)), ("b", Value::from(1))]);
    let mut store = store_with(Strategy::Isolated, state);
    let a = at(&store, "todos.a");
    let b = at(&store, "todos.b");

    store
        .edit_root()
        .update(|root| {
            let todos = Value::record([
                ("a", Value::from(1)),
                ("b", Value::from(99)),
                ("c", Value::from(7)),
            ]);
            match root.insert(Key::from("todos"), todos) {
                Ok(_) => Mutation::Changed,
                Err(_) => Mutation::Unchanged,
            }
        })
        .unwrap();
    store
        .edit_root()
        .child("todos")
        .unwrap()
        .isolated()
        .unwrap()
        .set("a", 2)
        .unwrap();
    store.flush();

    assert_entries_match_value(&store);
    assert_eq!(at(&store, "todos.a").as_i64(), Some(2));
    assert_eq!(at(&store, "todos.b").as_i64(), Some(99));
    assert_eq!(at(&store, "todos.c").as_i64(), Some(7));
    assert_eq!(at(&store, "todos.a").pid(), a.pid());
    assert_eq!(at(&store, "todos.b").pid(), b.pid());
}

#[test]
fn action_results_resync_isolated_entries() {
    let mut store = store_with(Strategy::Isolated, entries(3));
    let first = at(&store, "todos.t0000");
    store
        .edit_root()
        .child("todos")
        .unwrap()
        .isolated()
        .unwrap()
        .set("t0001", "staged")
        .unwrap();

    store
        .dispatch_update(|_| {
            let todos = Value::record([
                ("t0000", Value::from("todo 0")),
                ("t0001", Value::from("from action")),
                ("t0003", Value::from("added")),
            ]);
            Ok(Some(Value::record([("todos", todos)])))
        })
        .unwrap();
    assert!(matches!(store.flush(), FlushOutcome::Committed { .. }));

    assert_entries_match_value(&store);
    assert_eq!(at(&store, "todos.t0001").as_str(), Some("from action"));
    assert_eq!(at(&store, "todos.t0003").as_str(), Some("added"));
    assert!(at(&store, "todos").get("t0002").is_none());
    assert!(at(&store, "todos.t0000").ptr_eq(&first));
}

#[test]
fn only_isolated_schemas_expose_keyed_writes() {
    let mut store = store_with(Strategy::Isolated, entries(1));
    let err = store.edit_root().isolated().unwrap_err();
    assert!(matches!(err, ShadowError::WrongShape { .. }));
}
