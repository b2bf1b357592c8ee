// Copyright 2025 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! JSON encoding of state trees.

#![cfg(feature = "serde")]

use umbra_value::{Key, Path, Value};

#[test]
fn json_documents_become_state_trees() {
    let value: Value =
        serde_json::from_str(r#"{"todos":[{"title":"a","done":false}],"count":2,"ratio":0.5,"note":null}"#)
            .unwrap();

    assert_eq!(value.pointer(&Path::parse_dotted("count")), Some(&Value::Int(2)));
    assert_eq!(value.pointer(&Path::parse_dotted("ratio")), Some(&Value::Float(0.5)));
    assert_eq!(value.pointer(&Path::parse_dotted("note")), Some(&Value::Null));
    assert_eq!(
        value
            .pointer(&Path::parse_dotted("todos.0.title"))
            .and_then(Value::as_str),
        Some("a")
    );
}

#[test]
fn state_trees_serialize_as_plain_json() {
    let value = Value::record([
        ("items", Value::sequence([Value::from(1), Value::from(true)])),
        ("name", Value::from("list")),
    ]);
    let json = serde_json::to_string(&value).unwrap();
    assert_eq!(json, r#"{"items":[1,true],"name":"list"}"#);
    let back: Value = serde_json::from_str(&json).unwrap();
    assert_eq!(back, value);
}

#[test]
fn paths_encode_as_key_lists() {
    let path = Path::parse_dotted("todos.3.title");
    let json = serde_json::to_string(&path).unwrap();
    assert_eq!(json, r#"["todos",3,"title"]"#);
    let back: Path = serde_json::from_str(&json).unwrap();
    assert_eq!(back.keys()[1], Key::Index(3));
}
