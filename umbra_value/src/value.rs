// Copyright 2025 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The raw state tree.
//!
//! [`Value`] is a persistent tree: compound nodes are reference counted, so a
//! clone is shallow and unchanged subtrees are shared between versions. Edits go
//! through `Arc::make_mut`, which copies a node only while someone else still
//! holds it, so each level along an edited path is detached at most once per
//! version.

use alloc::collections::BTreeMap;
use alloc::collections::btree_map;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;
use core::mem;

use crate::error::ValueError;
use crate::key::Key;
use crate::path::Path;

/// Fields of a record value.
pub type Record = BTreeMap<Arc<str>, Value>;

/// Items of a sequence value.
pub type Sequence = Vec<Value>;

/// Coarse structural classification of a [`Value`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Shape {
    /// Keyed by field name.
    Record,
    /// Keyed by position.
    Sequence,
    /// A leaf: null, boolean, number or string.
    Scalar,
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Record => "record",
            Self::Sequence => "sequence",
            Self::Scalar => "scalar",
        })
    }
}

/// Identity token of a value, see [`Value::identity`].
#[derive(Clone, Debug, PartialEq)]
pub enum Identity {
    /// Address of a compound node's shared allocation.
    Compound(usize),
    /// Scalars are identified by their content.
    Scalar(Value),
}

/// A node of the raw state tree.
///
/// # Example
///
/// ```rust
/// use umbra_value::{Key, Value};
///
/// let before = Value::record([("a", Value::record([("x", Value::from(1))]))]);
///
/// let mut after = before.clone();
/// if let Some(x) = after.pointer_mut(&"a.x".parse().unwrap()) {
///     *x = Value::from(2);
/// }
///
/// // The edit detached the edited path only.
/// assert_eq!(before.pointer(&"a.x".parse().unwrap()), Some(&Value::from(1)));
/// assert_eq!(after.pointer(&"a.x".parse().unwrap()), Some(&Value::from(2)));
/// assert!(!before.same(&after));
/// assert_eq!(after.get(&Key::from("a")).map(|a| a.len()), Some(1));
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(untagged)
)]
pub enum Value {
    /// Absent or explicitly empty.
    #[default]
    Null,
    /// Boolean leaf.
    Bool(bool),
    /// Integer leaf.
    Int(i64),
    /// Floating point leaf.
    Float(f64),
    /// String leaf.
    String(Arc<str>),
    /// Ordered items.
    Sequence(Arc<Sequence>),
    /// Named fields, enumerated in key order.
    Record(Arc<Record>),
}

impl Value {
    /// Builds a record from `(name, value)` pairs.
    #[must_use]
    pub fn record<K, I>(entries: I) -> Self
    where
        K: Into<Arc<str>>,
        I: IntoIterator<Item = (K, Self)>,
    {
        Self::Record(Arc::new(
            entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        ))
    }

    /// Builds a sequence from items.
    #[must_use]
    pub fn sequence<I: IntoIterator<Item = Self>>(items: I) -> Self {
        Self::Sequence(Arc::new(items.into_iter().collect()))
    }

    /// An empty record.
    #[must_use]
    pub fn empty_record() -> Self {
        Self::Record(Arc::default())
    }

    /// An empty sequence.
    #[must_use]
    pub fn empty_sequence() -> Self {
        Self::Sequence(Arc::default())
    }

    /// Returns the structural shape.
    #[must_use]
    #[inline]
    pub fn shape(&self) -> Shape {
        match self {
            Self::Record(_) => Shape::Record,
            Self::Sequence(_) => Shape::Sequence,
            _ => Shape::Scalar,
        }
    }

    /// Returns `true` for [`Value::Null`].
    #[must_use]
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the identity token used by [`Value::same`].
    ///
    /// Taking a token does not hold a reference, so it can be compared after
    /// the value has been edited in place.
    #[must_use]
    pub fn identity(&self) -> Identity {
        match self {
            Self::Record(map) => Identity::Compound(Arc::as_ptr(map) as *const () as usize),
            Self::Sequence(items) => Identity::Compound(Arc::as_ptr(items) as *const () as usize),
            scalar => Identity::Scalar(scalar.clone()),
        }
    }

    /// Reference identity: compounds are the same when they share an
    /// allocation, scalars when they are equal.
    #[must_use]
    pub fn same(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Record(a), Self::Record(b)) => Arc::ptr_eq(a, b),
            (Self::Sequence(a), Self::Sequence(b)) => Arc::ptr_eq(a, b),
            (Self::Record(_) | Self::Sequence(_), _) | (_, Self::Record(_) | Self::Sequence(_)) => {
                false
            }
            (a, b) => a == b,
        }
    }

    /// Returns the boolean payload.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the integer payload.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns a numeric payload as a float; integers convert.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Returns the string payload.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the record fields.
    #[must_use]
    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Self::Record(map) => Some(map),
            _ => None,
        }
    }

    /// Returns the sequence items.
    #[must_use]
    pub fn as_sequence(&self) -> Option<&[Self]> {
        match self {
            Self::Sequence(items) => Some(items),
            _ => None,
        }
    }

    /// Detaches and returns the record fields for editing.
    pub fn record_mut(&mut self) -> Option<&mut Record> {
        match self {
            Self::Record(map) => Some(Arc::make_mut(map)),
            _ => None,
        }
    }

    /// Detaches and returns the sequence items for editing.
    pub fn sequence_mut(&mut self) -> Option<&mut Sequence> {
        match self {
            Self::Sequence(items) => Some(Arc::make_mut(items)),
            _ => None,
        }
    }

    /// Number of children; scalars have none.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Record(map) => map.len(),
            Self::Sequence(items) => items.len(),
            _ => 0,
        }
    }

    /// Returns `true` if the value has no children.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Child at `key`.
    #[must_use]
    pub fn get(&self, key: &Key) -> Option<&Self> {
        match (self, key) {
            (Self::Record(map), Key::Name(name)) => map.get(&**name),
            (Self::Sequence(items), Key::Index(index)) => items.get(*index),
            _ => None,
        }
    }

    /// Child at `key`, detaching this node first.
    pub fn get_mut(&mut self, key: &Key) -> Option<&mut Self> {
        match (self, key) {
            (Self::Record(map), Key::Name(name)) => {
                if !map.contains_key(&**name) {
                    return None;
                }
                Arc::make_mut(map).get_mut(&**name)
            }
            (Self::Sequence(items), Key::Index(index)) => {
                if *index >= items.len() {
                    return None;
                }
                Arc::make_mut(items).get_mut(*index)
            }
            _ => None,
        }
    }

    /// Descendant at `path`.
    #[must_use]
    pub fn pointer(&self, path: &Path) -> Option<&Self> {
        path.iter().try_fold(self, |node, key| node.get(key))
    }

    /// Descendant at `path`, detaching every level on the way down.
    pub fn pointer_mut(&mut self, path: &Path) -> Option<&mut Self> {
        let mut node = self;
        for key in path {
            node = node.get_mut(key)?;
        }
        Some(node)
    }

    /// Keys of the children, in enumeration order.
    #[must_use]
    pub fn keys(&self) -> Vec<Key> {
        self.children().map(|(key, _)| key).collect()
    }

    /// Iterates `(key, child)` pairs in enumeration order.
    pub fn children(&self) -> Children<'_> {
        let inner = match self {
            Self::Record(map) => ChildrenInner::Record(map.iter()),
            Self::Sequence(items) => ChildrenInner::Sequence(items.iter().enumerate()),
            _ => ChildrenInner::Empty,
        };
        Children { inner }
    }

    /// Sets the child at `key`, returning the previous child.
    ///
    /// Sequences accept `len` as a position, which appends.
    pub fn insert(&mut self, key: Key, value: Self) -> Result<Option<Self>, ValueError> {
        let shape = self.shape();
        match (self, key) {
            (Self::Record(map), Key::Name(name)) => Ok(Arc::make_mut(map).insert(name, value)),
            (Self::Sequence(items), Key::Index(index)) => {
                let len = items.len();
                if index > len {
                    return Err(ValueError::IndexOutOfBounds { index, len });
                }
                let items = Arc::make_mut(items);
                if index == len {
                    items.push(value);
                    Ok(None)
                } else {
                    Ok(Some(mem::replace(&mut items[index], value)))
                }
            }
            (_, key) => Err(ValueError::WrongKey { key, shape }),
        }
    }

    /// Removes the child at `key`; sequence items after it shift down.
    pub fn remove(&mut self, key: &Key) -> Result<Option<Self>, ValueError> {
        let shape = self.shape();
        match (self, key) {
            (Self::Record(map), Key::Name(name)) => {
                if !map.contains_key(&**name) {
                    return Ok(None);
                }
                Ok(Arc::make_mut(map).remove(&**name))
            }
            (Self::Sequence(items), Key::Index(index)) => {
                if *index >= items.len() {
                    return Ok(None);
                }
                Ok(Some(Arc::make_mut(items).remove(*index)))
            }
            (_, key) => Err(ValueError::WrongKey {
                key: key.clone(),
                shape,
            }),
        }
    }

    /// Replaces `delete` items starting at `index` with `items`.
    ///
    /// `delete` is clamped to the end of the sequence. Returns the removed
    /// items.
    pub fn splice(
        &mut self,
        index: usize,
        delete: usize,
        items: Vec<Self>,
    ) -> Result<Vec<Self>, ValueError> {
        let found = self.shape();
        let Self::Sequence(seq) = self else {
            return Err(ValueError::WrongShape {
                expected: Shape::Sequence,
                found,
            });
        };
        let len = seq.len();
        if index > len {
            return Err(ValueError::IndexOutOfBounds { index, len });
        }
        let end = index.saturating_add(delete).min(len);
        if end == index && items.is_empty() {
            return Ok(Vec::new());
        }
        Ok(Arc::make_mut(seq).splice(index..end, items).collect())
    }
}

/// Iterator over the children of a [`Value`], see [`Value::children`].
#[derive(Debug)]
pub struct Children<'a> {
    inner: ChildrenInner<'a>,
}

#[derive(Debug)]
enum ChildrenInner<'a> {
    Record(btree_map::Iter<'a, Arc<str>, Value>),
    Sequence(core::iter::Enumerate<core::slice::Iter<'a, Value>>),
    Empty,
}

impl<'a> Iterator for Children<'a> {
    type Item = (Key, &'a Value);

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.inner {
            ChildrenInner::Record(iter) => iter.next().map(|(k, v)| (Key::Name(k.clone()), v)),
            ChildrenInner::Sequence(iter) => iter.next().map(|(i, v)| (Key::Index(i), v)),
            ChildrenInner::Empty => None,
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match &self.inner {
            ChildrenInner::Record(iter) => iter.size_hint(),
            ChildrenInner::Sequence(iter) => iter.size_hint(),
            ChildrenInner::Empty => (0, Some(0)),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::String(s) => write!(f, "{s:?}"),
            Self::Sequence(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Self::Record(map) => {
                f.write_str("{")?;
                for (i, (key, item)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{key:?}:{item}")?;
                }
                f.write_str("}")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Int(i.into())
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s.into())
    }
}

impl From<Vec<Self>> for Value {
    fn from(items: Vec<Self>) -> Self {
        Self::Sequence(Arc::new(items))
    }
}

impl From<Record> for Value {
    fn from(map: Record) -> Self {
        Self::Record(Arc::new(map))
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;
    use alloc::vec;

    fn sample() -> Value {
        Value::record([
            ("a", Value::record([("x", Value::from(1))])),
            ("b", Value::sequence([Value::from("p"), Value::from("q")])),
        ])
    }

    #[test]
    fn clones_share_until_edited() {
        let before = sample();
        let mut after = before.clone();
        assert!(before.same(&after));

        let b = after.get_mut(&Key::from("b")).unwrap();
        b.insert(Key::Index(2), Value::from("r")).unwrap();

        assert!(!before.same(&after));
        let a = Key::from("a");
        assert!(before.get(&a).unwrap().same(after.get(&a).unwrap()));
        assert_eq!(before.pointer(&Path::parse_dotted("b")).unwrap().len(), 2);
        assert_eq!(after.pointer(&Path::parse_dotted("b")).unwrap().len(), 3);
    }

    #[test]
    fn identity_survives_in_place_edits() {
        let mut value = sample();
        // Uniquely owned: editing in place keeps the allocation.
        let token = value.identity();
        value.record_mut().unwrap().remove("a");
        assert_eq!(value.identity(), token);

        let shared = value.clone();
        value.record_mut().unwrap().remove("b");
        assert_ne!(value.identity(), token);
        assert_eq!(shared.identity(), token);
    }

    #[test]
    fn scalars_compare_by_content() {
        assert!(Value::from("x").same(&Value::from("x")));
        assert!(Value::Null.same(&Value::Null));
        assert!(!Value::from(1).same(&Value::from(1.0)));
        assert!(!Value::empty_record().same(&Value::empty_record()));
    }

    #[test]
    fn key_kind_must_match_shape() {
        let mut value = sample();
        let err = value.insert(Key::Index(0), Value::Null).unwrap_err();
        assert_eq!(
            err,
            ValueError::WrongKey {
                key: Key::Index(0),
                shape: Shape::Record
            }
        );
        let mut scalar = Value::from(3);
        assert!(scalar.remove(&Key::from("a")).is_err());
    }

    #[test]
    fn sequence_insert_bounds() {
        let mut items = Value::sequence([Value::from(1)]);
        assert_eq!(items.insert(Key::Index(1), Value::from(2)), Ok(None));
        assert_eq!(
            items.insert(Key::Index(5), Value::from(3)),
            Err(ValueError::IndexOutOfBounds { index: 5, len: 2 })
        );
    }

    #[test]
    fn splice_clamps_and_reports_removed() {
        let mut items = Value::sequence((0..5).map(Value::from));
        let removed = items.splice(3, 10, vec![Value::from(9)]).unwrap();
        assert_eq!(removed, vec![Value::from(3), Value::from(4)]);
        assert_eq!(items.to_string(), "[0,1,2,9]");
        assert!(Value::empty_record().splice(0, 0, vec![]).is_err());
    }

    #[test]
    fn records_enumerate_sorted() {
        let value = Value::record([("b", Value::Null), ("a", Value::from(true))]);
        assert_eq!(value.keys(), vec![Key::from("a"), Key::from("b")]);
        assert_eq!(value.to_string(), r#"{"a":true,"b":null}"#);
    }
}
