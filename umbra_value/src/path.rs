// Copyright 2025 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Paths from the root of a state tree to one position.

use alloc::string::String;
use core::fmt::{self, Write as _};

use smallvec::SmallVec;

use crate::key::Key;

/// Inline capacity for path keys; deeper paths spill to the heap.
const INLINE_DEPTH: usize = 6;

/// Sequence of [`Key`]s leading from the root to one position.
///
/// The root path is empty. Paths render in two flavors: dotted (`a.b.0`,
/// empty for the root) and slash (`/a/b/0`, `/` for the root).
///
/// # Example
///
/// ```rust
/// use umbra_value::{Key, Path};
///
/// let path = Path::parse_dotted("todos.0.title");
/// assert_eq!(path.len(), 3);
/// assert_eq!(path.keys()[1], Key::Index(0));
/// assert_eq!(path.slash(), "/todos/0/title");
/// assert_eq!(Path::root().slash(), "/");
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(transparent)
)]
pub struct Path(SmallVec<[Key; INLINE_DEPTH]>);

impl Path {
    /// The empty path addressing the root.
    #[must_use]
    #[inline]
    pub fn root() -> Self {
        Self(SmallVec::new())
    }

    /// Parses a dotted path; all-digit segments become indices.
    #[must_use]
    pub fn parse_dotted(dotted: &str) -> Self {
        if dotted.is_empty() {
            return Self::root();
        }
        dotted.split('.').map(Key::parse_segment).collect()
    }

    /// Parses a slash path such as `/a/0`.
    #[must_use]
    pub fn parse_slash(slash: &str) -> Self {
        slash
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(Key::parse_segment)
            .collect()
    }

    /// Returns `true` for the root path.
    #[must_use]
    #[inline]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of keys.
    #[must_use]
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` for the root path.
    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The keys from the root downwards.
    #[must_use]
    #[inline]
    pub fn keys(&self) -> &[Key] {
        &self.0
    }

    /// Last key, `None` for the root.
    #[must_use]
    pub fn last(&self) -> Option<&Key> {
        self.0.last()
    }

    /// Appends a key.
    pub fn push(&mut self, key: Key) {
        self.0.push(key);
    }

    /// Removes and returns the last key.
    pub fn pop(&mut self) -> Option<Key> {
        self.0.pop()
    }

    /// Returns this path extended by `key`.
    #[must_use]
    pub fn child(&self, key: impl Into<Key>) -> Self {
        let mut next = self.clone();
        next.push(key.into());
        next
    }

    /// Returns the parent path, `None` for the root.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        let (_, rest) = self.0.split_last()?;
        Some(rest.iter().cloned().collect())
    }

    /// Returns `true` if `prefix` addresses this position or one of its ancestors.
    #[must_use]
    pub fn starts_with(&self, prefix: &Self) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// Dotted rendering: `a.b.0`, empty for the root.
    #[must_use]
    pub fn dotted(&self) -> String {
        let mut out = String::new();
        for (i, key) in self.0.iter().enumerate() {
            if i > 0 {
                out.push('.');
            }
            let _ = write!(out, "{key}");
        }
        out
    }

    /// Slash rendering: `/a/b/0`, `/` for the root.
    #[must_use]
    pub fn slash(&self) -> String {
        if self.is_root() {
            return String::from("/");
        }
        let mut out = String::new();
        for key in &self.0 {
            let _ = write!(out, "/{key}");
        }
        out
    }

    /// Iterates the keys from the root downwards.
    pub fn iter(&self) -> core::slice::Iter<'_, Key> {
        self.0.iter()
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.slash())
    }
}

impl core::str::FromStr for Path {
    type Err = core::convert::Infallible;

    fn from_str(dotted: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse_dotted(dotted))
    }
}

impl FromIterator<Key> for Path {
    fn from_iter<I: IntoIterator<Item = Key>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<&[Key]> for Path {
    fn from(keys: &[Key]) -> Self {
        keys.iter().cloned().collect()
    }
}

impl<'a> IntoIterator for &'a Path {
    type Item = &'a Key;
    type IntoIter = core::slice::Iter<'a, Key>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
