// Copyright 2025 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Keys addressing one child of a compound value.

use alloc::string::String;
use alloc::sync::Arc;
use core::fmt;

/// Addresses one child of a compound [`Value`](crate::Value).
///
/// Records are addressed by [`Key::Name`], sequences by [`Key::Index`].
/// Keys order indices before names, and each group in its natural order, so
/// a sorted key set enumerates children the same way the value does.
///
/// # Example
///
/// ```rust
/// use umbra_value::Key;
///
/// let field = Key::from("title");
/// let slot = Key::from(3_usize);
///
/// assert_eq!(field.name(), Some("title"));
/// assert_eq!(slot.index(), Some(3));
/// assert!(slot < field);
/// ```
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(untagged)
)]
pub enum Key {
    /// Position inside a sequence.
    Index(usize),
    /// Field of a record.
    Name(Arc<str>),
}

impl Key {
    /// Returns the field name, if this is a record key.
    #[must_use]
    #[inline]
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Name(name) => Some(name),
            Self::Index(_) => None,
        }
    }

    /// Returns the position, if this is a sequence key.
    #[must_use]
    #[inline]
    pub fn index(&self) -> Option<usize> {
        match self {
            Self::Index(index) => Some(*index),
            Self::Name(_) => None,
        }
    }

    /// Parses one path segment: all-digit segments become indices.
    #[must_use]
    pub fn parse_segment(segment: &str) -> Self {
        if !segment.is_empty()
            && segment.bytes().all(|b| b.is_ascii_digit())
            && let Ok(index) = segment.parse()
        {
            return Self::Index(index);
        }
        Self::Name(segment.into())
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(index) => write!(f, "Key({index})"),
            Self::Name(name) => write!(f, "Key({name:?})"),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(index) => write!(f, "{index}"),
            Self::Name(name) => f.write_str(name),
        }
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Self::Name(name.into())
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Self::Name(name.into())
    }
}

impl From<Arc<str>> for Key {
    fn from(name: Arc<str>) -> Self {
        Self::Name(name)
    }
}

impl From<usize> for Key {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}
