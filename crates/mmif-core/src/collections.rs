//! Ordered keyed collections.
//!
//! - [`KeyedList`] holds documents, views and annotations: insertion order is
//!   preserved and keys are unique.
//! - [`ContainsMap`] holds a view's per-type shared metadata, keyed by
//!   [`AtType`].

use std::ops::{Index, IndexMut};

use indexmap::IndexMap;
use serde_json::Value;

use crate::error::{MmifError, MmifResult};
use crate::record::Properties;
use crate::vocabulary::AtType;
use crate::wire;

/// Items that carry their own collection key.
pub trait Keyed {
    fn key(&self) -> &str;
}

// ============================================================================
// Keyed list
// ============================================================================

/// Insertion-ordered list with unique keys.
#[derive(Debug, Clone)]
pub struct KeyedList<T> {
    items: IndexMap<String, T>,
}

impl<T> Default for KeyedList<T> {
    fn default() -> Self {
        Self {
            items: IndexMap::new(),
        }
    }
}

impl<T: Keyed> KeyedList<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an item at the end.
    ///
    /// Fails with [`MmifError::DuplicateKey`] when the key is taken, unless
    /// `overwrite` is set, in which case the old item is replaced in place.
    pub fn append(&mut self, value: T, overwrite: bool) -> MmifResult<()> {
        let key = value.key().to_string();
        if !overwrite && self.items.contains_key(&key) {
            return Err(MmifError::DuplicateKey { key });
        }
        self.items.insert(key, value);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&T> {
        self.items.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut T> {
        self.items.get_mut(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.items.contains_key(key)
    }

    /// Position of a key in insertion order.
    pub fn index_of(&self, key: &str) -> Option<usize> {
        self.items.get_index_of(key)
    }

    /// Removes an item, keeping the order of the rest.
    pub fn remove(&mut self, key: &str) -> Option<T> {
        self.items.shift_remove(key)
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Forward iteration; call `.rev()` for newest first.
    pub fn iter(&self) -> indexmap::map::Values<'_, String, T> {
        self.items.values()
    }

    pub fn iter_mut(&mut self) -> indexmap::map::ValuesMut<'_, String, T> {
        self.items.values_mut()
    }

    pub fn keys(&self) -> impl DoubleEndedIterator<Item = &str> {
        self.items.keys().map(String::as_str)
    }

    pub fn first(&self) -> Option<&T> {
        self.items.first().map(|(_, v)| v)
    }

    pub fn last(&self) -> Option<&T> {
        self.items.last().map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T: PartialEq> PartialEq for KeyedList<T> {
    fn eq(&self, other: &Self) -> bool {
        self.items.len() == other.items.len()
            && self
                .items
                .iter()
                .zip(other.items.iter())
                .all(|(a, b)| a == b)
    }
}

/// Positional access; panics when `index` is out of bounds.
impl<T> Index<usize> for KeyedList<T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        &self.items[index]
    }
}

impl<T> IndexMut<usize> for KeyedList<T> {
    fn index_mut(&mut self, index: usize) -> &mut T {
        &mut self.items[index]
    }
}

impl<'a, T> IntoIterator for &'a KeyedList<T> {
    type Item = &'a T;
    type IntoIter = indexmap::map::Values<'a, String, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.values()
    }
}

// ============================================================================
// Contains metadata
// ============================================================================

/// Shared metadata for all annotations of one type within a view.
pub type Contain = Properties;

/// Per-type "contains" metadata of a view.
///
/// Lookups by [`AtType`] fall back to fuzzy matching; lookups by raw string
/// compare against the canonical string form exactly and never fuzzy-match.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContainsMap {
    entries: IndexMap<AtType, Contain>,
}

impl ContainsMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry, failing on an exact duplicate unless `overwrite`.
    pub fn append(&mut self, at_type: AtType, contain: Contain, overwrite: bool) -> MmifResult<()> {
        if !overwrite && self.entries.contains_key(&at_type) {
            return Err(MmifError::DuplicateKey {
                key: at_type.to_string(),
            });
        }
        self.entries.insert(at_type, contain);
        Ok(())
    }

    /// The entry for exactly this type, created empty if absent.
    pub fn entry(&mut self, at_type: AtType) -> &mut Contain {
        self.entries.entry(at_type).or_default()
    }

    /// Exact match first, then an adjacent version.
    pub fn get(&self, at_type: &AtType) -> Option<&Contain> {
        self.entries.get(at_type).or_else(|| {
            self.entries
                .iter()
                .find(|(k, _)| k.matches(at_type, true))
                .map(|(_, v)| v)
        })
    }

    pub fn get_mut(&mut self, at_type: &AtType) -> Option<&mut Contain> {
        let key = self.resolve_key(at_type)?;
        self.entries.get_mut(&key)
    }

    /// Exact string lookup against the canonical form of each key.
    pub fn get_raw(&self, uri: &str) -> Option<&Contain> {
        self.entries
            .iter()
            .find(|(k, _)| k.to_string() == uri)
            .map(|(_, v)| v)
    }

    pub fn contains(&self, at_type: &AtType) -> bool {
        self.get(at_type).is_some()
    }

    pub fn contains_raw(&self, uri: &str) -> bool {
        self.get_raw(uri).is_some()
    }

    pub fn remove(&mut self, at_type: &AtType) -> Option<Contain> {
        self.entries.shift_remove(at_type)
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&AtType, &Contain) -> bool) {
        self.entries.retain(|k, v| keep(k, v));
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn iter(&self) -> indexmap::map::Iter<'_, AtType, Contain> {
        self.entries.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &AtType> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Wire form: type URI to metadata object. Empty entries are kept.
    #[must_use]
    pub fn to_wire(&self) -> Value {
        Value::Object(
            self.entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_wire()))
                .collect(),
        )
    }

    fn resolve_key(&self, at_type: &AtType) -> Option<AtType> {
        if self.entries.contains_key(at_type) {
            return Some(at_type.clone());
        }
        self.entries
            .keys()
            .find(|k| k.matches(at_type, true))
            .cloned()
    }
}

/// A non-empty contains metadata value declared for a type.
pub(crate) fn contain_value<'a>(contains: &'a ContainsMap, at_type: &AtType, name: &str) -> Option<&'a Value> {
    contains
        .get(at_type)
        .and_then(|c| c.get(name))
        .filter(|v| !wire::is_empty(v))
}
