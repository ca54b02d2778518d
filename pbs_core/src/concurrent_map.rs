// Copyright 2026 the PBS client authors. MIT license.
//! A thread-safe associative container with atomic insert-if-absent,
//! find, erase, and a keys snapshot. Grounded on
//! `cc/core/common/concurrent_map/src/concurrent_map.h`; `dashmap` gives
//! the same sharded-mutex semantics the original hand-rolled type
//! provides, so this is a thin adapter rather than a reimplementation.

use dashmap::DashMap;
use std::fmt;
use std::hash::Hash;

/// Result of a `ConcurrentMap::insert` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
  Inserted,
  AlreadyExists,
}

/// Thread-safe map with the atomic operations spec.md §4.2 requires.
/// No iterator stability is promised across operations.
pub struct ConcurrentMap<K, V> {
  inner: DashMap<K, V>,
}

impl<K, V> Default for ConcurrentMap<K, V>
where
  K: Eq + Hash,
{
  fn default() -> Self {
    Self::new()
  }
}

impl<K, V> ConcurrentMap<K, V>
where
  K: Eq + Hash + Clone,
  V: Clone,
{
  pub fn new() -> Self {
    ConcurrentMap { inner: DashMap::new() }
  }

  /// Atomically inserts if absent. On absence, `existing_value_out` is set
  /// to the just-inserted value and `Inserted` is returned. On presence,
  /// `existing_value_out` is set to the value already in the map and
  /// `AlreadyExists` is returned.
  pub fn insert(&self, key: K, value: V) -> (InsertOutcome, V) {
    match self.inner.entry(key) {
      dashmap::mapref::entry::Entry::Occupied(entry) => {
        (InsertOutcome::AlreadyExists, entry.get().clone())
      }
      dashmap::mapref::entry::Entry::Vacant(entry) => {
        entry.insert(value.clone());
        (InsertOutcome::Inserted, value)
      }
    }
  }

  /// Copies the existing value for `key`, or `None` if absent.
  pub fn find(&self, key: &K) -> Option<V> {
    self.inner.get(key).map(|entry| entry.value().clone())
  }

  /// Removes `key`. Returns the removed value, or `None` if it was absent.
  pub fn erase(&self, key: &K) -> Option<V> {
    self.inner.remove(key).map(|(_, v)| v)
  }

  /// A snapshot of current keys; may be stale the instant it is returned.
  pub fn keys(&self) -> Vec<K> {
    self.inner.iter().map(|entry| entry.key().clone()).collect()
  }

  /// A snapshot of current values; may be stale the instant it is returned.
  pub fn values(&self) -> Vec<V> {
    self.inner.iter().map(|entry| entry.value().clone()).collect()
  }

  pub fn len(&self) -> usize {
    self.inner.len()
  }

  pub fn is_empty(&self) -> bool {
    self.inner.is_empty()
  }
}

impl<K, V> fmt::Debug for ConcurrentMap<K, V>
where
  K: Eq + Hash + Clone + fmt::Debug,
  V: Clone,
{
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ConcurrentMap").field("len", &self.len()).finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;

  #[test]
  fn insert_if_absent_is_atomic() {
    let map: ConcurrentMap<String, i32> = ConcurrentMap::new();
    let (outcome, value) = map.insert("a".to_string(), 1);
    assert_eq!(outcome, InsertOutcome::Inserted);
    assert_eq!(value, 1);

    let (outcome, value) = map.insert("a".to_string(), 2);
    assert_eq!(outcome, InsertOutcome::AlreadyExists);
    assert_eq!(value, 1);
  }

  #[test]
  fn find_returns_none_when_absent() {
    let map: ConcurrentMap<String, i32> = ConcurrentMap::new();
    assert_eq!(map.find(&"missing".to_string()), None);
  }

  #[test]
  fn erase_returns_not_found_semantics() {
    let map: ConcurrentMap<String, i32> = ConcurrentMap::new();
    map.insert("a".to_string(), 1);
    assert_eq!(map.erase(&"a".to_string()), Some(1));
    assert_eq!(map.erase(&"a".to_string()), None);
  }

  #[test]
  fn keys_snapshot_reflects_current_contents() {
    let map: ConcurrentMap<String, i32> = ConcurrentMap::new();
    map.insert("a".to_string(), 1);
    map.insert("b".to_string(), 2);
    let mut keys = map.keys();
    keys.sort();
    assert_eq!(keys, vec!["a".to_string(), "b".to_string()]);
  }
}
