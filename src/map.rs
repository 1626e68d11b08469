//! Ordered maps: [`TrbMap`] (unique keys) and [`TrbMultiMap`].

use std::fmt;
use std::iter::FusedIterator;
use std::mem;
use std::ops::RangeBounds;

use crate::aggregate::{Aggregate, NoSum, SubtreeSize};
use crate::compare::{First, KeyCompare, OrdCompare};
use crate::engine::{CacheMost, MostPolicy};
use crate::link::NodeId;
use crate::raw;
use crate::tree::TrbTree;
use crate::{alloc_failed, InvariantViolation, Result};

type Tree<K, V, C, A, M> = TrbTree<(K, V), First<K, V>, C, A, M>;

/// Iterator over `(&K, &V)` in key order.
pub struct Iter<'a, K, V, S> {
    inner: raw::Iter<'a, (K, V), S>,
}

impl<'a, K, V, S> Iterator for Iter<'a, K, V, S> {
    type Item = (&'a K, &'a V);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, v)| (k, v))
    }
}

impl<K, V, S> DoubleEndedIterator for Iter<'_, K, V, S> {
    #[inline]
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back().map(|(k, v)| (k, v))
    }
}

impl<K, V, S> FusedIterator for Iter<'_, K, V, S> {}

// =============================================================================
// TrbMap
// =============================================================================

/// Ordered map with unique keys.
pub struct TrbMap<K, V, C = OrdCompare, A = NoSum, M = CacheMost>
where
    A: Aggregate<(K, V)>,
    M: MostPolicy,
{
    tree: Tree<K, V, C, A, M>,
}

impl<K: Ord, V> TrbMap<K, V> {
    pub fn new() -> Self {
        Self {
            tree: TrbTree::new(),
        }
    }
}

impl<K, V, C, A, M> TrbMap<K, V, C, A, M>
where
    C: KeyCompare<K>,
    A: Aggregate<(K, V)>,
    M: MostPolicy,
{
    pub fn with_comparator(cmp: C) -> Self {
        Self {
            tree: TrbTree::with_comparator(cmp),
        }
    }

    pub fn with_capacity_and_comparator(capacity: usize, cmp: C) -> Self {
        Self {
            tree: TrbTree::with_capacity_and_comparator(capacity, cmp),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Insert or replace. Returns the previous value; the stored key is kept.
    ///
    /// # Panics
    ///
    /// If the node arena cannot grow.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        self.try_insert(key, value)
            .unwrap_or_else(|e| alloc_failed(e))
    }

    /// [`insert`](Self::insert) that reports allocation failure instead of
    /// panicking. On error the map is unchanged.
    pub fn try_insert(&mut self, key: K, value: V) -> Result<Option<V>> {
        let (id, rejected) = self.tree.try_insert_unique((key, value))?;
        Ok(rejected.and_then(|(_, value)| {
            self.tree
                .update_at(id, |slot| mem::replace(&mut slot.1, value))
        }))
    }

    /// Insert only if the key is absent. Returns the handle of the stored
    /// entry and whether it was inserted.
    pub fn insert_unique(&mut self, key: K, value: V) -> Result<(NodeId, bool)> {
        let (id, rejected) = self.tree.try_insert_unique((key, value))?;
        Ok((id, rejected.is_none()))
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.get_key_value(key).map(|(_, v)| v)
    }

    pub fn get_key_value(&self, key: &K) -> Option<(&K, &V)> {
        let id = self.tree.find(key)?;
        self.entry_at(id)
    }

    /// Values reachable through `get_mut` must not feed the aggregate; use
    /// [`update`](Self::update) when they do.
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        let id = self.tree.find(key)?;
        self.tree.get_mut(id).map(|e| &mut e.1)
    }

    /// Mutate a value in place and refresh the aggregates above it.
    pub fn update<R>(&mut self, key: &K, f: impl FnOnce(&mut V) -> R) -> Option<R> {
        let id = self.tree.find(key)?;
        self.tree.update_at(id, |e| f(&mut e.1))
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.tree.find(key).is_some()
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.remove_entry(key).map(|(_, v)| v)
    }

    pub fn remove_entry(&mut self, key: &K) -> Option<(K, V)> {
        self.tree.remove_unique(key)
    }

    // -------------------------------------------------------------------------
    // Handles
    // -------------------------------------------------------------------------

    pub fn find(&self, key: &K) -> Option<NodeId> {
        self.tree.find(key)
    }

    pub fn lower_bound(&self, key: &K) -> Option<NodeId> {
        self.tree.lower_bound(key)
    }

    pub fn upper_bound(&self, key: &K) -> Option<NodeId> {
        self.tree.upper_bound(key)
    }

    pub fn first(&self) -> Option<NodeId> {
        self.tree.first()
    }

    pub fn last(&self) -> Option<NodeId> {
        self.tree.last()
    }

    pub fn next(&self, id: NodeId) -> Option<NodeId> {
        self.tree.next(id)
    }

    pub fn prev(&self, id: NodeId) -> Option<NodeId> {
        self.tree.prev(id)
    }

    pub fn entry_at(&self, id: NodeId) -> Option<(&K, &V)> {
        self.tree.get(id).map(|(k, v)| (k, v))
    }

    pub fn value_at_mut(&mut self, id: NodeId) -> Option<&mut V> {
        self.tree.get_mut(id).map(|e| &mut e.1)
    }

    pub fn remove_at(&mut self, id: NodeId) -> Option<(K, V)> {
        self.tree.remove_at(id)
    }

    pub fn first_key_value(&self) -> Option<(&K, &V)> {
        self.entry_at(self.first()?)
    }

    pub fn last_key_value(&self) -> Option<(&K, &V)> {
        self.entry_at(self.last()?)
    }

    pub fn pop_first(&mut self) -> Option<(K, V)> {
        self.tree.pop_first()
    }

    pub fn pop_last(&mut self) -> Option<(K, V)> {
        self.tree.pop_last()
    }

    // -------------------------------------------------------------------------
    // Iteration
    // -------------------------------------------------------------------------

    pub fn iter(&self) -> Iter<'_, K, V, A::Sum> {
        Iter {
            inner: self.tree.iter(),
        }
    }

    pub fn keys(&self) -> impl DoubleEndedIterator<Item = &K> + '_ {
        self.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl DoubleEndedIterator<Item = &V> + '_ {
        self.iter().map(|(_, v)| v)
    }

    pub fn range<R: RangeBounds<K>>(&self, range: R) -> Iter<'_, K, V, A::Sum> {
        Iter {
            inner: self.tree.range(range),
        }
    }

    /// Zero or one entry, matching the multimap signature.
    pub fn equal_range(&self, key: &K) -> Iter<'_, K, V, A::Sum> {
        Iter {
            inner: self.tree.equal_range(key),
        }
    }

    pub fn count(&self, key: &K) -> usize {
        usize::from(self.contains_key(key))
    }

    // -------------------------------------------------------------------------
    // Storage
    // -------------------------------------------------------------------------

    pub fn clear(&mut self) {
        self.tree.clear();
    }

    pub fn reserve(&mut self, additional: usize) {
        self.tree.reserve(additional);
    }

    pub fn try_reserve(&mut self, additional: usize) -> Result<()> {
        self.tree.try_reserve(additional)
    }

    pub fn shrink_to_fit(&mut self) {
        self.tree.shrink_to_fit();
    }

    pub fn capacity(&self) -> usize {
        self.tree.capacity()
    }

    pub fn memory_usage(&self) -> usize {
        self.tree.memory_usage()
    }

    pub fn verify(&self) -> std::result::Result<(), InvariantViolation> {
        self.tree.verify(false)
    }

    pub(crate) fn tree(&self) -> &Tree<K, V, C, A, M> {
        &self.tree
    }

    pub(crate) fn tree_mut(&mut self) -> &mut Tree<K, V, C, A, M> {
        &mut self.tree
    }
}

impl<K, V, C, M> TrbMap<K, V, C, SubtreeSize, M>
where
    C: KeyCompare<K>,
    M: MostPolicy,
{
    /// Entry at in-order position `k`.
    pub fn select(&self, k: usize) -> Option<(&K, &V)> {
        self.entry_at(self.tree.select(k)?)
    }

    /// Number of keys less than `key`.
    pub fn rank(&self, key: &K) -> usize {
        self.tree.rank(key)
    }
}

impl<K, V, C, A, M> Default for TrbMap<K, V, C, A, M>
where
    C: KeyCompare<K> + Default,
    A: Aggregate<(K, V)>,
    M: MostPolicy,
{
    fn default() -> Self {
        Self::with_comparator(C::default())
    }
}

impl<K: Clone, V: Clone, C: Clone, A, M> Clone for TrbMap<K, V, C, A, M>
where
    A: Aggregate<(K, V)>,
    M: MostPolicy,
{
    fn clone(&self) -> Self {
        Self {
            tree: self.tree.clone(),
        }
    }
}

impl<K: fmt::Debug, V: fmt::Debug, C, A, M> fmt::Debug for TrbMap<K, V, C, A, M>
where
    C: KeyCompare<K>,
    A: Aggregate<(K, V)>,
    M: MostPolicy,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V, C, A, M> Extend<(K, V)> for TrbMap<K, V, C, A, M>
where
    C: KeyCompare<K>,
    A: Aggregate<(K, V)>,
    M: MostPolicy,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

impl<K, V, C, A, M> FromIterator<(K, V)> for TrbMap<K, V, C, A, M>
where
    C: KeyCompare<K> + Default,
    A: Aggregate<(K, V)>,
    M: MostPolicy,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::default();
        map.extend(iter);
        map
    }
}

impl<'a, K, V, C, A, M> IntoIterator for &'a TrbMap<K, V, C, A, M>
where
    C: KeyCompare<K>,
    A: Aggregate<(K, V)>,
    M: MostPolicy,
{
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V, A::Sum>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

// =============================================================================
// TrbMultiMap
// =============================================================================

/// Ordered map that keeps every inserted entry. Entries with equal keys
/// iterate in node-index order, which is insertion order until freed slots
/// get reused.
pub struct TrbMultiMap<K, V, C = OrdCompare, A = NoSum, M = CacheMost>
where
    A: Aggregate<(K, V)>,
    M: MostPolicy,
{
    tree: Tree<K, V, C, A, M>,
}

impl<K: Ord, V> TrbMultiMap<K, V> {
    pub fn new() -> Self {
        Self {
            tree: TrbTree::new(),
        }
    }
}

impl<K, V, C, A, M> TrbMultiMap<K, V, C, A, M>
where
    C: KeyCompare<K>,
    A: Aggregate<(K, V)>,
    M: MostPolicy,
{
    pub fn with_comparator(cmp: C) -> Self {
        Self {
            tree: TrbTree::with_comparator(cmp),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// # Panics
    ///
    /// If the node arena cannot grow.
    pub fn insert(&mut self, key: K, value: V) -> NodeId {
        self.tree.insert_multi((key, value))
    }

    pub fn try_insert(&mut self, key: K, value: V) -> Result<NodeId> {
        self.tree.try_insert_multi((key, value))
    }

    /// Value of the first entry with this key.
    pub fn get(&self, key: &K) -> Option<&V> {
        let id = self.tree.find_first(key)?;
        self.entry_at(id).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.tree.find(key).is_some()
    }

    pub fn count(&self, key: &K) -> usize {
        self.tree.count(key)
    }

    pub fn equal_range(&self, key: &K) -> Iter<'_, K, V, A::Sum> {
        Iter {
            inner: self.tree.equal_range(key),
        }
    }

    /// Values of every entry with this key, in order.
    pub fn get_all(&self, key: &K) -> impl DoubleEndedIterator<Item = &V> + '_ {
        self.equal_range(key).map(|(_, v)| v)
    }

    /// Remove the first entry with this key.
    pub fn remove_one(&mut self, key: &K) -> Option<V> {
        let id = self.tree.find_first(key)?;
        self.tree.remove_at(id).map(|(_, v)| v)
    }

    pub fn remove_all(&mut self, key: &K) -> usize {
        self.tree.remove_all(key)
    }

    pub fn remove_at(&mut self, id: NodeId) -> Option<(K, V)> {
        self.tree.remove_at(id)
    }

    pub fn find(&self, key: &K) -> Option<NodeId> {
        self.tree.find_first(key)
    }

    pub fn lower_bound(&self, key: &K) -> Option<NodeId> {
        self.tree.lower_bound(key)
    }

    pub fn upper_bound(&self, key: &K) -> Option<NodeId> {
        self.tree.upper_bound(key)
    }

    pub fn first(&self) -> Option<NodeId> {
        self.tree.first()
    }

    pub fn last(&self) -> Option<NodeId> {
        self.tree.last()
    }

    pub fn next(&self, id: NodeId) -> Option<NodeId> {
        self.tree.next(id)
    }

    pub fn prev(&self, id: NodeId) -> Option<NodeId> {
        self.tree.prev(id)
    }

    pub fn entry_at(&self, id: NodeId) -> Option<(&K, &V)> {
        self.tree.get(id).map(|(k, v)| (k, v))
    }

    pub fn value_at_mut(&mut self, id: NodeId) -> Option<&mut V> {
        self.tree.get_mut(id).map(|e| &mut e.1)
    }

    pub fn iter(&self) -> Iter<'_, K, V, A::Sum> {
        Iter {
            inner: self.tree.iter(),
        }
    }

    pub fn keys(&self) -> impl DoubleEndedIterator<Item = &K> + '_ {
        self.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl DoubleEndedIterator<Item = &V> + '_ {
        self.iter().map(|(_, v)| v)
    }

    pub fn range<R: RangeBounds<K>>(&self, range: R) -> Iter<'_, K, V, A::Sum> {
        Iter {
            inner: self.tree.range(range),
        }
    }

    pub fn clear(&mut self) {
        self.tree.clear();
    }

    pub fn reserve(&mut self, additional: usize) {
        self.tree.reserve(additional);
    }

    pub fn try_reserve(&mut self, additional: usize) -> Result<()> {
        self.tree.try_reserve(additional)
    }

    pub fn capacity(&self) -> usize {
        self.tree.capacity()
    }

    pub fn memory_usage(&self) -> usize {
        self.tree.memory_usage()
    }

    pub fn verify(&self) -> std::result::Result<(), InvariantViolation> {
        self.tree.verify(true)
    }

    pub(crate) fn tree(&self) -> &Tree<K, V, C, A, M> {
        &self.tree
    }

    pub(crate) fn tree_mut(&mut self) -> &mut Tree<K, V, C, A, M> {
        &mut self.tree
    }
}

impl<K, V, C, M> TrbMultiMap<K, V, C, SubtreeSize, M>
where
    C: KeyCompare<K>,
    M: MostPolicy,
{
    pub fn select(&self, k: usize) -> Option<(&K, &V)> {
        self.entry_at(self.tree.select(k)?)
    }

    pub fn rank(&self, key: &K) -> usize {
        self.tree.rank(key)
    }
}

impl<K, V, C, A, M> Default for TrbMultiMap<K, V, C, A, M>
where
    C: KeyCompare<K> + Default,
    A: Aggregate<(K, V)>,
    M: MostPolicy,
{
    fn default() -> Self {
        Self::with_comparator(C::default())
    }
}

impl<K: Clone, V: Clone, C: Clone, A, M> Clone for TrbMultiMap<K, V, C, A, M>
where
    A: Aggregate<(K, V)>,
    M: MostPolicy,
{
    fn clone(&self) -> Self {
        Self {
            tree: self.tree.clone(),
        }
    }
}

impl<K: fmt::Debug, V: fmt::Debug, C, A, M> fmt::Debug for TrbMultiMap<K, V, C, A, M>
where
    C: KeyCompare<K>,
    A: Aggregate<(K, V)>,
    M: MostPolicy,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<K, V, C, A, M> Extend<(K, V)> for TrbMultiMap<K, V, C, A, M>
where
    C: KeyCompare<K>,
    A: Aggregate<(K, V)>,
    M: MostPolicy,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

impl<K, V, C, A, M> FromIterator<(K, V)> for TrbMultiMap<K, V, C, A, M>
where
    C: KeyCompare<K> + Default,
    A: Aggregate<(K, V)>,
    M: MostPolicy,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::default();
        map.extend(iter);
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_replaces_value_keeps_len() {
        let mut m = TrbMap::new();
        assert_eq!(m.insert("b", 1), None);
        assert_eq!(m.insert("a", 2), None);
        assert_eq!(m.insert("b", 3), Some(1));
        assert_eq!(m.len(), 2);
        assert_eq!(m.get(&"b"), Some(&3));
        assert_eq!(m.iter().collect::<Vec<_>>(), vec![(&"a", &2), (&"b", &3)]);
    }

    #[test]
    fn test_remove_and_navigate() {
        let mut m: TrbMap<i32, ()> = [5, 3, 8].into_iter().map(|k| (k, ())).collect();
        assert_eq!(m.remove(&3), Some(()));
        assert!(m.get(&3).is_none());
        let five = m.find(&5).unwrap();
        let eight = m.next(five).unwrap();
        assert_eq!(m.entry_at(eight), Some((&8, &())));
        assert_eq!(m.next(eight), None);
        m.verify().unwrap();
    }

    #[test]
    fn test_get_mut_and_update() {
        let mut m = TrbMap::new();
        m.insert(1, String::from("x"));
        m.get_mut(&1).unwrap().push('y');
        assert_eq!(m.update(&1, |s| s.len()), Some(2));
        assert_eq!(m.get(&1).map(String::as_str), Some("xy"));
        assert_eq!(m.update(&2, |s| s.len()), None);
    }

    #[test]
    fn test_first_last_pop() {
        let mut m: TrbMap<i32, i32> = (0..10).map(|k| (k, k * k)).collect();
        assert_eq!(m.first_key_value(), Some((&0, &0)));
        assert_eq!(m.last_key_value(), Some((&9, &81)));
        assert_eq!(m.pop_first(), Some((0, 0)));
        assert_eq!(m.pop_last(), Some((9, 81)));
        assert_eq!(m.len(), 8);
        assert_eq!(m.keys().rev().next(), Some(&8));
    }

    #[test]
    fn test_select_rank_map() {
        let mut m: TrbMap<u32, char, OrdCompare, SubtreeSize> = TrbMap::default();
        for (i, c) in "hello".chars().enumerate() {
            m.insert(i as u32 * 10, c);
        }
        assert_eq!(m.select(1), Some((&10, &'e')));
        assert_eq!(m.rank(&25), 3);
        m.remove(&10);
        assert_eq!(m.select(1), Some((&20, &'l')));
    }

    #[test]
    fn test_multimap_equal_range_is_insertion_stable() {
        let mut m = TrbMultiMap::new();
        m.insert("b", 0);
        m.insert("a", 1);
        m.insert("a", 2);
        m.insert("c", 9);
        m.insert("a", 3);
        let run: Vec<i32> = m.get_all(&"a").copied().collect();
        assert_eq!(run, vec![1, 2, 3]);
        assert_eq!(m.count(&"a"), 3);
        assert_eq!(m.get(&"a"), Some(&1));
        assert_eq!(m.remove_one(&"a"), Some(1));
        assert_eq!(m.get_all(&"a").copied().collect::<Vec<_>>(), vec![2, 3]);
        assert_eq!(m.remove_all(&"a"), 2);
        assert_eq!(m.len(), 2);
        m.verify().unwrap();
    }
}
