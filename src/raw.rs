//! Closure-driven tree over one arena.
//!
//! `RawTree` knows nothing about keys: every search takes an ordering of the
//! probe against a stored element. The typed containers build on it, and so
//! can external adaptors that keep their keys somewhere else.

use std::cmp::Ordering;
use std::fmt;
use std::iter::FusedIterator;
use std::marker::PhantomData;

use crate::aggregate::{Aggregate, NoSum, SubtreeSize};
use crate::arena::NodeArena;
use crate::engine::{
    self, move_next, move_prev,
    path::{find_path, find_path_by_less, partition_point},
    verify, CacheMost, MostPolicy, Path, TreeHead,
};
use crate::link::{Dir, NodeId, NIL};
use crate::{alloc_failed, InvariantViolation, Result};

pub struct RawTree<T, A: Aggregate<T> = NoSum, M: MostPolicy = CacheMost> {
    arena: NodeArena<T, A::Sum>,
    head: TreeHead<M>,
    _agg: PhantomData<A>,
}

impl<T, A: Aggregate<T>, M: MostPolicy> RawTree<T, A, M> {
    pub fn new() -> Self {
        Self {
            arena: NodeArena::new(),
            head: TreeHead::new(),
            _agg: PhantomData,
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            arena: NodeArena::with_capacity(capacity),
            head: TreeHead::new(),
            _agg: PhantomData,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.head.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.head.is_empty()
    }

    // -------------------------------------------------------------------------
    // Navigation
    // -------------------------------------------------------------------------

    #[inline]
    pub fn first(&self) -> Option<NodeId> {
        NodeId::from_raw(self.head.first(&self.arena))
    }

    #[inline]
    pub fn last(&self) -> Option<NodeId> {
        NodeId::from_raw(self.head.last(&self.arena))
    }

    /// In-order successor. `None` past the end or for a stale handle.
    #[inline]
    pub fn next(&self, id: NodeId) -> Option<NodeId> {
        if !self.arena.is_live(id.0) {
            return None;
        }
        NodeId::from_raw(move_next(&self.arena, id.0))
    }

    #[inline]
    pub fn prev(&self, id: NodeId) -> Option<NodeId> {
        if !self.arena.is_live(id.0) {
            return None;
        }
        NodeId::from_raw(move_prev(&self.arena, id.0))
    }

    #[inline]
    pub fn get(&self, id: NodeId) -> Option<&T> {
        self.arena.get(id.0)
    }

    /// Mutable access to a stored element.
    ///
    /// Changing the part of the element the tree is ordered by, or anything
    /// its aggregate depends on, is a logic error; the tree is then left in an
    /// unspecified (but memory-safe) state.
    #[inline]
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut T> {
        self.arena.get_mut(id.0)
    }

    // -------------------------------------------------------------------------
    // Search
    // -------------------------------------------------------------------------

    /// Three-way lookup. `ord(node)` orders the probe against `node`.
    pub fn find_by(&self, mut ord: impl FnMut(&T) -> Ordering) -> Option<NodeId> {
        let mut path = Path::new();
        if find_path(&self.arena, self.head.root, &mut path, |_, v| ord(v)) {
            Some(NodeId(path.top().0))
        } else {
            None
        }
    }

    /// Lookup with a strict order only: `probe_less(node)` is `probe < node`,
    /// `node_less(node)` is `node < probe`. The second is called at most once.
    pub fn find_by_less(
        &self,
        probe_less: impl FnMut(&T) -> bool,
        node_less: impl FnMut(&T) -> bool,
    ) -> Option<NodeId> {
        let mut path = Path::new();
        if find_path_by_less(&self.arena, self.head.root, &mut path, probe_less, node_less) {
            Some(NodeId(path.top().0))
        } else {
            None
        }
    }

    /// First element for which `pred` holds. `pred` must be false on a
    /// prefix of the in-order sequence and true on the rest.
    pub fn partition_point(&self, mut pred: impl FnMut(&T) -> bool) -> Option<NodeId> {
        NodeId::from_raw(partition_point(&self.arena, self.head.root, |_, v| pred(v)))
    }

    // -------------------------------------------------------------------------
    // Insertion
    // -------------------------------------------------------------------------

    /// Insert unless an equal element exists.
    ///
    /// `ord(new, node)` orders the new element against a stored one. On a
    /// match the tree is unchanged and `value` comes back as `Some`.
    pub fn try_insert_by(
        &mut self,
        value: T,
        mut ord: impl FnMut(&T, &T) -> Ordering,
    ) -> Result<(NodeId, Option<T>)> {
        let mut path = Path::new();
        if find_path(&self.arena, self.head.root, &mut path, |_, v| ord(&value, v)) {
            return Ok((NodeId(path.top().0), Some(value)));
        }
        self.link_new(&path, value).map(|id| (id, None))
    }

    /// [`try_insert_by`](Self::try_insert_by) for strict-order comparators.
    /// `less(a, b)` is `a < b`.
    pub fn try_insert_by_less(
        &mut self,
        value: T,
        less: impl Fn(&T, &T) -> bool,
    ) -> Result<(NodeId, Option<T>)> {
        let mut path = Path::new();
        let found = find_path_by_less(
            &self.arena,
            self.head.root,
            &mut path,
            |v| less(&value, v),
            |v| less(v, &value),
        );
        if found {
            return Ok((NodeId(path.top().0), Some(value)));
        }
        self.link_new(&path, value).map(|id| (id, None))
    }

    /// Insert always. Ties are broken by node index, so equal elements
    /// iterate in slot order.
    pub fn try_insert_multi_by(
        &mut self,
        value: T,
        mut ord: impl FnMut(&T, &T) -> Ordering,
    ) -> Result<NodeId> {
        let sum = A::init(&value);
        let n = self.arena.alloc(value, sum)?;
        let mut path = Path::new();
        let arena = &self.arena;
        let new = arena.value(n);
        find_path(arena, self.head.root, &mut path, |idx, v| {
            ord(new, v).then(n.cmp(&idx))
        });
        engine::insert::<T, A, M>(&mut self.arena, &mut self.head, &path, n);
        Ok(NodeId(n))
    }

    pub fn insert_multi_by(&mut self, value: T, ord: impl FnMut(&T, &T) -> Ordering) -> NodeId {
        self.try_insert_multi_by(value, ord)
            .unwrap_or_else(|e| alloc_failed(e))
    }

    fn link_new(&mut self, path: &Path, value: T) -> Result<NodeId> {
        let sum = A::init(&value);
        let n = self.arena.alloc(value, sum)?;
        engine::insert::<T, A, M>(&mut self.arena, &mut self.head, path, n);
        Ok(NodeId(n))
    }

    /// Run `f` on the element behind `id`, then refresh the aggregates on
    /// its path to the root.
    ///
    /// `f` must not change the element's position in the order. `ord` is the
    /// ordering the tree was built with.
    pub fn update_at_by<R>(
        &mut self,
        id: NodeId,
        mut ord: impl FnMut(&T, &T) -> Ordering,
        f: impl FnOnce(&mut T) -> R,
    ) -> Option<R> {
        if !self.arena.is_live(id.0) {
            return None;
        }
        if !A::ENABLED {
            return Some(f(self.arena.value_mut(id.0)));
        }
        let mut path = Path::new();
        let arena = &self.arena;
        let target = arena.value(id.0);
        let found = find_path(arena, self.head.root, &mut path, |idx, v| {
            ord(target, v).then(id.0.cmp(&idx))
        });
        assert!(found, "node {} is not reachable from its tree", id.0);
        let out = f(self.arena.value_mut(id.0));
        for i in (1..path.len()).rev() {
            engine::update_sum::<T, A>(&mut self.arena, path.node(i));
        }
        Some(out)
    }

    // -------------------------------------------------------------------------
    // Removal
    // -------------------------------------------------------------------------

    /// Remove the element behind `id`.
    ///
    /// `ord(a, b)` must be the ordering the tree was built with; the exact
    /// node is found by `(ordering, node index)`. A stale handle is a no-op.
    pub fn remove_at_by(
        &mut self,
        id: NodeId,
        mut ord: impl FnMut(&T, &T) -> Ordering,
    ) -> Option<T> {
        if !self.arena.is_live(id.0) {
            return None;
        }
        let mut path = Path::new();
        let arena = &self.arena;
        let target = arena.value(id.0);
        let found = find_path(arena, self.head.root, &mut path, |idx, v| {
            ord(target, v).then(id.0.cmp(&idx))
        });
        assert!(found, "node {} is not reachable from its tree", id.0);
        Some(self.unlink(&mut path))
    }

    /// Remove one element equal to the probe. `ord(node)` orders the probe
    /// against `node`.
    pub fn remove_by(&mut self, mut ord: impl FnMut(&T) -> Ordering) -> Option<T> {
        let mut path = Path::new();
        if !find_path(&self.arena, self.head.root, &mut path, |_, v| ord(v)) {
            return None;
        }
        Some(self.unlink(&mut path))
    }

    pub fn remove_by_less(
        &mut self,
        probe_less: impl FnMut(&T) -> bool,
        node_less: impl FnMut(&T) -> bool,
    ) -> Option<T> {
        let mut path = Path::new();
        if !find_path_by_less(&self.arena, self.head.root, &mut path, probe_less, node_less) {
            return None;
        }
        Some(self.unlink(&mut path))
    }

    fn unlink(&mut self, path: &mut Path) -> T {
        let n = engine::remove::<T, A, M>(&mut self.arena, &mut self.head, path);
        self.arena.free(n)
    }

    // -------------------------------------------------------------------------
    // Iteration
    // -------------------------------------------------------------------------

    pub fn iter(&self) -> Iter<'_, T, A::Sum> {
        Iter {
            arena: &self.arena,
            walk: Walk::new(self.head.first(&self.arena), self.head.last(&self.arena)),
        }
    }

    /// Elements from `first` through `last`, both inclusive.
    ///
    /// `first` must not come after `last`. Either bound being `None` gives an
    /// empty iterator.
    pub fn iter_between(&self, first: Option<NodeId>, last: Option<NodeId>) -> Iter<'_, T, A::Sum> {
        let walk = match (first, last) {
            (Some(a), Some(b)) if self.arena.is_live(a.0) && self.arena.is_live(b.0) => {
                Walk::new(a.0, b.0)
            }
            _ => Walk::new(NIL, NIL),
        };
        Iter {
            arena: &self.arena,
            walk,
        }
    }

    pub fn ids(&self) -> Ids<'_, T, A::Sum> {
        Ids {
            arena: &self.arena,
            walk: Walk::new(self.head.first(&self.arena), self.head.last(&self.arena)),
        }
    }

    // -------------------------------------------------------------------------
    // Storage
    // -------------------------------------------------------------------------

    pub fn try_reserve(&mut self, additional: usize) -> Result<()> {
        self.arena.try_reserve(additional)
    }

    pub fn reserve(&mut self, additional: usize) {
        if let Err(e) = self.arena.try_reserve(additional) {
            alloc_failed(e);
        }
    }

    /// Drop every element and every slot. Capacity is kept.
    pub fn clear(&mut self) {
        self.arena.clear();
        self.head.reset();
    }

    pub fn shrink_to_fit(&mut self) {
        self.arena.shrink_to_fit();
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.arena.capacity()
    }

    pub fn memory_usage(&self) -> usize {
        std::mem::size_of::<Self>() + self.arena.memory_usage()
    }

    // -------------------------------------------------------------------------
    // Checks
    // -------------------------------------------------------------------------

    /// Longest root-to-node path.
    pub fn height(&self) -> usize {
        engine::height(&self.arena, self.head.root)
    }

    /// Check every structural invariant and the element order.
    ///
    /// `ord(a, b)` is the ordering the tree was built with. With
    /// `allow_equal` set, neighbours may compare equal (multi trees).
    pub fn verify_by(
        &self,
        allow_equal: bool,
        mut ord: impl FnMut(&T, &T) -> Ordering,
    ) -> std::result::Result<(), InvariantViolation> {
        let order = verify::verify_structure(&self.arena, &self.head)?;
        for w in order.windows(2) {
            let c = ord(self.arena.value(w[0]), self.arena.value(w[1]));
            let ok = match c {
                Ordering::Less => true,
                Ordering::Equal => allow_equal && w[0] < w[1],
                Ordering::Greater => false,
            };
            if !ok {
                return Err(InvariantViolation::Order {
                    prev: w[0],
                    next: w[1],
                });
            }
        }
        self.check_sum()
    }

    /// Recompute every aggregate and compare with the stored one.
    pub fn check_sum(&self) -> std::result::Result<(), InvariantViolation> {
        verify::check_sum::<T, A>(&self.arena, self.head.root)
    }
}

// =============================================================================
// Order statistics
// =============================================================================

impl<T, M: MostPolicy> RawTree<T, SubtreeSize, M> {
    #[inline]
    fn size_of(&self, idx: u32, dir: Dir) -> usize {
        let l = self.arena.links(idx);
        if l.is_child(dir) {
            *self.arena.sum(l.link(dir))
        } else {
            0
        }
    }

    /// Element at in-order position `k` (0-based).
    pub fn select(&self, mut k: usize) -> Option<NodeId> {
        if k >= self.len() {
            return None;
        }
        let mut p = self.head.root;
        loop {
            let left = self.size_of(p, Dir::Left);
            match k.cmp(&left) {
                Ordering::Less => p = self.arena.links(p).link(Dir::Left),
                Ordering::Equal => return Some(NodeId(p)),
                Ordering::Greater => {
                    k -= left + 1;
                    p = self.arena.links(p).link(Dir::Right);
                }
            }
        }
    }

    /// Number of elements before the first one for which `pred` holds.
    /// Same contract on `pred` as [`partition_point`](Self::partition_point).
    pub fn rank_by(&self, mut pred: impl FnMut(&T) -> bool) -> usize {
        let mut rank = 0;
        let mut p = self.head.root;
        while p != NIL {
            let l = *self.arena.links(p);
            let dir = if pred(self.arena.value(p)) {
                Dir::Left
            } else {
                rank += self.size_of(p, Dir::Left) + 1;
                Dir::Right
            };
            if l.is_thread(dir) {
                break;
            }
            p = l.link(dir);
        }
        rank
    }
}

impl<T, A: Aggregate<T>, M: MostPolicy> Default for RawTree<T, A, M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone, A: Aggregate<T>, M: MostPolicy> Clone for RawTree<T, A, M> {
    fn clone(&self) -> Self {
        Self {
            arena: self.arena.clone(),
            head: self.head.clone(),
            _agg: PhantomData,
        }
    }
}

impl<T: fmt::Debug, A: Aggregate<T>, M: MostPolicy> fmt::Debug for RawTree<T, A, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

// =============================================================================
// Iterators
// =============================================================================

/// Threaded walk between two inclusive endpoints.
#[derive(Clone, Copy)]
struct Walk {
    front: u32,
    back: u32,
}

impl Walk {
    fn new(front: u32, back: u32) -> Self {
        if front == NIL || back == NIL {
            Self {
                front: NIL,
                back: NIL,
            }
        } else {
            Self { front, back }
        }
    }

    #[inline]
    fn next<T, S>(&mut self, arena: &NodeArena<T, S>) -> Option<u32> {
        if self.front == NIL {
            return None;
        }
        let cur = self.front;
        if cur == self.back {
            *self = Self::new(NIL, NIL);
        } else {
            self.front = move_next(arena, cur);
        }
        Some(cur)
    }

    #[inline]
    fn next_back<T, S>(&mut self, arena: &NodeArena<T, S>) -> Option<u32> {
        if self.back == NIL {
            return None;
        }
        let cur = self.back;
        if cur == self.front {
            *self = Self::new(NIL, NIL);
        } else {
            self.back = move_prev(arena, cur);
        }
        Some(cur)
    }
}

pub struct Iter<'a, T, S> {
    arena: &'a NodeArena<T, S>,
    walk: Walk,
}

impl<'a, T, S> Iter<'a, T, S> {
    /// Next element together with its handle.
    pub fn next_entry(&mut self) -> Option<(NodeId, &'a T)> {
        let idx = self.walk.next(self.arena)?;
        Some((NodeId(idx), self.arena.value(idx)))
    }
}

impl<'a, T, S> Iterator for Iter<'a, T, S> {
    type Item = &'a T;

    #[inline]
    fn next(&mut self) -> Option<&'a T> {
        let idx = self.walk.next(self.arena)?;
        Some(self.arena.value(idx))
    }
}

impl<'a, T, S> DoubleEndedIterator for Iter<'a, T, S> {
    #[inline]
    fn next_back(&mut self) -> Option<&'a T> {
        let idx = self.walk.next_back(self.arena)?;
        Some(self.arena.value(idx))
    }
}

impl<T, S> FusedIterator for Iter<'_, T, S> {}

impl<T, S> Clone for Iter<'_, T, S> {
    fn clone(&self) -> Self {
        Self {
            arena: self.arena,
            walk: self.walk,
        }
    }
}

pub struct Ids<'a, T, S> {
    arena: &'a NodeArena<T, S>,
    walk: Walk,
}

impl<T, S> Iterator for Ids<'_, T, S> {
    type Item = NodeId;

    #[inline]
    fn next(&mut self) -> Option<NodeId> {
        self.walk.next(self.arena).map(NodeId)
    }
}

impl<T, S> DoubleEndedIterator for Ids<'_, T, S> {
    #[inline]
    fn next_back(&mut self) -> Option<NodeId> {
        self.walk.next_back(self.arena).map(NodeId)
    }
}

impl<T, S> FusedIterator for Ids<'_, T, S> {}

#[cfg(test)]
mod tests {
    use super::*;

    fn by_value(a: &u32, b: &u32) -> Ordering {
        a.cmp(b)
    }

    fn tree(keys: &[u32]) -> RawTree<u32, SubtreeSize> {
        let mut t = RawTree::new();
        for &k in keys {
            t.try_insert_by(k, by_value).unwrap();
        }
        t
    }

    #[test]
    fn test_duplicate_insert_returns_value() {
        let mut t = tree(&[1, 2, 3]);
        let (id, rejected) = t.try_insert_by(2, by_value).unwrap();
        assert_eq!(rejected, Some(2));
        assert_eq!(t.get(id), Some(&2));
        assert_eq!(t.len(), 3);
    }

    #[test]
    fn test_less_only_insert_and_find() {
        let mut t: RawTree<u32> = RawTree::new();
        for k in [5, 1, 9, 3, 7] {
            let (_, rejected) = t.try_insert_by_less(k, |a, b| a < b).unwrap();
            assert!(rejected.is_none());
        }
        assert_eq!(t.try_insert_by_less(3, |a, b| a < b).unwrap().1, Some(3));
        let id = t.find_by_less(|v| 7 < *v, |v| *v < 7).unwrap();
        assert_eq!(t.get(id), Some(&7));
        assert!(t.find_by_less(|v| 4 < *v, |v| *v < 4).is_none());
        assert_eq!(t.remove_by_less(|v| 1 < *v, |v| *v < 1), Some(1));
        assert_eq!(t.iter().copied().collect::<Vec<_>>(), vec![3, 5, 7, 9]);
        t.verify_by(false, by_value).unwrap();
    }

    #[test]
    fn test_stale_handle_reads_none() {
        let mut t = tree(&[10, 20, 30]);
        let id = t.find_by(|v| 20.cmp(v)).unwrap();
        assert_eq!(t.remove_at_by(id, by_value), Some(20));
        assert_eq!(t.get(id), None);
        assert_eq!(t.next(id), None);
        assert_eq!(t.remove_at_by(id, by_value), None);
        t.verify_by(false, by_value).unwrap();
    }

    #[test]
    fn test_handles_survive_other_removals() {
        let mut t = tree(&(0..64).collect::<Vec<_>>());
        let keep = t.find_by(|v| 40.cmp(v)).unwrap();
        for k in (0..64).filter(|k| k % 2 == 1) {
            t.remove_by(|v| k.cmp(v));
        }
        assert_eq!(t.get(keep), Some(&40));
        let next = t.next(keep).unwrap();
        assert_eq!(t.get(next), Some(&42));
    }

    #[test]
    fn test_multi_equal_run_in_slot_order() {
        let mut t: RawTree<(u32, char)> = RawTree::new();
        let key = |a: &(u32, char), b: &(u32, char)| a.0.cmp(&b.0);
        for (k, c) in [(1, 'a'), (0, 'x'), (1, 'b'), (2, 'y'), (1, 'c')] {
            t.insert_multi_by((k, c), key);
        }
        let got: String = t.iter().map(|e| e.1).collect();
        assert_eq!(got, "xabcy");
        t.verify_by(true, key).unwrap();

        let b = t.find_by(|e| 1.cmp(&e.0).then('b'.cmp(&e.1))).unwrap();
        assert_eq!(t.remove_at_by(b, key), Some((1, 'b')));
        let got: String = t.iter().map(|e| e.1).collect();
        assert_eq!(got, "xacy");
    }

    #[test]
    fn test_iter_between_and_back() {
        let t = tree(&[1, 2, 3, 4, 5, 6]);
        let a = t.find_by(|v| 2.cmp(v));
        let b = t.find_by(|v| 5.cmp(v));
        let mid: Vec<u32> = t.iter_between(a, b).copied().collect();
        assert_eq!(mid, vec![2, 3, 4, 5]);
        let back: Vec<u32> = t.iter_between(a, b).rev().copied().collect();
        assert_eq!(back, vec![5, 4, 3, 2]);

        let mut it = t.iter();
        assert_eq!(it.next(), Some(&1));
        assert_eq!(it.next_back(), Some(&6));
        assert_eq!(it.by_ref().count(), 4);
        assert_eq!(it.next(), None);
        assert_eq!(it.next_back(), None);

        assert_eq!(t.iter_between(a, None).count(), 0);
    }

    #[test]
    fn test_select_and_rank() {
        let keys: Vec<u32> = (0..200).map(|k| k * 5).collect();
        let mut t = tree(&keys);
        for k in (0..200).step_by(7) {
            t.remove_by(|v| (k * 5).cmp(v));
        }
        let model: Vec<u32> = t.iter().copied().collect();
        for (i, &k) in model.iter().enumerate() {
            assert_eq!(t.get(t.select(i).unwrap()), Some(&k));
            assert_eq!(t.rank_by(|v| *v >= k), i);
        }
        assert!(t.select(model.len()).is_none());
        assert_eq!(t.rank_by(|_| false), model.len());
        t.check_sum().unwrap();
    }

    #[test]
    fn test_clear_keeps_capacity() {
        let mut t = tree(&(0..100).collect::<Vec<_>>());
        let cap = t.capacity();
        t.clear();
        assert!(t.is_empty());
        assert_eq!(t.first(), None);
        assert_eq!(t.capacity(), cap);
        t.try_insert_by(7, by_value).unwrap();
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn test_verify_reports_order() {
        let mut t = tree(&[1, 2, 3]);
        let id = t.find_by(|v| 1.cmp(v)).unwrap();
        *t.get_mut(id).unwrap() = 9;
        assert!(matches!(
            t.verify_by(false, by_value),
            Err(InvariantViolation::Order { .. })
        ));
    }
}
