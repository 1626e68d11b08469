//! Comparator-typed tree.
//!
//! [`TrbTree`] fixes how keys are extracted ([`KeyOf`]) and compared
//! ([`KeyCompare`]) and picks the descent from the comparator: a single
//! three-way call per level when it can, the lower-bound descent with one
//! trailing equality check when only `<` is available.

use std::fmt;
use std::marker::PhantomData;
use std::ops::{Bound, RangeBounds};

use crate::aggregate::{Aggregate, NoSum, SubtreeSize};
use crate::compare::{KeyCompare, KeyOf, OrdCompare};
use crate::engine::{CacheMost, MostPolicy};
use crate::link::NodeId;
use crate::raw::{Ids, Iter, RawTree};
use crate::{alloc_failed, InvariantViolation, Result};

pub struct TrbTree<T, X, C = OrdCompare, A = NoSum, M = CacheMost>
where
    X: KeyOf<T>,
    A: Aggregate<T>,
    M: MostPolicy,
{
    raw: RawTree<T, A, M>,
    cmp: C,
    _key: PhantomData<fn() -> X>,
}

impl<T, X, C, A, M> TrbTree<T, X, C, A, M>
where
    X: KeyOf<T>,
    C: KeyCompare<X::Key>,
    A: Aggregate<T>,
    M: MostPolicy,
{
    pub fn new() -> Self
    where
        C: Default,
    {
        Self::with_comparator(C::default())
    }

    pub fn with_comparator(cmp: C) -> Self {
        Self {
            raw: RawTree::new(),
            cmp,
            _key: PhantomData,
        }
    }

    pub fn with_capacity_and_comparator(capacity: usize, cmp: C) -> Self {
        Self {
            raw: RawTree::with_capacity(capacity),
            cmp,
            _key: PhantomData,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    pub fn comparator(&self) -> &C {
        &self.cmp
    }

    pub fn raw(&self) -> &RawTree<T, A, M> {
        &self.raw
    }

    // -------------------------------------------------------------------------
    // Lookup
    // -------------------------------------------------------------------------

    /// Some element equal to `key`. In a tree with repeated keys this is not
    /// necessarily the first of the run; see [`find_first`](Self::find_first).
    pub fn find(&self, key: &X::Key) -> Option<NodeId> {
        let cmp = &self.cmp;
        if C::THREE_WAY {
            self.raw.find_by(|v| cmp.compare(key, X::key(v)))
        } else {
            self.raw
                .find_by_less(|v| cmp.less(key, X::key(v)), |v| cmp.less(X::key(v), key))
        }
    }

    /// First element equal to `key`.
    pub fn find_first(&self, key: &X::Key) -> Option<NodeId> {
        let id = self.lower_bound(key)?;
        let v = self.raw.get(id)?;
        (!self.cmp.less(key, X::key(v))).then_some(id)
    }

    /// First element not less than `key`.
    pub fn lower_bound(&self, key: &X::Key) -> Option<NodeId> {
        let cmp = &self.cmp;
        self.raw.partition_point(|v| !cmp.less(X::key(v), key))
    }

    /// First element greater than `key`.
    pub fn upper_bound(&self, key: &X::Key) -> Option<NodeId> {
        let cmp = &self.cmp;
        self.raw.partition_point(|v| cmp.less(key, X::key(v)))
    }

    /// All elements equal to `key`, in order.
    pub fn equal_range(&self, key: &X::Key) -> Iter<'_, T, A::Sum> {
        self.span(self.lower_bound(key), self.upper_bound(key))
    }

    pub fn count(&self, key: &X::Key) -> usize {
        self.equal_range(key).count()
    }

    /// Elements whose keys fall in `range`.
    ///
    /// A range whose start sorts after its end is empty.
    pub fn range<R>(&self, range: R) -> Iter<'_, T, A::Sum>
    where
        R: RangeBounds<X::Key>,
    {
        let (start, end) = (range.start_bound(), range.end_bound());
        if let (Bound::Included(s) | Bound::Excluded(s), Bound::Included(e) | Bound::Excluded(e)) =
            (start, end)
        {
            if self.cmp.less(e, s) {
                return self.span(None, None);
            }
            let touching = !self.cmp.less(s, e);
            if touching
                && (matches!(start, Bound::Excluded(_)) || matches!(end, Bound::Excluded(_)))
            {
                return self.span(None, None);
            }
        }
        let first = match start {
            Bound::Included(k) => self.lower_bound(k),
            Bound::Excluded(k) => self.upper_bound(k),
            Bound::Unbounded => self.raw.first(),
        };
        let stop = match end {
            Bound::Included(k) => self.upper_bound(k),
            Bound::Excluded(k) => self.lower_bound(k),
            Bound::Unbounded => None,
        };
        self.span(first, stop)
    }

    /// From `first` up to, not including, `stop` (`None` = the end).
    fn span(&self, first: Option<NodeId>, stop: Option<NodeId>) -> Iter<'_, T, A::Sum> {
        if first.is_none() || first == stop {
            return self.raw.iter_between(None, None);
        }
        let last = match stop {
            Some(s) => self.raw.prev(s),
            None => self.raw.last(),
        };
        self.raw.iter_between(first, last)
    }

    // -------------------------------------------------------------------------
    // Handles
    // -------------------------------------------------------------------------

    #[inline]
    pub fn first(&self) -> Option<NodeId> {
        self.raw.first()
    }

    #[inline]
    pub fn last(&self) -> Option<NodeId> {
        self.raw.last()
    }

    #[inline]
    pub fn next(&self, id: NodeId) -> Option<NodeId> {
        self.raw.next(id)
    }

    #[inline]
    pub fn prev(&self, id: NodeId) -> Option<NodeId> {
        self.raw.prev(id)
    }

    #[inline]
    pub fn get(&self, id: NodeId) -> Option<&T> {
        self.raw.get(id)
    }

    /// See [`RawTree::get_mut`] for what may be changed.
    #[inline]
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut T> {
        self.raw.get_mut(id)
    }

    /// Mutate an element in place and refresh the aggregates above it.
    pub fn update_at<R>(&mut self, id: NodeId, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let cmp = &self.cmp;
        self.raw
            .update_at_by(id, |a, b| cmp.compare(X::key(a), X::key(b)), f)
    }

    // -------------------------------------------------------------------------
    // Insertion
    // -------------------------------------------------------------------------

    /// Insert unless an element with an equal key exists; on a match the
    /// rejected value is handed back together with the existing handle.
    pub fn try_insert_unique(&mut self, value: T) -> Result<(NodeId, Option<T>)> {
        let cmp = &self.cmp;
        if C::THREE_WAY {
            self.raw
                .try_insert_by(value, |a, b| cmp.compare(X::key(a), X::key(b)))
        } else {
            self.raw
                .try_insert_by_less(value, |a, b| cmp.less(X::key(a), X::key(b)))
        }
    }

    /// # Panics
    ///
    /// If the node arena cannot grow.
    pub fn insert_unique(&mut self, value: T) -> (NodeId, Option<T>) {
        self.try_insert_unique(value)
            .unwrap_or_else(|e| alloc_failed(e))
    }

    /// Insert after every element with an equal key already present
    /// (ties go by node index).
    pub fn try_insert_multi(&mut self, value: T) -> Result<NodeId> {
        let cmp = &self.cmp;
        self.raw
            .try_insert_multi_by(value, |a, b| cmp.compare(X::key(a), X::key(b)))
    }

    pub fn insert_multi(&mut self, value: T) -> NodeId {
        self.try_insert_multi(value)
            .unwrap_or_else(|e| alloc_failed(e))
    }

    // -------------------------------------------------------------------------
    // Removal
    // -------------------------------------------------------------------------

    /// Remove one element equal to `key`.
    pub fn remove_unique(&mut self, key: &X::Key) -> Option<T> {
        let cmp = &self.cmp;
        if C::THREE_WAY {
            self.raw.remove_by(|v| cmp.compare(key, X::key(v)))
        } else {
            self.raw
                .remove_by_less(|v| cmp.less(key, X::key(v)), |v| cmp.less(X::key(v), key))
        }
    }

    /// Remove the element behind `id`. `None` for a stale handle.
    pub fn remove_at(&mut self, id: NodeId) -> Option<T> {
        let cmp = &self.cmp;
        self.raw
            .remove_at_by(id, |a, b| cmp.compare(X::key(a), X::key(b)))
    }

    /// Remove every element equal to `key`; returns how many went.
    pub fn remove_all(&mut self, key: &X::Key) -> usize {
        let mut removed = 0;
        while let Some(id) = self.find_first(key) {
            self.remove_at(id);
            removed += 1;
        }
        removed
    }

    pub fn pop_first(&mut self) -> Option<T> {
        let id = self.first()?;
        self.remove_at(id)
    }

    pub fn pop_last(&mut self) -> Option<T> {
        let id = self.last()?;
        self.remove_at(id)
    }

    // -------------------------------------------------------------------------
    // Iteration and storage
    // -------------------------------------------------------------------------

    pub fn iter(&self) -> Iter<'_, T, A::Sum> {
        self.raw.iter()
    }

    pub fn ids(&self) -> Ids<'_, T, A::Sum> {
        self.raw.ids()
    }

    pub fn clear(&mut self) {
        self.raw.clear();
    }

    pub fn try_reserve(&mut self, additional: usize) -> Result<()> {
        self.raw.try_reserve(additional)
    }

    pub fn reserve(&mut self, additional: usize) {
        self.raw.reserve(additional);
    }

    pub fn shrink_to_fit(&mut self) {
        self.raw.shrink_to_fit();
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.raw.capacity()
    }

    pub fn memory_usage(&self) -> usize {
        self.raw.memory_usage()
    }

    pub fn height(&self) -> usize {
        self.raw.height()
    }

    /// Full invariant check. `multi` allows neighbouring equal keys.
    pub fn verify(&self, multi: bool) -> std::result::Result<(), InvariantViolation> {
        let cmp = &self.cmp;
        self.raw
            .verify_by(multi, |a, b| cmp.compare(X::key(a), X::key(b)))
    }
}

impl<T, X, C, M> TrbTree<T, X, C, SubtreeSize, M>
where
    X: KeyOf<T>,
    C: KeyCompare<X::Key>,
    M: MostPolicy,
{
    /// Element at in-order position `k`.
    pub fn select(&self, k: usize) -> Option<NodeId> {
        self.raw.select(k)
    }

    /// Number of elements whose key is less than `key`.
    pub fn rank(&self, key: &X::Key) -> usize {
        let cmp = &self.cmp;
        self.raw.rank_by(|v| !cmp.less(X::key(v), key))
    }
}

impl<T, X, C, A, M> Default for TrbTree<T, X, C, A, M>
where
    X: KeyOf<T>,
    C: KeyCompare<X::Key> + Default,
    A: Aggregate<T>,
    M: MostPolicy,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, X, C, A, M> Clone for TrbTree<T, X, C, A, M>
where
    T: Clone,
    X: KeyOf<T>,
    C: Clone,
    A: Aggregate<T>,
    M: MostPolicy,
{
    fn clone(&self) -> Self {
        Self {
            raw: self.raw.clone(),
            cmp: self.cmp.clone(),
            _key: PhantomData,
        }
    }
}

impl<T, X, C, A, M> fmt::Debug for TrbTree<T, X, C, A, M>
where
    T: fmt::Debug,
    X: KeyOf<T>,
    A: Aggregate<T>,
    M: MostPolicy,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.raw, f)
    }
}
