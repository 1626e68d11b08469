//! Ordered sets: [`TrbSet`] and [`TrbMultiSet`].

use std::fmt;
use std::ops::RangeBounds;

use crate::aggregate::{Aggregate, NoSum, SubtreeSize};
use crate::compare::{Identity, KeyCompare, OrdCompare};
use crate::engine::{CacheMost, MostPolicy};
use crate::link::NodeId;
use crate::raw::Iter;
use crate::tree::TrbTree;
use crate::{alloc_failed, InvariantViolation, Result};

type Tree<T, C, A, M> = TrbTree<T, Identity<T>, C, A, M>;

/// Ordered set of unique elements.
pub struct TrbSet<T, C = OrdCompare, A = NoSum, M = CacheMost>
where
    A: Aggregate<T>,
    M: MostPolicy,
{
    tree: Tree<T, C, A, M>,
}

impl<T: Ord> TrbSet<T> {
    pub fn new() -> Self {
        Self {
            tree: TrbTree::new(),
        }
    }
}

impl<T, C, A, M> TrbSet<T, C, A, M>
where
    C: KeyCompare<T>,
    A: Aggregate<T>,
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

    /// `true` if the value was not present.
    pub fn insert(&mut self, value: T) -> bool {
        self.try_insert(value)
            .unwrap_or_else(|e| alloc_failed(e))
    }

    pub fn try_insert(&mut self, value: T) -> Result<bool> {
        let (_, rejected) = self.tree.try_insert_unique(value)?;
        Ok(rejected.is_none())
    }

    /// Insert and return the handle of the stored element together with the
    /// rejected value, if an equal one was already present.
    pub fn insert_unique(&mut self, value: T) -> (NodeId, Option<T>) {
        self.tree.insert_unique(value)
    }

    pub fn contains(&self, value: &T) -> bool {
        self.tree.find(value).is_some()
    }

    pub fn get(&self, value: &T) -> Option<&T> {
        self.tree.get(self.tree.find(value)?)
    }

    pub fn remove(&mut self, value: &T) -> bool {
        self.take(value).is_some()
    }

    pub fn take(&mut self, value: &T) -> Option<T> {
        self.tree.remove_unique(value)
    }

    pub fn find(&self, value: &T) -> Option<NodeId> {
        self.tree.find(value)
    }

    pub fn lower_bound(&self, value: &T) -> Option<NodeId> {
        self.tree.lower_bound(value)
    }

    pub fn upper_bound(&self, value: &T) -> Option<NodeId> {
        self.tree.upper_bound(value)
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

    pub fn get_at(&self, id: NodeId) -> Option<&T> {
        self.tree.get(id)
    }

    pub fn remove_at(&mut self, id: NodeId) -> Option<T> {
        self.tree.remove_at(id)
    }

    pub fn pop_first(&mut self) -> Option<T> {
        self.tree.pop_first()
    }

    pub fn pop_last(&mut self) -> Option<T> {
        self.tree.pop_last()
    }

    pub fn iter(&self) -> Iter<'_, T, A::Sum> {
        self.tree.iter()
    }

    pub fn range<R: RangeBounds<T>>(&self, range: R) -> Iter<'_, T, A::Sum> {
        self.tree.range(range)
    }

    pub fn equal_range(&self, value: &T) -> Iter<'_, T, A::Sum> {
        self.tree.equal_range(value)
    }

    pub fn count(&self, value: &T) -> usize {
        usize::from(self.contains(value))
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

    pub fn shrink_to_fit(&mut self) {
        self.tree.shrink_to_fit();
    }

    pub fn capacity(&self) -> usize {
        self.tree.capacity()
    }

    pub fn memory_usage(&self) -> usize {
        self.tree.memory_usage()
    }

    pub fn height(&self) -> usize {
        self.tree.height()
    }

    pub fn verify(&self) -> std::result::Result<(), InvariantViolation> {
        self.tree.verify(false)
    }

    pub(crate) fn tree(&self) -> &Tree<T, C, A, M> {
        &self.tree
    }

    pub(crate) fn tree_mut(&mut self) -> &mut Tree<T, C, A, M> {
        &mut self.tree
    }
}

impl<T, C, M> TrbSet<T, C, SubtreeSize, M>
where
    C: KeyCompare<T>,
    M: MostPolicy,
{
    pub fn select(&self, k: usize) -> Option<&T> {
        self.tree.get(self.tree.select(k)?)
    }

    pub fn rank(&self, value: &T) -> usize {
        self.tree.rank(value)
    }
}

impl<T, C, A, M> Default for TrbSet<T, C, A, M>
where
    C: KeyCompare<T> + Default,
    A: Aggregate<T>,
    M: MostPolicy,
{
    fn default() -> Self {
        Self::with_comparator(C::default())
    }
}

impl<T: Clone, C: Clone, A, M> Clone for TrbSet<T, C, A, M>
where
    A: Aggregate<T>,
    M: MostPolicy,
{
    fn clone(&self) -> Self {
        Self {
            tree: self.tree.clone(),
        }
    }
}

impl<T: fmt::Debug, C, A, M> fmt::Debug for TrbSet<T, C, A, M>
where
    C: KeyCompare<T>,
    A: Aggregate<T>,
    M: MostPolicy,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<T, C, A, M> Extend<T> for TrbSet<T, C, A, M>
where
    C: KeyCompare<T>,
    A: Aggregate<T>,
    M: MostPolicy,
{
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for v in iter {
            self.insert(v);
        }
    }
}

impl<T, C, A, M> FromIterator<T> for TrbSet<T, C, A, M>
where
    C: KeyCompare<T> + Default,
    A: Aggregate<T>,
    M: MostPolicy,
{
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut set = Self::default();
        set.extend(iter);
        set
    }
}

impl<'a, T, C, A, M> IntoIterator for &'a TrbSet<T, C, A, M>
where
    C: KeyCompare<T>,
    A: Aggregate<T>,
    M: MostPolicy,
{
    type Item = &'a T;
    type IntoIter = Iter<'a, T, A::Sum>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

// =============================================================================
// TrbMultiSet
// =============================================================================

/// Ordered bag. Equal elements iterate in node-index order.
pub struct TrbMultiSet<T, C = OrdCompare, A = NoSum, M = CacheMost>
where
    A: Aggregate<T>,
    M: MostPolicy,
{
    tree: Tree<T, C, A, M>,
}

impl<T: Ord> TrbMultiSet<T> {
    pub fn new() -> Self {
        Self {
            tree: TrbTree::new(),
        }
    }
}

impl<T, C, A, M> TrbMultiSet<T, C, A, M>
where
    C: KeyCompare<T>,
    A: Aggregate<T>,
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

    pub fn insert(&mut self, value: T) -> NodeId {
        self.tree.insert_multi(value)
    }

    pub fn try_insert(&mut self, value: T) -> Result<NodeId> {
        self.tree.try_insert_multi(value)
    }

    pub fn contains(&self, value: &T) -> bool {
        self.tree.find(value).is_some()
    }

    pub fn count(&self, value: &T) -> usize {
        self.tree.count(value)
    }

    pub fn equal_range(&self, value: &T) -> Iter<'_, T, A::Sum> {
        self.tree.equal_range(value)
    }

    /// Remove one occurrence (the first in order).
    pub fn remove_one(&mut self, value: &T) -> bool {
        match self.tree.find_first(value) {
            Some(id) => self.tree.remove_at(id).is_some(),
            None => false,
        }
    }

    pub fn remove_all(&mut self, value: &T) -> usize {
        self.tree.remove_all(value)
    }

    pub fn remove_at(&mut self, id: NodeId) -> Option<T> {
        self.tree.remove_at(id)
    }

    pub fn find(&self, value: &T) -> Option<NodeId> {
        self.tree.find_first(value)
    }

    pub fn lower_bound(&self, value: &T) -> Option<NodeId> {
        self.tree.lower_bound(value)
    }

    pub fn upper_bound(&self, value: &T) -> Option<NodeId> {
        self.tree.upper_bound(value)
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

    pub fn get_at(&self, id: NodeId) -> Option<&T> {
        self.tree.get(id)
    }

    pub fn iter(&self) -> Iter<'_, T, A::Sum> {
        self.tree.iter()
    }

    pub fn range<R: RangeBounds<T>>(&self, range: R) -> Iter<'_, T, A::Sum> {
        self.tree.range(range)
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

    pub(crate) fn tree(&self) -> &Tree<T, C, A, M> {
        &self.tree
    }

    pub(crate) fn tree_mut(&mut self) -> &mut Tree<T, C, A, M> {
        &mut self.tree
    }
}

impl<T, C, M> TrbMultiSet<T, C, SubtreeSize, M>
where
    C: KeyCompare<T>,
    M: MostPolicy,
{
    pub fn select(&self, k: usize) -> Option<&T> {
        self.tree.get(self.tree.select(k)?)
    }

    pub fn rank(&self, value: &T) -> usize {
        self.tree.rank(value)
    }
}

impl<T, C, A, M> Default for TrbMultiSet<T, C, A, M>
where
    C: KeyCompare<T> + Default,
    A: Aggregate<T>,
    M: MostPolicy,
{
    fn default() -> Self {
        Self::with_comparator(C::default())
    }
}

impl<T: Clone, C: Clone, A, M> Clone for TrbMultiSet<T, C, A, M>
where
    A: Aggregate<T>,
    M: MostPolicy,
{
    fn clone(&self) -> Self {
        Self {
            tree: self.tree.clone(),
        }
    }
}

impl<T: fmt::Debug, C, A, M> fmt::Debug for TrbMultiSet<T, C, A, M>
where
    C: KeyCompare<T>,
    A: Aggregate<T>,
    M: MostPolicy,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<T, C, A, M> Extend<T> for TrbMultiSet<T, C, A, M>
where
    C: KeyCompare<T>,
    A: Aggregate<T>,
    M: MostPolicy,
{
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for v in iter {
            self.insert(v);
        }
    }
}

impl<T, C, A, M> FromIterator<T> for TrbMultiSet<T, C, A, M>
where
    C: KeyCompare<T> + Default,
    A: Aggregate<T>,
    M: MostPolicy,
{
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut set = Self::default();
        set.extend(iter);
        set
    }
}
