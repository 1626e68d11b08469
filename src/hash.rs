//! Hash containers whose buckets are threaded red-black trees.
//!
//! All buckets share one node arena; a bucket is just a [`TreeHead`] without
//! cached extremes. Within a bucket elements are sorted by the comparator,
//! across buckets the order is unspecified.
//!
//! Bucket growth and node storage growth are independent: inserting a new key
//! that would push `len / bucket_count` over the maximum load factor moves to
//! the next prime bucket count at least twice the current one and relinks
//! every node in place, while the arena only grows when it runs out of slots.

use std::cmp::Ordering;
use std::collections::hash_map::RandomState;
use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::iter::FusedIterator;
use std::marker::PhantomData;
use std::mem;

use crate::aggregate::NoSum;
use crate::arena::NodeArena;
use crate::compare::{First, Identity, KeyCompare, KeyOf, OrdCompare};
use crate::engine::{
    self, descend, move_next,
    path::{find_path, find_path_by_less},
    verify, NoMost, Path, TreeHead,
};
use crate::link::{Dir, NodeId, NIL};
use crate::{alloc_failed, InvariantViolation, Result};

/// Bucket counts, each roughly double the previous.
const PRIMES: [usize; 29] = [
    5, 11, 23, 53, 97, 193, 389, 769, 1543, 3079, 6151, 12289, 24593, 49157, 98317, 196613,
    393241, 786433, 1572869, 3145739, 6291469, 12582917, 25165843, 50331653, 100663319,
    201326611, 402653189, 805306457, 1610612741,
];

/// Smallest table prime `>= n`, or the largest one.
fn prime_at_least(n: usize) -> usize {
    let i = PRIMES.partition_point(|&p| p < n);
    PRIMES[i.min(PRIMES.len() - 1)]
}

#[derive(Debug, Clone)]
pub struct HashConfig {
    /// Requested bucket count; rounded up to the next table prime.
    pub initial_buckets: usize,
    /// `len / bucket_count` above which an insert rehashes.
    pub max_load_factor: f32,
}

impl Default for HashConfig {
    fn default() -> Self {
        Self {
            initial_buckets: 8,
            max_load_factor: 1.0,
        }
    }
}

// =============================================================================
// Shared table
// =============================================================================

pub(crate) struct HashTable<T, X, S, C> {
    arena: NodeArena<T, ()>,
    buckets: Vec<TreeHead<NoMost>>,
    len: usize,
    hasher: S,
    cmp: C,
    max_load_factor: f32,
    _key: PhantomData<fn() -> X>,
}

impl<T, X, S, C> HashTable<T, X, S, C>
where
    X: KeyOf<T>,
    X::Key: Hash,
    S: BuildHasher,
    C: KeyCompare<X::Key>,
{
    fn new(config: HashConfig, hasher: S, cmp: C) -> Self {
        assert!(
            config.max_load_factor > 0.0,
            "max_load_factor must be positive"
        );
        let count = prime_at_least(config.initial_buckets.max(1));
        Self {
            arena: NodeArena::new(),
            buckets: (0..count).map(|_| TreeHead::new()).collect(),
            len: 0,
            hasher,
            cmp,
            max_load_factor: config.max_load_factor,
            _key: PhantomData,
        }
    }

    #[inline]
    fn bucket_of(&self, key: &X::Key) -> usize {
        (self.hasher.hash_one(key) % self.buckets.len() as u64) as usize
    }

    #[inline]
    fn order(&self, a: &T, b: &T) -> Ordering {
        self.cmp.compare(X::key(a), X::key(b))
    }

    /// Unique-key descent into bucket `b`.
    fn search(&self, b: usize, key: &X::Key, path: &mut Path) -> bool {
        let root = self.buckets[b].root;
        let cmp = &self.cmp;
        if C::THREE_WAY {
            find_path(&self.arena, root, path, |_, v| cmp.compare(key, X::key(v)))
        } else {
            find_path_by_less(
                &self.arena,
                root,
                path,
                |v| cmp.less(key, X::key(v)),
                |v| cmp.less(X::key(v), key),
            )
        }
    }

    /// Exact `(key, index)` descent towards node `n` in bucket `b`. Ends on
    /// `n` if it is linked there, at its attachment point otherwise.
    fn seek_node(&self, b: usize, n: u32, path: &mut Path) -> bool {
        let target = self.arena.value(n);
        find_path(&self.arena, self.buckets[b].root, path, |idx, v| {
            self.order(target, v).then(n.cmp(&idx))
        })
    }

    fn find(&self, key: &X::Key) -> Option<u32> {
        let mut path = Path::new();
        let b = self.bucket_of(key);
        self.search(b, key, &mut path).then(|| path.top().0)
    }

    fn needs_grow(&self) -> bool {
        (self.len + 1) as f64 > self.max_load_factor as f64 * self.buckets.len() as f64
            && self.buckets.len() < PRIMES[PRIMES.len() - 1]
    }

    /// Buckets needed to hold `n` elements under the load factor.
    fn buckets_for(&self, n: usize) -> usize {
        (n as f64 / self.max_load_factor as f64).ceil() as usize
    }

    fn grow(&mut self) -> Result<()> {
        let want = (self.buckets.len() * 2).max(self.buckets_for(self.len + 1));
        self.rehash(want)
    }

    /// Rebuild with at least `count` buckets (never fewer than the load
    /// factor allows) and relink every node.
    ///
    /// The new bucket array is allocated before the old one is touched, so
    /// on error the table is unchanged.
    fn rehash(&mut self, count: usize) -> Result<()> {
        let count = prime_at_least(count.max(self.buckets_for(self.len)).max(1));
        if count == self.buckets.len() {
            return Ok(());
        }
        let mut buckets = Vec::new();
        buckets.try_reserve_exact(count)?;
        buckets.resize_with(count, TreeHead::new);
        tracing::debug!(
            from = self.buckets.len(),
            to = count,
            len = self.len,
            "rehashing trb hash table"
        );
        self.buckets = buckets;
        let mut path = Path::new();
        for n in 0..self.arena.slots() as u32 {
            if !self.arena.is_live(n) {
                continue;
            }
            let b = self.bucket_of(X::key(self.arena.value(n)));
            self.seek_node(b, n, &mut path);
            engine::insert::<T, NoSum, NoMost>(&mut self.arena, &mut self.buckets[b], &path, n);
        }
        Ok(())
    }

    /// Link the fresh slot `n` into its bucket.
    fn link(&mut self, n: u32, path: &mut Path) {
        let b = self.bucket_of(X::key(self.arena.value(n)));
        self.seek_node(b, n, path);
        engine::insert::<T, NoSum, NoMost>(&mut self.arena, &mut self.buckets[b], path, n);
        self.len += 1;
    }

    fn try_insert_unique(&mut self, value: T) -> Result<(u32, Option<T>)> {
        let mut path = Path::new();
        let b = self.bucket_of(X::key(&value));
        if self.search(b, X::key(&value), &mut path) {
            return Ok((path.top().0, Some(value)));
        }
        // Rehash walks every live slot, so it must run before the new one
        // exists.
        if self.needs_grow() {
            self.grow()?;
        }
        let n = self.arena.alloc(value, ())?;
        self.link(n, &mut path);
        Ok((n, None))
    }

    fn unlink(&mut self, b: usize, path: &mut Path) -> T {
        let n = engine::remove::<T, NoSum, NoMost>(&mut self.arena, &mut self.buckets[b], path);
        self.len -= 1;
        self.arena.free(n)
    }

    fn remove(&mut self, key: &X::Key) -> Option<T> {
        let mut path = Path::new();
        let b = self.bucket_of(key);
        if !self.search(b, key, &mut path) {
            return None;
        }
        Some(self.unlink(b, &mut path))
    }

    fn remove_at(&mut self, n: u32) -> Option<T> {
        if !self.arena.is_live(n) {
            return None;
        }
        let mut path = Path::new();
        let b = self.bucket_of(X::key(self.arena.value(n)));
        let found = self.seek_node(b, n, &mut path);
        assert!(found, "node {n} is not linked in its bucket");
        Some(self.unlink(b, &mut path))
    }

    fn set_max_load_factor(&mut self, load: f32) -> Result<()> {
        assert!(load > 0.0, "max_load_factor must be positive");
        let need = (self.len as f64 / load as f64).ceil() as usize;
        if need > self.buckets.len() {
            let previous = mem::replace(&mut self.max_load_factor, load);
            if let Err(e) = self.rehash(need) {
                self.max_load_factor = previous;
                return Err(e);
            }
        }
        self.max_load_factor = load;
        Ok(())
    }

    fn load_factor(&self) -> f32 {
        self.len as f32 / self.buckets.len() as f32
    }

    fn try_reserve(&mut self, additional: usize) -> Result<()> {
        self.arena.try_reserve(additional)?;
        let need = self.buckets_for(self.len.saturating_add(additional));
        if need > self.buckets.len() {
            self.rehash(need)?;
        }
        Ok(())
    }

    fn clear(&mut self) {
        self.arena.clear();
        for head in &mut self.buckets {
            head.reset();
        }
        self.len = 0;
    }

    fn bucket_iter(&self, b: usize) -> BucketIter<'_, T> {
        BucketIter {
            arena: &self.arena,
            cur: descend(&self.arena, self.buckets[b].root, Dir::Left),
        }
    }

    fn iter(&self) -> Iter<'_, T> {
        Iter {
            arena: &self.arena,
            buckets: &self.buckets,
            bucket: 0,
            cur: NIL,
            remaining: self.len,
        }
    }

    fn verify(&self) -> std::result::Result<(), InvariantViolation> {
        let mut total = 0;
        for (b, head) in self.buckets.iter().enumerate() {
            let order = verify::verify_structure(&self.arena, head)?;
            for &n in &order {
                let expected = self.bucket_of(X::key(self.arena.value(n)));
                if expected != b {
                    return Err(InvariantViolation::WrongBucket {
                        node: n,
                        actual: b,
                        expected,
                    });
                }
            }
            for w in order.windows(2) {
                let c = self.order(self.arena.value(w[0]), self.arena.value(w[1]));
                if c == Ordering::Greater || (c == Ordering::Equal && w[0] > w[1]) {
                    return Err(InvariantViolation::Order {
                        prev: w[0],
                        next: w[1],
                    });
                }
            }
            total += order.len();
        }
        if total != self.len || total != self.arena.live() {
            return Err(InvariantViolation::Count {
                expected: self.len,
                actual: total,
            });
        }
        Ok(())
    }
}

/// Elements of one bucket, in comparator order.
pub struct BucketIter<'a, T> {
    arena: &'a NodeArena<T, ()>,
    cur: u32,
}

impl<'a, T> Iterator for BucketIter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        if self.cur == NIL {
            return None;
        }
        let n = self.cur;
        self.cur = move_next(self.arena, n);
        Some(self.arena.value(n))
    }
}

impl<T> FusedIterator for BucketIter<'_, T> {}

/// Every element, bucket by bucket.
pub struct Iter<'a, T> {
    arena: &'a NodeArena<T, ()>,
    buckets: &'a [TreeHead<NoMost>],
    bucket: usize,
    cur: u32,
    remaining: usize,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        while self.cur == NIL {
            let head = self.buckets.get(self.bucket)?;
            self.bucket += 1;
            self.cur = descend(self.arena, head.root, Dir::Left);
        }
        let n = self.cur;
        self.cur = move_next(self.arena, n);
        self.remaining -= 1;
        Some(self.arena.value(n))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}

impl<T> FusedIterator for Iter<'_, T> {}

// =============================================================================
// TrbHashMap
// =============================================================================

pub struct TrbHashMap<K, V, S = RandomState, C = OrdCompare> {
    table: HashTable<(K, V), First<K, V>, S, C>,
}

impl<K: Hash + Ord, V> TrbHashMap<K, V> {
    pub fn new() -> Self {
        Self::with_config(HashConfig::default())
    }

    pub fn with_config(config: HashConfig) -> Self {
        Self::with_hasher_and_comparator(config, RandomState::new(), OrdCompare)
    }
}

impl<K, V, S, C> TrbHashMap<K, V, S, C>
where
    K: Hash,
    S: BuildHasher,
    C: KeyCompare<K>,
{
    pub fn with_hasher_and_comparator(config: HashConfig, hasher: S, cmp: C) -> Self {
        Self {
            table: HashTable::new(config, hasher, cmp),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.table.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.table.len == 0
    }

    /// Insert or replace; returns the previous value.
    ///
    /// # Panics
    ///
    /// If the node arena cannot grow.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        self.try_insert(key, value)
            .unwrap_or_else(|e| alloc_failed(e))
    }

    pub fn try_insert(&mut self, key: K, value: V) -> Result<Option<V>> {
        let (n, rejected) = self.table.try_insert_unique((key, value))?;
        Ok(rejected.map(|(_, value)| mem::replace(&mut self.table.arena.value_mut(n).1, value)))
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        let n = self.table.find(key)?;
        Some(&self.table.arena.value(n).1)
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        let n = self.table.find(key)?;
        Some(&mut self.table.arena.value_mut(n).1)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.table.find(key).is_some()
    }

    pub fn find(&self, key: &K) -> Option<NodeId> {
        self.table.find(key).map(NodeId)
    }

    pub fn entry_at(&self, id: NodeId) -> Option<(&K, &V)> {
        self.table.arena.get(id.0).map(|(k, v)| (k, v))
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.table.remove(key).map(|(_, v)| v)
    }

    pub fn remove_entry(&mut self, key: &K) -> Option<(K, V)> {
        self.table.remove(key)
    }

    pub fn remove_at(&mut self, id: NodeId) -> Option<(K, V)> {
        self.table.remove_at(id.0)
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = (&K, &V)> + '_ {
        self.table.iter().map(|(k, v)| (k, v))
    }

    /// Stored `(K, V)` pairs, for encoders that take whole elements.
    pub(crate) fn entries(&self) -> Iter<'_, (K, V)> {
        self.table.iter()
    }

    pub fn keys(&self) -> impl ExactSizeIterator<Item = &K> + '_ {
        self.table.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl ExactSizeIterator<Item = &V> + '_ {
        self.table.iter().map(|(_, v)| v)
    }

    // -------------------------------------------------------------------------
    // Buckets
    // -------------------------------------------------------------------------

    pub fn bucket_count(&self) -> usize {
        self.table.buckets.len()
    }

    pub fn bucket_len(&self, bucket: usize) -> usize {
        self.table.buckets[bucket].len()
    }

    /// Bucket a key hashes to.
    pub fn bucket(&self, key: &K) -> usize {
        self.table.bucket_of(key)
    }

    /// Entries of one bucket, sorted by key.
    pub fn bucket_iter(&self, bucket: usize) -> impl Iterator<Item = (&K, &V)> + '_ {
        self.table.bucket_iter(bucket).map(|(k, v)| (k, v))
    }

    pub fn load_factor(&self) -> f32 {
        self.table.load_factor()
    }

    pub fn max_load_factor(&self) -> f32 {
        self.table.max_load_factor
    }

    /// # Panics
    ///
    /// If `load` is not positive, or if the bucket array cannot grow to
    /// honour it.
    pub fn set_max_load_factor(&mut self, load: f32) {
        if let Err(e) = self.table.set_max_load_factor(load) {
            alloc_failed(e);
        }
    }

    /// Rebuild with at least `buckets` buckets. Never goes below what the
    /// current length needs under the load factor.
    ///
    /// # Panics
    ///
    /// If the bucket array cannot be allocated.
    pub fn rehash(&mut self, buckets: usize) {
        if let Err(e) = self.table.rehash(buckets) {
            alloc_failed(e);
        }
    }

    /// [`rehash`](Self::rehash) that reports allocation failure. On error
    /// the map is unchanged.
    pub fn try_rehash(&mut self, buckets: usize) -> Result<()> {
        self.table.rehash(buckets)
    }

    pub fn reserve(&mut self, additional: usize) {
        if let Err(e) = self.table.try_reserve(additional) {
            alloc_failed(e);
        }
    }

    /// Room for `additional` more entries without growing either the node
    /// arena or the bucket array.
    pub fn try_reserve(&mut self, additional: usize) -> Result<()> {
        self.table.try_reserve(additional)
    }

    /// Node slots available without reallocating the arena.
    pub fn capacity(&self) -> usize {
        self.table.arena.capacity()
    }

    pub fn memory_usage(&self) -> usize {
        self.table.arena.memory_usage()
            + self.table.buckets.capacity() * mem::size_of::<TreeHead<NoMost>>()
    }

    /// Drop every entry. Bucket count and capacity are kept.
    pub fn clear(&mut self) {
        self.table.clear();
    }

    pub fn verify(&self) -> std::result::Result<(), InvariantViolation> {
        self.table.verify()
    }
}

impl<K: Hash + Ord, V> Default for TrbHashMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S, C> fmt::Debug for TrbHashMap<K, V, S, C>
where
    K: Hash + fmt::Debug,
    V: fmt::Debug,
    S: BuildHasher,
    C: KeyCompare<K>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V, S, C> Extend<(K, V)> for TrbHashMap<K, V, S, C>
where
    K: Hash,
    S: BuildHasher,
    C: KeyCompare<K>,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

impl<K: Hash + Ord, V> FromIterator<(K, V)> for TrbHashMap<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        map.extend(iter);
        map
    }
}

// =============================================================================
// TrbHashSet
// =============================================================================

pub struct TrbHashSet<T, S = RandomState, C = OrdCompare> {
    table: HashTable<T, Identity<T>, S, C>,
}

impl<T: Hash + Ord> TrbHashSet<T> {
    pub fn new() -> Self {
        Self::with_config(HashConfig::default())
    }

    pub fn with_config(config: HashConfig) -> Self {
        Self::with_hasher_and_comparator(config, RandomState::new(), OrdCompare)
    }
}

impl<T, S, C> TrbHashSet<T, S, C>
where
    T: Hash,
    S: BuildHasher,
    C: KeyCompare<T>,
{
    pub fn with_hasher_and_comparator(config: HashConfig, hasher: S, cmp: C) -> Self {
        Self {
            table: HashTable::new(config, hasher, cmp),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.table.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.table.len == 0
    }

    /// `true` if the value was not present.
    pub fn insert(&mut self, value: T) -> bool {
        self.try_insert(value)
            .unwrap_or_else(|e| alloc_failed(e))
    }

    pub fn try_insert(&mut self, value: T) -> Result<bool> {
        Ok(self.table.try_insert_unique(value)?.1.is_none())
    }

    pub fn contains(&self, value: &T) -> bool {
        self.table.find(value).is_some()
    }

    pub fn get(&self, value: &T) -> Option<&T> {
        self.table.find(value).map(|n| self.table.arena.value(n))
    }

    pub fn remove(&mut self, value: &T) -> bool {
        self.table.remove(value).is_some()
    }

    pub fn take(&mut self, value: &T) -> Option<T> {
        self.table.remove(value)
    }

    pub fn iter(&self) -> Iter<'_, T> {
        self.table.iter()
    }

    pub fn bucket_count(&self) -> usize {
        self.table.buckets.len()
    }

    pub fn bucket_len(&self, bucket: usize) -> usize {
        self.table.buckets[bucket].len()
    }

    pub fn bucket(&self, value: &T) -> usize {
        self.table.bucket_of(value)
    }

    pub fn bucket_iter(&self, bucket: usize) -> BucketIter<'_, T> {
        self.table.bucket_iter(bucket)
    }

    pub fn load_factor(&self) -> f32 {
        self.table.load_factor()
    }

    pub fn max_load_factor(&self) -> f32 {
        self.table.max_load_factor
    }

    pub fn set_max_load_factor(&mut self, load: f32) {
        if let Err(e) = self.table.set_max_load_factor(load) {
            alloc_failed(e);
        }
    }

    pub fn rehash(&mut self, buckets: usize) {
        if let Err(e) = self.table.rehash(buckets) {
            alloc_failed(e);
        }
    }

    pub fn try_rehash(&mut self, buckets: usize) -> Result<()> {
        self.table.rehash(buckets)
    }

    pub fn reserve(&mut self, additional: usize) {
        if let Err(e) = self.table.try_reserve(additional) {
            alloc_failed(e);
        }
    }

    pub fn try_reserve(&mut self, additional: usize) -> Result<()> {
        self.table.try_reserve(additional)
    }

    pub fn capacity(&self) -> usize {
        self.table.arena.capacity()
    }

    pub fn clear(&mut self) {
        self.table.clear();
    }

    pub fn verify(&self) -> std::result::Result<(), InvariantViolation> {
        self.table.verify()
    }
}

impl<T: Hash + Ord> Default for TrbHashSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, S, C> fmt::Debug for TrbHashSet<T, S, C>
where
    T: Hash + fmt::Debug,
    S: BuildHasher,
    C: KeyCompare<T>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<T, S, C> Extend<T> for TrbHashSet<T, S, C>
where
    T: Hash,
    S: BuildHasher,
    C: KeyCompare<T>,
{
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for v in iter {
            self.insert(v);
        }
    }
}

impl<T: Hash + Ord> FromIterator<T> for TrbHashSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TrbError;
    use std::hash::BuildHasherDefault;
    use std::hash::Hasher;

    /// Hashes every key to the same value.
    #[derive(Default)]
    struct Constant;

    impl Hasher for Constant {
        fn finish(&self) -> u64 {
            0
        }

        fn write(&mut self, _: &[u8]) {}
    }

    #[test]
    fn test_initial_buckets_round_up_to_prime() {
        let map: TrbHashMap<u32, u32> = TrbHashMap::new();
        assert_eq!(map.bucket_count(), 11);
        let map: TrbHashMap<u32, u32> = TrbHashMap::with_config(HashConfig {
            initial_buckets: 100,
            max_load_factor: 1.0,
        });
        assert_eq!(map.bucket_count(), 193);
    }

    #[test]
    fn test_ten_thousand_keys_rehash() {
        let mut map = TrbHashMap::with_config(HashConfig {
            initial_buckets: 8,
            ..HashConfig::default()
        });
        for k in 0..10_000u32 {
            assert_eq!(map.insert(k, k * 2), None);
            assert!(map.load_factor() <= map.max_load_factor());
        }
        assert_eq!(map.len(), 10_000);
        assert!(map.bucket_count() >= 10_000);
        for k in 0..10_000u32 {
            assert_eq!(map.get(&k), Some(&(k * 2)));
        }
        map.verify().unwrap();
    }

    #[test]
    fn test_collisions_stay_sorted_in_bucket() {
        let mut set: TrbHashSet<u32, BuildHasherDefault<Constant>> =
            TrbHashSet::with_hasher_and_comparator(
                HashConfig::default(),
                BuildHasherDefault::default(),
                OrdCompare,
            );
        set.set_max_load_factor(1000.0);
        for k in [9, 3, 7, 1, 5] {
            set.insert(k);
        }
        assert_eq!(set.bucket_len(0), 5);
        let got: Vec<u32> = set.bucket_iter(0).copied().collect();
        assert_eq!(got, vec![1, 3, 5, 7, 9]);
        assert!(set.remove(&5));
        assert!(!set.contains(&5));
        set.verify().unwrap();
    }

    #[test]
    fn test_insert_replaces_and_remove() {
        let mut map = TrbHashMap::new();
        assert_eq!(map.insert("k", 1), None);
        assert_eq!(map.insert("k", 2), Some(1));
        assert_eq!(map.len(), 1);
        *map.get_mut(&"k").unwrap() += 1;
        assert_eq!(map.remove(&"k"), Some(3));
        assert!(map.is_empty());
        assert_eq!(map.iter().count(), 0);
    }

    #[test]
    fn test_explicit_rehash_and_load_factor() {
        let mut set: TrbHashSet<u64> = (0..500).collect();
        let before = set.bucket_count();
        set.rehash(before * 4);
        assert!(set.bucket_count() >= before * 4);
        assert_eq!(set.len(), 500);
        set.verify().unwrap();

        set.set_max_load_factor(0.25);
        assert!(set.load_factor() <= 0.25);
        set.verify().unwrap();

        // Shrinking request is clamped by the load factor.
        set.rehash(1);
        assert!(set.load_factor() <= 0.25);
        assert_eq!(set.iter().len(), 500);
    }

    #[test]
    fn test_reserve_avoids_growth() {
        let mut set = TrbHashSet::new();
        set.reserve(1000);
        let (cap, buckets) = (set.capacity(), set.bucket_count());
        for k in 0..1000u32 {
            set.insert(k);
        }
        assert_eq!(set.capacity(), cap);
        assert_eq!(set.bucket_count(), buckets);
    }

    #[test]
    fn test_failed_reserve_leaves_table_usable() {
        let mut map: TrbHashMap<u32, u32> = (0..40).map(|k| (k, k)).collect();
        let buckets = map.bucket_count();
        assert!(matches!(
            map.try_reserve(usize::MAX),
            Err(TrbError::CapacityOverflow { .. })
        ));
        assert_eq!(map.bucket_count(), buckets);
        assert_eq!(map.len(), 40);
        map.verify().unwrap();

        for k in 40..200 {
            assert_eq!(map.try_insert(k, k).unwrap(), None);
        }
        assert!(map.bucket_count() > buckets);
        map.try_rehash(map.bucket_count() * 2).unwrap();
        assert_eq!(map.get(&123), Some(&123));
        map.verify().unwrap();
    }

    #[test]
    fn test_rehash_relinks_around_freed_slots() {
        let mut set: TrbHashSet<u32> = (0..300).collect();
        for k in (0..300).filter(|k| k % 3 != 0) {
            assert!(set.remove(&k));
        }
        assert_eq!(set.len(), 100);
        set.rehash(set.bucket_count() * 3);
        set.verify().unwrap();
        assert_eq!(set.iter().len(), 100);
        assert!((0..300).all(|k| set.contains(&k) == (k % 3 == 0)));
    }

    #[test]
    fn test_slot_reuse_after_clear_of_entries() {
        let mut map = TrbHashMap::new();
        for k in 0..256u32 {
            map.insert(k, ());
        }
        let cap = map.capacity();
        for k in 0..256u32 {
            map.remove(&k);
        }
        for k in 256..512u32 {
            map.insert(k, ());
        }
        assert_eq!(map.capacity(), cap);
        map.verify().unwrap();
    }
}
