//! Byte-string keyed map over a threaded tree.
//!
//! Keys are not stored in the tree nodes. Each key is appended once to a
//! single byte arena as a varint-length-prefixed string, and the node holds
//! its `u32` offset next to the value. Removing a key leaves its bytes behind
//! as dead space until [`KeyedMap::compact`] rewrites the arena in key order.

use std::fmt;
use std::iter::FusedIterator;
use std::mem;

use trb_rs::raw::Iter as RawIter;
use trb_rs::{NodeId, RawTree};

use crate::encoding::{decode_bytes, encode_bytes, encoded_len, prefix_successor};
use crate::{KvError, Result};

#[derive(Clone, Debug)]
struct Slot<V> {
    key: u32,
    value: V,
}

#[cold]
fn malformed_arena(off: u32) -> ! {
    panic!("key arena entry at offset {off} is malformed")
}

#[inline]
fn key_at(keys: &[u8], off: u32) -> &[u8] {
    match keys.get(off as usize..).and_then(decode_bytes) {
        Some((key, _)) => key,
        None => malformed_arena(off),
    }
}

/// Ordered map from byte-string keys to `V`, keys stored in a shared arena.
#[derive(Clone)]
pub struct KeyedMap<V> {
    keys: Vec<u8>,
    tree: RawTree<Slot<V>>,
    dead_bytes: usize,
}

impl<V> KeyedMap<V> {
    /// Empty map.
    pub fn new() -> Self {
        Self {
            keys: Vec::new(),
            tree: RawTree::new(),
            dead_bytes: 0,
        }
    }

    /// Room for `capacity` entries without growing the node arena.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            keys: Vec::new(),
            tree: RawTree::with_capacity(capacity),
            dead_bytes: 0,
        }
    }

    /// Number of entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    /// `true` when there are no entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    fn find(&self, key: &[u8]) -> Option<NodeId> {
        let keys = &self.keys;
        self.tree.find_by(|s| key.cmp(key_at(keys, s.key)))
    }

    /// Value for `key`.
    pub fn get(&self, key: &[u8]) -> Option<&V> {
        let id = self.find(key)?;
        self.tree.get(id).map(|s| &s.value)
    }

    /// Mutable value for `key`.
    pub fn get_mut(&mut self, key: &[u8]) -> Option<&mut V> {
        let id = self.find(key)?;
        self.tree.get_mut(id).map(|s| &mut s.value)
    }

    /// `true` if `key` is present.
    pub fn contains(&self, key: &[u8]) -> bool {
        self.find(key).is_some()
    }

    /// Insert or replace. Returns the previous value.
    ///
    /// # Panics
    ///
    /// If the node arena or the key arena cannot grow.
    pub fn insert(&mut self, key: &[u8], value: V) -> Option<V> {
        self.try_insert(key, value)
            .unwrap_or_else(|e| panic!("keyed insert failed: {e}"))
    }

    /// Fallible [`insert`](Self::insert). On error the map is unchanged.
    pub fn try_insert(&mut self, key: &[u8], value: V) -> Result<Option<V>> {
        if let Some(id) = self.find(key) {
            return Ok(self.tree.get_mut(id).map(|s| mem::replace(&mut s.value, value)));
        }

        let off = u32::try_from(self.keys.len()).map_err(|_| KvError::KeyArenaFull)?;
        self.keys.try_reserve(encoded_len(key))?;
        self.tree.try_reserve(1)?;
        encode_bytes(key, &mut self.keys);

        let keys = &self.keys;
        let inserted = self.tree.try_insert_by(Slot { key: off, value }, |a, b| {
            key_at(keys, a.key).cmp(key_at(keys, b.key))
        });
        match inserted {
            Ok((_, rejected)) => {
                debug_assert!(rejected.is_none());
                Ok(None)
            }
            Err(e) => {
                self.keys.truncate(off as usize);
                Err(e.into())
            }
        }
    }

    /// Remove a key. Its arena bytes become dead space.
    pub fn remove(&mut self, key: &[u8]) -> Option<V> {
        let keys = &self.keys;
        let slot = self.tree.remove_by(|s| key.cmp(key_at(keys, s.key)))?;
        self.dead_bytes += encoded_len(key);
        Some(slot.value)
    }

    /// Entry with the smallest key.
    pub fn first(&self) -> Option<(&[u8], &V)> {
        self.entry(self.tree.first()?)
    }

    /// Entry with the largest key.
    pub fn last(&self) -> Option<(&[u8], &V)> {
        self.entry(self.tree.last()?)
    }

    fn entry(&self, id: NodeId) -> Option<(&[u8], &V)> {
        self.tree
            .get(id)
            .map(|s| (key_at(&self.keys, s.key), &s.value))
    }

    /// All entries in key order.
    pub fn iter(&self) -> Iter<'_, V> {
        Iter {
            keys: &self.keys,
            inner: self.tree.iter(),
        }
    }

    /// Entries with `start <= key < end`, in key order.
    pub fn range(&self, start: &[u8], end: &[u8]) -> Iter<'_, V> {
        if start >= end {
            return self.span(None, None);
        }
        self.bounded(start, Some(end))
    }

    /// Entries whose key starts with `prefix`, in key order.
    pub fn prefix(&self, prefix: &[u8]) -> Iter<'_, V> {
        let end = prefix_successor(prefix);
        self.bounded(prefix, end.as_deref())
    }

    fn bounded(&self, start: &[u8], end: Option<&[u8]>) -> Iter<'_, V> {
        let keys = &self.keys;
        let first = self.tree.partition_point(|s| key_at(keys, s.key) >= start);
        let last = match end {
            Some(end) => match self.tree.partition_point(|s| key_at(keys, s.key) >= end) {
                Some(stop) => self.tree.prev(stop),
                None => self.tree.last(),
            },
            None => self.tree.last(),
        };
        // No key in the range leaves `last` just before `first`.
        let non_empty = match (first.and_then(|f| self.entry(f)), last.and_then(|l| self.entry(l))) {
            (Some((a, _)), Some((b, _))) => a <= b,
            _ => false,
        };
        if non_empty {
            self.span(first, last)
        } else {
            self.span(None, None)
        }
    }

    fn span(&self, first: Option<NodeId>, last: Option<NodeId>) -> Iter<'_, V> {
        Iter {
            keys: &self.keys,
            inner: self.tree.iter_between(first, last),
        }
    }

    /// Bytes in the key arena no longer referenced by any entry.
    #[inline]
    pub fn dead_bytes(&self) -> usize {
        self.dead_bytes
    }

    /// Total key arena length, live and dead.
    #[inline]
    pub fn key_bytes(&self) -> usize {
        self.keys.len()
    }

    /// Node arena bytes (values included) plus key arena capacity.
    pub fn memory_usage(&self) -> usize {
        self.tree.memory_usage() + self.keys.capacity()
    }

    /// Node arena bytes alone.
    pub fn node_bytes(&self) -> usize {
        self.tree.memory_usage()
    }

    /// Rewrite the key arena with only live keys, in key order. Returns the
    /// number of bytes reclaimed.
    pub fn compact(&mut self) -> usize {
        let reclaimed = self.dead_bytes;
        let mut fresh = Vec::with_capacity(self.keys.len() - reclaimed);
        let ids: Vec<NodeId> = self.tree.ids().collect();
        for id in ids {
            if let Some(slot) = self.tree.get_mut(id) {
                let off = fresh.len() as u32;
                encode_bytes(key_at(&self.keys, slot.key), &mut fresh);
                slot.key = off;
            }
        }
        self.keys = fresh;
        self.dead_bytes = 0;
        tracing::debug!(reclaimed, live_bytes = self.keys.len(), "key arena compacted");
        reclaimed
    }

    /// Drop every entry and both arenas' contents.
    pub fn clear(&mut self) {
        self.tree.clear();
        self.keys.clear();
        self.dead_bytes = 0;
    }

    /// Check the tree invariants, key order, and key arena accounting.
    pub fn verify(&self) -> Result<()> {
        let keys = &self.keys;
        self.tree
            .verify_by(false, |a, b| key_at(keys, a.key).cmp(key_at(keys, b.key)))
            .map_err(|e| KvError::Corrupt(e.to_string()))?;
        let live: usize = self.iter().map(|(k, _)| encoded_len(k)).sum();
        if live + self.dead_bytes != self.keys.len() {
            return Err(KvError::Corrupt(format!(
                "key arena holds {} bytes, {live} live and {} dead",
                self.keys.len(),
                self.dead_bytes
            )));
        }
        Ok(())
    }
}

impl<V> Default for KeyedMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: fmt::Debug> fmt::Debug for KeyedMap<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// Entries of a [`KeyedMap`] in key order.
pub struct Iter<'a, V> {
    keys: &'a [u8],
    inner: RawIter<'a, Slot<V>, ()>,
}

impl<'a, V> Iterator for Iter<'a, V> {
    type Item = (&'a [u8], &'a V);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let keys = self.keys;
        self.inner.next().map(|s| (key_at(keys, s.key), &s.value))
    }
}

impl<V> DoubleEndedIterator for Iter<'_, V> {
    #[inline]
    fn next_back(&mut self) -> Option<Self::Item> {
        let keys = self.keys;
        self.inner.next_back().map(|s| (key_at(keys, s.key), &s.value))
    }
}

impl<V> FusedIterator for Iter<'_, V> {}

impl<'a, V> IntoIterator for &'a KeyedMap<V> {
    type Item = (&'a [u8], &'a V);
    type IntoIter = Iter<'a, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
