//! # TrbKV
//!
//! An ordered, lock-guarded store keyed by byte strings, built on the
//! threaded red-black trees of `trb-rs`.
//!
//! Keys sort lexicographically by bytes. Each key is written once into a
//! flat byte arena and tree nodes refer to it by a 4-byte offset, so the
//! per-entry cost is one tree node plus the key bytes.
//!
//! - `get` / `insert` / `remove`: O(log n) key comparisons
//! - `range(start, end)`: half-open, in key order
//! - `prefix(p)`: every key starting with `p`, in key order
//! - `compact`: drops key bytes orphaned by removals
//! - `save_to_path` / `load_from_path`: length-prefixed flat file
//!
//! ## Example
//!
//! ```rust
//! use trbkv::TrbKV;
//!
//! let kv = TrbKV::new();
//! for (sensor, reading) in [("temp/attic", 19u32), ("temp/cellar", 11), ("hum/attic", 54)] {
//!     kv.insert(sensor, reading);
//! }
//! kv.remove("temp/cellar");
//!
//! let temps: Vec<_> = kv.prefix("temp/").into_iter().map(|(_, v)| v).collect();
//! assert_eq!(temps, vec![19]);
//! assert_eq!(kv.range("a", "i").len(), 1);
//! ```

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod encoding;
pub mod keyed;
pub mod persist;

pub use keyed::KeyedMap;

use std::collections::TryReserveError;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;
use thiserror::Error;
use trb_rs::TrbError;

/// Errors from the store, its key arena and its file format.
#[derive(Debug, Error)]
pub enum KvError {
    /// The node arena failed.
    #[error(transparent)]
    Tree(#[from] TrbError),

    /// The key arena could not grow.
    #[error("key arena allocation failed: {0}")]
    Alloc(#[from] TryReserveError),

    /// Key arena offsets are 32-bit; the arena reached 4 GiB.
    #[error("key arena is full")]
    KeyArenaFull,

    /// A key, value or record count does not fit the 4-byte length field.
    #[error("record length {len} does not fit in 32 bits")]
    RecordTooLarge {
        /// Offending length.
        len: usize,
    },

    /// A file held the same key twice.
    #[error("duplicate key at record {index}")]
    DuplicateKey {
        /// Zero-based record number.
        index: usize,
    },

    /// Reading or writing a file failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed input or a failed consistency check.
    #[error("corrupt data: {0}")]
    Corrupt(String),
}

/// Result alias for this crate.
pub type Result<T, E = KvError> = std::result::Result<T, E>;

/// Byte accounting snapshot from [`TrbKV::memory_usage`].
#[derive(Debug, Clone, Default)]
pub struct MemoryStats {
    /// Bytes used by the key arena, live and dead
    pub key_bytes: usize,
    /// Key arena bytes left behind by removed keys
    pub dead_key_bytes: usize,
    /// Bytes used by the node arena (links, offsets and values)
    pub node_bytes: usize,
    /// Bytes of inline value storage within the nodes
    pub value_bytes: usize,
    /// Live entries
    pub num_keys: usize,
    /// Node and key arena bytes divided by `num_keys`
    pub bytes_per_key: f64,
}

/// Tuning knobs for [`TrbKV`].
#[derive(Debug, Clone)]
pub struct Config {
    /// Entries the node arena is sized for up front
    pub initial_capacity: usize,
    /// Dead key bytes above which automatic compaction runs
    pub compaction_threshold: usize,
    /// Compact the key arena after a removal crosses the threshold
    pub auto_compact: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            initial_capacity: 1024,
            compaction_threshold: 1_000_000,
            auto_compact: false,
        }
    }
}

/// Ordered byte-keyed store behind a reader-writer lock.
///
/// Reads share the lock and mutations take it exclusively; wrap it in an
/// `Arc` to share between threads. `len` reads an atomic counter and never
/// locks.
pub struct TrbKV<V> {
    /// Keyed tree and key arena
    inner: RwLock<KeyedMap<V>>,
    /// Number of entries, readable without the lock
    len: AtomicUsize,
    /// Configuration
    config: Config,
}

impl<V> TrbKV<V>
where
    V: Clone,
{
    /// Empty store with [`Config::default`].
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Empty store tuned by `config`.
    pub fn with_config(config: Config) -> Self {
        Self {
            inner: RwLock::new(KeyedMap::with_capacity(config.initial_capacity)),
            len: AtomicUsize::new(0),
            config,
        }
    }

    /// Store `value` under `key`, handing back the value it replaces.
    ///
    /// # Panics
    ///
    /// If either arena cannot grow; see [`try_insert`](Self::try_insert).
    pub fn insert(&self, key: impl AsRef<[u8]>, value: V) -> Option<V> {
        let key = key.as_ref();
        let mut inner = self.inner.write();
        let old = inner.insert(key, value);
        if old.is_none() {
            self.len.fetch_add(1, Ordering::Relaxed);
        }
        old
    }

    /// Fallible [`insert`](Self::insert).
    pub fn try_insert(&self, key: impl AsRef<[u8]>, value: V) -> Result<Option<V>> {
        let key = key.as_ref();
        let mut inner = self.inner.write();
        let old = inner.try_insert(key, value)?;
        if old.is_none() {
            self.len.fetch_add(1, Ordering::Relaxed);
        }
        Ok(old)
    }

    /// Clone of the value under `key`.
    pub fn get(&self, key: impl AsRef<[u8]>) -> Option<V> {
        let key = key.as_ref();
        let inner = self.inner.read();
        inner.get(key).cloned()
    }

    /// Run `f` on the value for a key in place.
    pub fn update<R>(&self, key: impl AsRef<[u8]>, f: impl FnOnce(&mut V) -> R) -> Option<R> {
        let key = key.as_ref();
        let mut inner = self.inner.write();
        inner.get_mut(key).map(f)
    }

    /// `true` if `key` is present.
    pub fn contains(&self, key: impl AsRef<[u8]>) -> bool {
        let key = key.as_ref();
        let inner = self.inner.read();
        inner.contains(key)
    }

    /// Take the value under `key` out of the store.
    ///
    /// With `auto_compact` set, the
    /// key arena is compacted once its dead bytes pass the threshold.
    pub fn remove(&self, key: impl AsRef<[u8]>) -> Option<V> {
        let key = key.as_ref();
        let mut inner = self.inner.write();
        let old = inner.remove(key);
        if old.is_some() {
            self.len.fetch_sub(1, Ordering::Relaxed);
            if self.config.auto_compact && inner.dead_bytes() > self.config.compaction_threshold {
                inner.compact();
            }
        }
        old
    }

    /// Entries with `start <= key < end`, cloned out in key order. Empty
    /// when `start >= end`.
    pub fn range(&self, start: impl AsRef<[u8]>, end: impl AsRef<[u8]>) -> Vec<(Vec<u8>, V)> {
        let start = start.as_ref();
        let end = end.as_ref();
        let inner = self.inner.read();
        inner
            .range(start, end)
            .map(|(k, v)| (k.to_vec(), v.clone()))
            .collect()
    }

    /// Entries whose key begins with `prefix`, cloned out in key order.
    pub fn prefix(&self, prefix: impl AsRef<[u8]>) -> Vec<(Vec<u8>, V)> {
        let prefix = prefix.as_ref();
        let inner = self.inner.read();
        inner
            .prefix(prefix)
            .map(|(k, v)| (k.to_vec(), v.clone()))
            .collect()
    }

    /// Live entries.
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    /// `true` when no entries are live.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every key.
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.clear();
        self.len.store(0, Ordering::Relaxed);
    }

    /// Current byte accounting for both arenas.
    pub fn memory_usage(&self) -> MemoryStats {
        let inner = self.inner.read();
        let num_keys = inner.len();
        MemoryStats {
            key_bytes: inner.key_bytes(),
            dead_key_bytes: inner.dead_bytes(),
            node_bytes: inner.node_bytes(),
            value_bytes: num_keys * std::mem::size_of::<V>(),
            num_keys,
            bytes_per_key: if num_keys > 0 {
                inner.memory_usage() as f64 / num_keys as f64
            } else {
                0.0
            },
        }
    }

    /// Rewrite the key arena without dead bytes. Returns the bytes reclaimed.
    pub fn compact(&self) -> usize {
        self.inner.write().compact()
    }

    /// Check the tree and key arena invariants.
    pub fn verify(&self) -> Result<()> {
        let inner = self.inner.read();
        inner.verify()?;
        if inner.len() != self.len() {
            return Err(KvError::Corrupt(format!(
                "length counter {} disagrees with {} entries",
                self.len(),
                inner.len()
            )));
        }
        Ok(())
    }
}

impl<V> TrbKV<V>
where
    V: Clone + AsRef<[u8]> + From<Vec<u8>>,
{
    /// Write every entry to `path` in the flat record format.
    pub fn save_to_path(&self, path: impl AsRef<Path>) -> Result<()> {
        let inner = self.inner.read();
        persist::save_to_path(&*inner, path)
    }

    /// Open a store previously written by [`save_to_path`](Self::save_to_path).
    pub fn load_from_path(path: impl AsRef<Path>, config: Config) -> Result<Self> {
        let map = persist::load_from_path(path)?;
        let len = map.len();
        Ok(Self {
            inner: RwLock::new(map),
            len: AtomicUsize::new(len),
            config,
        })
    }
}

impl<V: Clone> Default for TrbKV<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ordered(pairs: &[(Vec<u8>, u64)]) -> Vec<&[u8]> {
        pairs.iter().map(|(k, _)| k.as_slice()).collect()
    }

    #[test]
    fn test_replace_and_remove_keep_key_order() {
        let kv: TrbKV<u64> = TrbKV::new();
        for (i, key) in ["pear", "apple", "fig", "banana"].iter().enumerate() {
            assert!(kv.insert(key, i as u64).is_none());
        }
        assert_eq!(kv.insert("fig", 20), Some(2));
        assert_eq!(kv.len(), 4);
        assert_eq!(kv.get("fig"), Some(20));
        assert_eq!(kv.get("grape"), None);

        assert_eq!(kv.remove("banana"), Some(3));
        assert_eq!(kv.remove("banana"), None);
        assert!(!kv.contains("banana"));
        assert_eq!(
            ordered(&kv.range("", "zzz")),
            vec![&b"apple"[..], &b"fig"[..], &b"pear"[..]]
        );
        kv.verify().unwrap();
    }

    #[test]
    fn test_bounded_range_and_prefix_after_remove() {
        let kv: TrbKV<u64> = TrbKV::new();
        for (i, key) in ["log/2024/01", "log/2024/02", "log/2024/03", "log/2025/01", "logo", "lock"]
            .iter()
            .enumerate()
        {
            kv.insert(key, i as u64);
        }
        kv.remove("log/2024/02");

        assert_eq!(
            ordered(&kv.prefix("log/2024/")),
            vec![&b"log/2024/01"[..], &b"log/2024/03"[..]]
        );
        // The end bound is exclusive and the start inclusive.
        assert_eq!(
            ordered(&kv.range("log/2024/03", "log/2025/01")),
            vec![&b"log/2024/03"[..]]
        );
        assert_eq!(ordered(&kv.prefix("log")).len(), 4);
        assert!(kv.range("logo", "lock").is_empty());
        assert!(kv.prefix("log/2026").is_empty());
    }

    #[test]
    fn test_empty_key_sorts_first() {
        let kv: TrbKV<u64> = TrbKV::new();
        kv.insert("m", 1);
        kv.insert("", 0);
        assert_eq!(kv.get(""), Some(0));
        assert_eq!(kv.range("", "z")[0], (Vec::new(), 0));
        assert_eq!(kv.prefix("").len(), 2);
    }

    #[test]
    fn test_update_in_place() {
        let kv: TrbKV<u64> = TrbKV::new();
        kv.insert(b"hits", 1);
        assert_eq!(kv.update(b"hits", |v| { *v += 1; *v }), Some(2));
        assert_eq!(kv.update(b"misses", |v| *v), None);
    }

    #[test]
    fn test_auto_compact_reclaims_dead_keys() {
        let kv: TrbKV<u32> = TrbKV::with_config(Config {
            initial_capacity: 16,
            compaction_threshold: 64,
            auto_compact: true,
        });
        for i in 0..100u32 {
            kv.insert(format!("key:{i:04}"), i);
        }
        for i in 0..50u32 {
            kv.remove(format!("key:{i:04}"));
        }
        let stats = kv.memory_usage();
        assert!(stats.dead_key_bytes <= 64, "{stats:?}");
        assert_eq!(stats.num_keys, 50);
        kv.verify().unwrap();
        assert_eq!(kv.get("key:0075"), Some(75));
    }

    #[test]
    fn test_manual_compact() {
        let kv: TrbKV<u8> = TrbKV::new();
        kv.insert(b"aaaa", 1);
        kv.insert(b"bbbb", 2);
        kv.remove(b"aaaa");
        assert_eq!(kv.memory_usage().dead_key_bytes, 5);
        assert_eq!(kv.compact(), 5);
        assert_eq!(kv.memory_usage().key_bytes, 5);
        kv.verify().unwrap();
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kv.bin");

        let kv: TrbKV<Vec<u8>> = TrbKV::new();
        kv.insert(b"b", b"2".to_vec());
        kv.insert(b"a", b"1".to_vec());
        kv.save_to_path(&path).unwrap();

        let back: TrbKV<Vec<u8>> = TrbKV::load_from_path(&path, Config::default()).unwrap();
        assert_eq!(back.len(), 2);
        assert_eq!(back.get(b"a"), Some(b"1".to_vec()));
        back.verify().unwrap();
    }
}
