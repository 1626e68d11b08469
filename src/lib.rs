//! # trb-rs
//!
//! Threaded red-black trees stored in a node arena.
//!
//! Every node carries two tagged 32-bit link words. A slot that has no child
//! holds a *thread* to the in-order predecessor or successor instead, so
//! iteration needs neither parent pointers nor a stack. Nodes live in one
//! `Vec` and are addressed by index; erased slots go on an intrusive free list
//! and are reused before the arena grows.
//!
//! ## Example
//!
//! ```rust
//! use trb_rs::TrbMap;
//!
//! let mut map = TrbMap::new();
//! map.insert(5, "five");
//! map.insert(3, "three");
//! map.insert(8, "eight");
//!
//! assert_eq!(map.get(&3), Some(&"three"));
//! let keys: Vec<_> = map.keys().copied().collect();
//! assert_eq!(keys, vec![3, 5, 8]);
//! ```
//!
//! ## Layers
//!
//! - `engine` (internal): insert / remove / navigation over a node arena
//!   and a tree head, driven by recorded descent paths.
//! - [`RawTree`]: one arena plus one head, searched with caller orderings.
//! - [`TrbTree`], [`TrbMap`], [`TrbSet`], [`TrbMultiMap`], [`TrbMultiSet`]:
//!   comparator-typed containers.
//! - [`TrbHashMap`], [`TrbHashSet`]: hash buckets that are each a threaded
//!   tree over a shared arena.
//!
//! Only the containers, their policies and [`NodeId`] handles are public;
//! arena and path mechanics stay inside the crate:
//!
//! ```compile_fail
//! use trb_rs::engine::TreeHead;
//! ```

#![deny(unsafe_op_in_unsafe_fn)]

use std::collections::TryReserveError;

use thiserror::Error;

pub mod aggregate;
pub(crate) mod arena;
pub mod compare;
pub mod dio;
pub(crate) mod engine;
pub mod hash;
pub mod link;
pub mod map;
pub mod raw;
pub mod set;
pub mod tree;

pub use aggregate::{Aggregate, NoSum, SubtreeSize};
pub use compare::{CompareBy, First, Identity, KeyCompare, KeyOf, LessBy, OrdCompare, Reverse};
pub use dio::Codec;
pub use engine::verify::InvariantViolation;
pub use engine::{CacheMost, MostPolicy, NoMost};
pub use hash::{HashConfig, TrbHashMap, TrbHashSet};
pub use link::{Color, Dir, NodeId, MAX_NODES};
pub use map::{TrbMap, TrbMultiMap};
pub use raw::RawTree;
pub use set::{TrbMultiSet, TrbSet};
pub use tree::TrbTree;

// =============================================================================
// Errors
// =============================================================================

/// Recoverable failures. Everything else is either a normal outcome
/// (duplicate key, lookup miss) or a contract violation that panics.
#[derive(Debug, Error)]
pub enum TrbError {
    #[error("node arena allocation failed: {0}")]
    Alloc(#[from] TryReserveError),

    #[error("node arena is full ({max} slots)")]
    CapacityOverflow { max: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("duplicate key at element {index}")]
    DuplicateKey { index: u64 },

    #[error("corrupt input: {0}")]
    Corrupt(String),
}

pub type Result<T, E = TrbError> = std::result::Result<T, E>;

/// Panic path for the infallible `insert` family.
#[cold]
#[inline(never)]
pub(crate) fn alloc_failed(err: TrbError) -> ! {
    panic!("{err}")
}

#[cfg(test)]
mod proptests;
