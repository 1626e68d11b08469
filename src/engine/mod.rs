//! Threaded red-black tree engine.
//!
//! Free functions over a [`NodeArena`] and a [`TreeHead`]. The engine never
//! allocates: callers take a slot from the arena first, then link it with
//! [`insert`]; [`remove`] unlinks a node and leaves freeing to the caller.
//!
//! No parent pointers are stored. Every mutation works from a [`Path`]
//! recorded on the way down, whose entry 0 is the pseudo-root `HEAD` standing
//! for the tree head's root slot.

use std::fmt::Debug;

use crate::arena::NodeArena;
use crate::link::{Dir, HEAD, NIL};

/// Rotation-local structural checks. On in debug builds and with the
/// `strict-invariants` feature; compiled out otherwise.
macro_rules! trb_assert {
    ($($arg:tt)*) => {
        if cfg!(any(debug_assertions, feature = "strict-invariants")) {
            assert!($($arg)*);
        }
    };
}

mod insert;
pub(crate) mod path;
mod remove;
pub(crate) mod verify;

pub(crate) use insert::insert;
pub(crate) use path::{Path, MAX_HEIGHT};
pub(crate) use remove::remove;

// =============================================================================
// Leftmost / rightmost caching policy
// =============================================================================

/// Whether a tree head caches its leftmost and rightmost nodes.
///
/// Caching costs two words per head and makes `first`/`last` O(1); without
/// it they descend from the root.
pub trait MostPolicy: Clone + Default + Debug {
    const CACHED: bool;

    fn left(&self) -> u32;
    fn right(&self) -> u32;
    fn set_left(&mut self, idx: u32);
    fn set_right(&mut self, idx: u32);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CacheMost {
    left: u32,
    right: u32,
}

impl Default for CacheMost {
    fn default() -> Self {
        Self {
            left: NIL,
            right: NIL,
        }
    }
}

impl MostPolicy for CacheMost {
    const CACHED: bool = true;

    #[inline]
    fn left(&self) -> u32 {
        self.left
    }

    #[inline]
    fn right(&self) -> u32 {
        self.right
    }

    #[inline]
    fn set_left(&mut self, idx: u32) {
        self.left = idx;
    }

    #[inline]
    fn set_right(&mut self, idx: u32) {
        self.right = idx;
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NoMost;

impl MostPolicy for NoMost {
    const CACHED: bool = false;

    #[inline]
    fn left(&self) -> u32 {
        NIL
    }

    #[inline]
    fn right(&self) -> u32 {
        NIL
    }

    #[inline]
    fn set_left(&mut self, _: u32) {}

    #[inline]
    fn set_right(&mut self, _: u32) {}
}

// =============================================================================
// Tree head
// =============================================================================

/// Root slot, element count and cached extremes of one tree.
#[derive(Clone, Debug)]
pub struct TreeHead<M> {
    pub(crate) root: u32,
    pub(crate) count: usize,
    pub(crate) most: M,
}

impl<M: MostPolicy> TreeHead<M> {
    pub fn new() -> Self {
        Self {
            root: NIL,
            count: 0,
            most: M::default(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.root == NIL
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::new();
    }

    #[inline]
    pub(crate) fn first<T, S>(&self, arena: &NodeArena<T, S>) -> u32 {
        if M::CACHED {
            self.most.left()
        } else {
            descend(arena, self.root, Dir::Left)
        }
    }

    #[inline]
    pub(crate) fn last<T, S>(&self, arena: &NodeArena<T, S>) -> u32 {
        if M::CACHED {
            self.most.right()
        } else {
            descend(arena, self.root, Dir::Right)
        }
    }
}

impl<M: MostPolicy> Default for TreeHead<M> {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Threaded navigation
// =============================================================================

/// Follow child links in `dir` as far as they go.
#[inline]
pub(crate) fn descend<T, S>(arena: &NodeArena<T, S>, from: u32, dir: Dir) -> u32 {
    if from == NIL {
        return NIL;
    }
    let mut p = from;
    while arena.links(p).is_child(dir) {
        p = arena.links(p).link(dir);
    }
    p
}

/// In-order neighbour of `node` on side `dir` (`Right` = successor).
#[inline]
pub(crate) fn step<T, S>(arena: &NodeArena<T, S>, node: u32, dir: Dir) -> u32 {
    let l = arena.links(node);
    if l.is_thread(dir) {
        l.link(dir)
    } else {
        descend(arena, l.link(dir), dir.flip())
    }
}

/// In-order successor, `NIL` after the maximum.
#[inline]
pub(crate) fn move_next<T, S>(arena: &NodeArena<T, S>, node: u32) -> u32 {
    step(arena, node, Dir::Right)
}

/// In-order predecessor, `NIL` before the minimum.
#[inline]
pub(crate) fn move_prev<T, S>(arena: &NodeArena<T, S>, node: u32) -> u32 {
    step(arena, node, Dir::Left)
}

/// Number of nodes on the longest root-to-node path.
pub(crate) fn height<T, S>(arena: &NodeArena<T, S>, root: u32) -> usize {
    if root == NIL {
        return 0;
    }
    let mut best = 0;
    let mut stack = vec![(root, 1usize)];
    while let Some((node, depth)) = stack.pop() {
        best = best.max(depth);
        let l = arena.links(node);
        for dir in [Dir::Left, Dir::Right] {
            if l.is_child(dir) {
                stack.push((l.link(dir), depth + 1));
            }
        }
    }
    best
}

/// Write `child` into `parent`'s `dir` slot, or into the root slot when
/// `parent` is the pseudo-root. Tag bits are left alone.
#[inline]
pub(crate) fn set_link_at<T, S, M>(
    arena: &mut NodeArena<T, S>,
    head: &mut TreeHead<M>,
    parent: u32,
    dir: Dir,
    child: u32,
) {
    if parent == HEAD {
        head.root = child;
    } else {
        arena.links_mut(parent).set_link(dir, child);
    }
}

/// Recompute a node's aggregate from its own value and its real children.
#[inline]
pub(crate) fn update_sum<T, A: crate::Aggregate<T>>(arena: &mut NodeArena<T, A::Sum>, idx: u32) {
    if !A::ENABLED {
        return;
    }
    let mut sum = A::init(arena.value(idx));
    let l = *arena.links(idx);
    if l.left_is_child() {
        A::add(&mut sum, arena.sum(l.left_get_link()));
    }
    if l.right_is_child() {
        A::add(&mut sum, arena.sum(l.right_get_link()));
    }
    arena.set_sum(idx, sum);
}
