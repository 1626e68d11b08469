//! Descent paths and the search skeletons that record them.

use std::cmp::Ordering;

use crate::arena::NodeArena;
use crate::link::{Dir, HEAD, NIL};

/// Upper bound on recorded path length, pseudo-root included.
///
/// A red-black tree of `n` nodes is at most `2 * log2(n + 1)` deep, so 80
/// covers every tree the 30-bit index space can hold with room to spare for
/// the extra entry deletion fixup pushes.
pub const MAX_HEIGHT: usize = 80;

/// `(node, direction)` pairs from the pseudo-root down.
///
/// After a search, the top entry is either the attachment parent with the
/// side to attach on, or the found node itself.
pub(crate) struct Path {
    nodes: [u32; MAX_HEIGHT],
    dirs: [Dir; MAX_HEIGHT],
    len: usize,
}

impl Path {
    pub(crate) fn new() -> Self {
        Self {
            nodes: [HEAD; MAX_HEIGHT],
            dirs: [Dir::Left; MAX_HEIGHT],
            len: 0,
        }
    }

    /// Leave only the pseudo-root, whose left slot is the tree root.
    #[inline]
    pub(crate) fn reset(&mut self) {
        self.nodes[0] = HEAD;
        self.dirs[0] = Dir::Left;
        self.len = 1;
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub(crate) fn push(&mut self, node: u32, dir: Dir) {
        assert!(self.len < MAX_HEIGHT, "tree deeper than {MAX_HEIGHT}");
        self.nodes[self.len] = node;
        self.dirs[self.len] = dir;
        self.len += 1;
    }

    #[inline]
    pub(crate) fn pop(&mut self) -> u32 {
        debug_assert!(self.len > 1);
        self.len -= 1;
        self.nodes[self.len]
    }

    /// Overwrite entry `i`, growing the path when `i == len`.
    #[inline]
    pub(crate) fn set(&mut self, i: usize, node: u32, dir: Dir) {
        assert!(i < MAX_HEIGHT, "tree deeper than {MAX_HEIGHT}");
        debug_assert!(i <= self.len);
        self.nodes[i] = node;
        self.dirs[i] = dir;
        self.len = self.len.max(i + 1);
    }

    #[inline]
    pub(crate) fn truncate(&mut self, len: usize) {
        debug_assert!(len >= 1 && len <= self.len);
        self.len = len;
    }

    #[inline]
    pub(crate) fn node(&self, i: usize) -> u32 {
        debug_assert!(i < self.len);
        self.nodes[i]
    }

    #[inline]
    pub(crate) fn dir(&self, i: usize) -> Dir {
        debug_assert!(i < self.len);
        self.dirs[i]
    }

    #[inline]
    pub(crate) fn top(&self) -> (u32, Dir) {
        (self.nodes[self.len - 1], self.dirs[self.len - 1])
    }
}

/// Three-way descent from `root`.
///
/// `ord(idx, value)` orders the probe against the node. Stops on `Equal` with
/// the node on top of the path and returns `true`; otherwise records the
/// attachment point and returns `false`. An ordering that never answers
/// `Equal` always descends to an attachment point.
pub(crate) fn find_path<T, S>(
    arena: &NodeArena<T, S>,
    root: u32,
    path: &mut Path,
    mut ord: impl FnMut(u32, &T) -> Ordering,
) -> bool {
    path.reset();
    let mut p = root;
    if p == NIL {
        return false;
    }
    loop {
        let dir = match ord(p, arena.value(p)) {
            Ordering::Equal => {
                path.push(p, Dir::Left);
                return true;
            }
            Ordering::Less => Dir::Left,
            Ordering::Greater => Dir::Right,
        };
        path.push(p, dir);
        let l = arena.links(p);
        if l.is_thread(dir) {
            return false;
        }
        p = l.link(dir);
    }
}

/// Lower-bound descent for predicate-only comparators.
///
/// Descends with one `probe_less` call per level, remembering the deepest
/// node that is not greater than the probe. A final `node_less` call on that
/// candidate decides equality; on a match the path is cut back to end at the
/// candidate.
pub(crate) fn find_path_by_less<T, S>(
    arena: &NodeArena<T, S>,
    root: u32,
    path: &mut Path,
    mut probe_less: impl FnMut(&T) -> bool,
    mut node_less: impl FnMut(&T) -> bool,
) -> bool {
    path.reset();
    let mut p = root;
    if p == NIL {
        return false;
    }
    let mut candidate = None;
    loop {
        let dir = if probe_less(arena.value(p)) {
            Dir::Left
        } else {
            candidate = Some(path.len());
            Dir::Right
        };
        path.push(p, dir);
        let l = arena.links(p);
        if l.is_thread(dir) {
            break;
        }
        p = l.link(dir);
    }
    if let Some(depth) = candidate {
        if !node_less(arena.value(path.node(depth))) {
            path.truncate(depth + 1);
            return true;
        }
    }
    false
}

/// First node in order for which `pred` holds, `NIL` if none.
///
/// `pred` must be monotone over the in-order sequence (false ... true).
pub(crate) fn partition_point<T, S>(
    arena: &NodeArena<T, S>,
    root: u32,
    mut pred: impl FnMut(u32, &T) -> bool,
) -> u32 {
    let mut found = NIL;
    let mut p = root;
    while p != NIL {
        let dir = if pred(p, arena.value(p)) {
            found = p;
            Dir::Left
        } else {
            Dir::Right
        };
        let l = arena.links(p);
        if l.is_thread(dir) {
            break;
        }
        p = l.link(dir);
    }
    found
}
