//! Compact two-word node links.
//!
//! Every node carries two 32-bit link words. Each word stores a 30-bit node
//! index plus two tag bits:
//!
//! ```text
//!  31        30         29 ............................ 0
//! +---------+----------+---------------------------------+
//! |  flag   |  thread  |            link index           |
//! +---------+----------+---------------------------------+
//! ```
//!
//! - `thread` set: the index is an in-order neighbour (predecessor in slot 0,
//!   successor in slot 1), or [`NIL`] at the tree boundary.
//! - `thread` clear: the index is a real child.
//! - `flag` in slot 0 is the colour (set = red), in slot 1 it marks a slot that
//!   holds a live value (set = used).

use std::fmt;

const FLAG_BIT: u32 = 1 << 31;
const THREAD_BIT: u32 = 1 << 30;
const LINK_MASK: u32 = THREAD_BIT - 1;

/// Nil sentinel: the all-ones 30-bit index.
pub(crate) const NIL: u32 = LINK_MASK;

/// Pseudo-root marker used in path stacks. Never stored in a link word.
pub(crate) const HEAD: u32 = u32::MAX;

/// Maximum number of node slots an arena can address.
pub const MAX_NODES: usize = NIL as usize;

/// Child / thread slot selector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Dir {
    Left = 0,
    Right = 1,
}

impl Dir {
    #[inline]
    pub fn flip(self) -> Self {
        match self {
            Dir::Left => Dir::Right,
            Dir::Right => Dir::Left,
        }
    }

    #[inline]
    fn slot(self) -> usize {
        self as usize
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Color {
    Red,
    Black,
}

/// Stable handle to a node slot.
///
/// Handles stay valid while other elements are inserted or erased. A handle
/// to an erased element reads as absent until its slot is reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub(crate) fn from_raw(raw: u32) -> Option<Self> {
        (raw != NIL).then_some(Self(raw))
    }
}

/// The two tagged link words of a node.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct NodeLinks {
    words: [u32; 2],
}

impl NodeLinks {
    /// Fresh leaf state: both slots are `NIL` threads, black, empty.
    pub const fn new() -> Self {
        Self {
            words: [NIL | THREAD_BIT; 2],
        }
    }

    #[inline]
    pub fn is_child(&self, dir: Dir) -> bool {
        self.words[dir.slot()] & THREAD_BIT == 0
    }

    #[inline]
    pub fn is_thread(&self, dir: Dir) -> bool {
        self.words[dir.slot()] & THREAD_BIT != 0
    }

    #[inline]
    pub fn set_child(&mut self, dir: Dir) {
        self.words[dir.slot()] &= !THREAD_BIT;
    }

    #[inline]
    pub fn set_thread(&mut self, dir: Dir) {
        self.words[dir.slot()] |= THREAD_BIT;
    }

    #[inline]
    pub fn link(&self, dir: Dir) -> u32 {
        self.words[dir.slot()] & LINK_MASK
    }

    /// Replace the index, keeping both tag bits of the slot.
    #[inline]
    pub fn set_link(&mut self, dir: Dir, link: u32) {
        debug_assert!(link <= LINK_MASK, "link {link:#x} exceeds 30 bits");
        let w = &mut self.words[dir.slot()];
        *w = (*w & !LINK_MASK) | (link & LINK_MASK);
    }

    #[inline]
    pub fn left_is_child(&self) -> bool {
        self.is_child(Dir::Left)
    }

    #[inline]
    pub fn right_is_child(&self) -> bool {
        self.is_child(Dir::Right)
    }

    #[inline]
    pub fn left_is_thread(&self) -> bool {
        self.is_thread(Dir::Left)
    }

    #[inline]
    pub fn right_is_thread(&self) -> bool {
        self.is_thread(Dir::Right)
    }

    #[inline]
    pub fn left_get_link(&self) -> u32 {
        self.link(Dir::Left)
    }

    #[inline]
    pub fn right_get_link(&self) -> u32 {
        self.link(Dir::Right)
    }

    // Colour lives in the flag bit of slot 0.

    #[inline]
    pub fn is_red(&self) -> bool {
        self.words[0] & FLAG_BIT != 0
    }

    #[inline]
    pub fn is_black(&self) -> bool {
        !self.is_red()
    }

    #[inline]
    pub fn set_red(&mut self) {
        self.words[0] |= FLAG_BIT;
    }

    #[inline]
    pub fn set_black(&mut self) {
        self.words[0] &= !FLAG_BIT;
    }

    #[inline]
    pub fn color(&self) -> Color {
        if self.is_red() {
            Color::Red
        } else {
            Color::Black
        }
    }

    #[inline]
    pub fn set_color(&mut self, color: Color) {
        match color {
            Color::Red => self.set_red(),
            Color::Black => self.set_black(),
        }
    }

    // Slot occupancy lives in the flag bit of slot 1.

    #[inline]
    pub fn is_used(&self) -> bool {
        self.words[1] & FLAG_BIT != 0
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        !self.is_used()
    }

    #[inline]
    pub fn set_used(&mut self) {
        self.words[1] |= FLAG_BIT;
    }

    #[inline]
    pub fn set_empty(&mut self) {
        self.words[1] &= !FLAG_BIT;
    }
}

impl Default for NodeLinks {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for NodeLinks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let side = |dir: Dir| {
            let link = self.link(dir);
            let kind = if self.is_thread(dir) { "thread" } else { "child" };
            if link == NIL {
                format!("{kind}(nil)")
            } else {
                format!("{kind}({link})")
            }
        };
        f.debug_struct("NodeLinks")
            .field("left", &side(Dir::Left))
            .field("right", &side(Dir::Right))
            .field("color", &self.color())
            .field("used", &self.is_used())
            .finish()
    }
}
