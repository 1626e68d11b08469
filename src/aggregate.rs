//! Per-node aggregate values ("sums") rolled up through rotations.
//!
//! A node's sum covers its whole subtree:
//! `init(value) + sum(left child) + sum(right child)`, children counted only
//! when the slot is a real child (threads contribute nothing).

use std::fmt::Debug;

/// Monoid maintained incrementally by the tree.
///
/// `sub` must undo `add`; removal subtracts the erased element from every
/// ancestor instead of recomputing them.
pub trait Aggregate<T> {
    type Sum: Clone + PartialEq + Debug;

    /// `false` lets the engine skip all sum bookkeeping at compile time.
    const ENABLED: bool = true;

    /// Sum of a single-node subtree.
    fn init(value: &T) -> Self::Sum;

    fn add(acc: &mut Self::Sum, other: &Self::Sum);

    fn sub(acc: &mut Self::Sum, other: &Self::Sum);
}

/// No aggregate. Zero-sized in every node.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoSum;

impl<T> Aggregate<T> for NoSum {
    type Sum = ();
    const ENABLED: bool = false;

    #[inline]
    fn init(_: &T) {}

    #[inline]
    fn add(_: &mut (), _: &()) {}

    #[inline]
    fn sub(_: &mut (), _: &()) {}
}

/// Subtree node count. Enables `select` / `rank` on the containers.
#[derive(Clone, Copy, Debug, Default)]
pub struct SubtreeSize;

impl<T> Aggregate<T> for SubtreeSize {
    type Sum = usize;

    #[inline]
    fn init(_: &T) -> usize {
        1
    }

    #[inline]
    fn add(acc: &mut usize, other: &usize) {
        *acc += *other;
    }

    #[inline]
    fn sub(acc: &mut usize, other: &usize) {
        *acc -= *other;
    }
}
