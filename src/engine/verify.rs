//! Independent invariant checks.
//!
//! Everything here recomputes from child links alone and never trusts the
//! threads or cached values it is checking. Always compiled, so release
//! builds can run the same checks the debug assertions cover.

use thiserror::Error;

use super::{move_next, MostPolicy, TreeHead, MAX_HEIGHT};
use crate::aggregate::Aggregate;
use crate::arena::NodeArena;
use crate::link::{Dir, NIL};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("root node {0} is red")]
    RedRoot(u32),

    #[error("red node {node} has red child {child}")]
    RedRed { node: u32, child: u32 },

    #[error("black height differs under node {node}: left {left}, right {right}")]
    BlackHeight { node: u32, left: usize, right: usize },

    #[error("{dir:?} thread of node {node} points to {actual}, expected {expected}")]
    BadThread {
        node: u32,
        dir: Dir,
        actual: u32,
        expected: u32,
    },

    #[error("node {0} is linked into the tree but not live")]
    DeadNode(u32),

    #[error("tree holds {actual} nodes but its head counts {expected}")]
    Count { expected: usize, actual: usize },

    #[error("cached {which} node is {actual}, expected {expected}")]
    Extreme {
        which: &'static str,
        actual: u32,
        expected: u32,
    },

    #[error("threaded walk disagrees with the child links at position {0}")]
    Walk(usize),

    #[error("nodes {prev} and {next} are out of order")]
    Order { prev: u32, next: u32 },

    #[error("tree is deeper than {0}")]
    TooDeep(usize),

    #[error("aggregate of node {0} is stale")]
    StaleSum(u32),

    #[error("node {node} sits in bucket {actual}, expected {expected}")]
    WrongBucket {
        node: u32,
        actual: usize,
        expected: usize,
    },
}

/// Check colours, black heights, threads, count and cached extremes.
///
/// Returns the nodes in order, for the caller to check key order against its
/// comparator.
pub(crate) fn verify_structure<T, S, M: MostPolicy>(
    arena: &NodeArena<T, S>,
    head: &TreeHead<M>,
) -> Result<Vec<u32>, InvariantViolation> {
    let mut order = Vec::with_capacity(head.count);
    if head.root != NIL {
        if arena.links(head.root).is_red() {
            return Err(InvariantViolation::RedRoot(head.root));
        }
        black_height(arena, head.root, 1, &mut order)?;
    }
    if order.len() != head.count {
        return Err(InvariantViolation::Count {
            expected: head.count,
            actual: order.len(),
        });
    }

    for (i, &node) in order.iter().enumerate() {
        let l = arena.links(node);
        let pred = if i == 0 { NIL } else { order[i - 1] };
        let succ = order.get(i + 1).copied().unwrap_or(NIL);
        for (dir, expected) in [(Dir::Left, pred), (Dir::Right, succ)] {
            if l.is_thread(dir) && l.link(dir) != expected {
                return Err(InvariantViolation::BadThread {
                    node,
                    dir,
                    actual: l.link(dir),
                    expected,
                });
            }
        }
    }

    // The threaded walk must visit exactly the same sequence.
    let mut cur = head.first(arena);
    for (i, &node) in order.iter().enumerate() {
        if cur != node {
            return Err(InvariantViolation::Walk(i));
        }
        cur = move_next(arena, cur);
    }
    if cur != NIL {
        return Err(InvariantViolation::Walk(order.len()));
    }

    if M::CACHED {
        let first = order.first().copied().unwrap_or(NIL);
        let last = order.last().copied().unwrap_or(NIL);
        if head.most.left() != first {
            return Err(InvariantViolation::Extreme {
                which: "leftmost",
                actual: head.most.left(),
                expected: first,
            });
        }
        if head.most.right() != last {
            return Err(InvariantViolation::Extreme {
                which: "rightmost",
                actual: head.most.right(),
                expected: last,
            });
        }
    }
    Ok(order)
}

/// Black height of the subtree at `node`, collecting nodes in order.
fn black_height<T, S>(
    arena: &NodeArena<T, S>,
    node: u32,
    depth: usize,
    order: &mut Vec<u32>,
) -> Result<usize, InvariantViolation> {
    if depth > MAX_HEIGHT {
        return Err(InvariantViolation::TooDeep(MAX_HEIGHT));
    }
    if !arena.is_live(node) {
        return Err(InvariantViolation::DeadNode(node));
    }
    let l = *arena.links(node);
    let mut heights = [0usize; 2];
    for dir in [Dir::Left, Dir::Right] {
        if dir == Dir::Right {
            order.push(node);
        }
        if l.is_child(dir) {
            let child = l.link(dir);
            if !arena.is_live(child) {
                return Err(InvariantViolation::DeadNode(child));
            }
            if l.is_red() && arena.links(child).is_red() {
                return Err(InvariantViolation::RedRed { node, child });
            }
            heights[dir as usize] = black_height(arena, child, depth + 1, order)?;
        }
    }
    if heights[0] != heights[1] {
        return Err(InvariantViolation::BlackHeight {
            node,
            left: heights[0],
            right: heights[1],
        });
    }
    Ok(heights[0] + usize::from(l.is_black()))
}

/// Recompute every aggregate from scratch and compare with the stored one.
///
/// Recursive: meant as a test oracle on trees already known to be balanced.
pub(crate) fn check_sum<T, A: Aggregate<T>>(
    arena: &NodeArena<T, A::Sum>,
    root: u32,
) -> Result<(), InvariantViolation> {
    if !A::ENABLED || root == NIL {
        return Ok(());
    }
    subtree_sum::<T, A>(arena, root).map(|_| ())
}

fn subtree_sum<T, A: Aggregate<T>>(
    arena: &NodeArena<T, A::Sum>,
    node: u32,
) -> Result<A::Sum, InvariantViolation> {
    let l = *arena.links(node);
    let mut sum = A::init(arena.value(node));
    for dir in [Dir::Left, Dir::Right] {
        if l.is_child(dir) {
            let child = subtree_sum::<T, A>(arena, l.link(dir))?;
            A::add(&mut sum, &child);
        }
    }
    if sum != *arena.sum(node) {
        return Err(InvariantViolation::StaleSum(node));
    }
    Ok(sum)
}
