//! Linking a fresh node and restoring red-black balance.

use super::{set_link_at, update_sum, MostPolicy, Path, TreeHead};
use crate::aggregate::Aggregate;
use crate::arena::NodeArena;
use crate::link::{Dir, NodeLinks, HEAD, NIL};

/// Link node `n` at the attachment point on top of `path`.
///
/// `n` must be a live slot that is not part of any tree; its links are
/// rewritten here. The path must come from a search on this tree that did not
/// report a match.
pub(crate) fn insert<T, A: Aggregate<T>, M: MostPolicy>(
    arena: &mut NodeArena<T, A::Sum>,
    head: &mut TreeHead<M>,
    path: &Path,
    n: u32,
) {
    debug_assert!(arena.is_live(n));
    let (parent, dir) = path.top();
    head.count += 1;

    let mut fresh = NodeLinks::new();
    fresh.set_used();

    if parent == HEAD {
        debug_assert_eq!(head.root, NIL);
        *arena.links_mut(n) = fresh;
        if A::ENABLED {
            let sum = A::init(arena.value(n));
            arena.set_sum(n, sum);
        }
        head.root = n;
        head.most.set_left(n);
        head.most.set_right(n);
        return;
    }

    // The new leaf takes over the parent's thread on the outer side and
    // threads back to the parent on the inner side.
    let outer = arena.links(parent).link(dir);
    fresh.set_link(dir, outer);
    fresh.set_link(dir.flip(), parent);
    fresh.set_red();
    *arena.links_mut(n) = fresh;
    {
        let pl = arena.links_mut(parent);
        debug_assert!(pl.is_thread(dir), "attachment slot is already a child");
        pl.set_link(dir, n);
        pl.set_child(dir);
    }
    if outer == NIL {
        match dir {
            Dir::Left => head.most.set_left(n),
            Dir::Right => head.most.set_right(n),
        }
    }

    if A::ENABLED {
        let sum = A::init(arena.value(n));
        for i in 1..path.len() {
            A::add(arena.sum_mut(path.node(i)), &sum);
        }
        arena.set_sum(n, sum);
    }

    rebalance::<T, A, M>(arena, head, path);
    let root = head.root;
    arena.links_mut(root).set_black();
}

/// Walk back up while the parent of the current red node is red.
///
/// `k` indexes the path so that `path.node(k - 1)` is the parent of the red
/// node under consideration.
fn rebalance<T, A: Aggregate<T>, M: MostPolicy>(
    arena: &mut NodeArena<T, A::Sum>,
    head: &mut TreeHead<M>,
    path: &Path,
) {
    let mut k = path.len();
    while k >= 3 && arena.links(path.node(k - 1)).is_red() {
        let grand = path.node(k - 2);
        let d = path.dir(k - 2);

        let gl = *arena.links(grand);
        let uncle = gl.link(d.flip());
        if gl.is_child(d.flip()) && arena.links(uncle).is_red() {
            arena.links_mut(path.node(k - 1)).set_black();
            arena.links_mut(uncle).set_black();
            arena.links_mut(grand).set_red();
            k -= 2;
            continue;
        }

        // Inner grandchild: rotate it above its parent first.
        let y = if path.dir(k - 1) == d {
            path.node(k - 1)
        } else {
            let x = path.node(k - 1);
            let y = arena.links(x).link(d.flip());
            let y_inner = arena.links(y).link(d);
            arena.links_mut(x).set_link(d.flip(), y_inner);
            arena.links_mut(y).set_link(d, x);
            arena.links_mut(grand).set_link(d, y);
            if arena.links(y).is_thread(d) {
                arena.links_mut(y).set_child(d);
                let xl = arena.links_mut(x);
                xl.set_thread(d.flip());
                xl.set_link(d.flip(), y);
            }
            update_sum::<T, A>(arena, x);
            update_sum::<T, A>(arena, y);
            y
        };

        let x = grand;
        trb_assert!(arena.links(y).is_red(), "rotated child must be red");
        arena.links_mut(x).set_red();
        arena.links_mut(y).set_black();
        let y_outer = arena.links(y).link(d.flip());
        arena.links_mut(x).set_link(d, y_outer);
        arena.links_mut(y).set_link(d.flip(), x);
        set_link_at(arena, head, path.node(k - 3), path.dir(k - 3), y);
        if arena.links(y).is_thread(d.flip()) {
            arena.links_mut(y).set_child(d.flip());
            let xl = arena.links_mut(x);
            xl.set_thread(d);
            xl.set_link(d, y);
        }
        update_sum::<T, A>(arena, x);
        update_sum::<T, A>(arena, y);
        break;
    }
}

#[cfg(test)]
mod tests {
    use crate::engine::testing::Harness;
    use crate::engine::{move_next, move_prev, MostPolicy};
    use crate::link::NIL;

    #[test]
    fn test_first_node_is_black_root_with_nil_threads() {
        let mut h: Harness = Harness::new();
        h.insert(42);
        let root = h.head.root;
        let l = h.arena.links(root);
        assert!(l.is_black());
        assert!(l.left_is_thread() && l.right_is_thread());
        assert_eq!(l.left_get_link(), NIL);
        assert_eq!(l.right_get_link(), NIL);
        assert_eq!(h.head.most.left(), root);
        assert_eq!(h.head.most.right(), root);
    }

    #[test]
    fn test_leaf_threads_after_attach() {
        let mut h: Harness = Harness::new();
        h.insert(10);
        h.insert(5);
        let ten = h.find(10);
        let five = h.find(5);
        let fl = *h.arena.links(five);
        assert!(fl.is_red());
        assert_eq!(fl.left_get_link(), NIL);
        assert!(fl.right_is_thread());
        assert_eq!(fl.right_get_link(), ten);
        assert!(h.arena.links(ten).left_is_child());
        assert_eq!(h.head.most.left(), five);
        assert_eq!(move_next(&h.arena, five), ten);
        assert_eq!(move_prev(&h.arena, ten), five);
    }

    #[test]
    fn test_all_four_rotation_shapes() {
        // left-left, left-right, right-right, right-left
        for keys in [[30, 20, 10], [30, 10, 20], [10, 20, 30], [10, 30, 20]] {
            let mut h: Harness = Harness::new();
            for k in keys {
                h.insert(k);
            }
            h.check();
            assert_eq!(*h.arena.value(h.head.root), 20, "keys {keys:?}");
            assert_eq!(h.keys(), vec![10, 20, 30]);
        }
    }

    #[test]
    fn test_descending_inserts_keep_extremes() {
        let mut h: Harness = Harness::new();
        for k in (0..64).rev() {
            h.insert(k);
            assert_eq!(*h.arena.value(h.head.most.left()), k);
            assert_eq!(*h.arena.value(h.head.most.right()), 63);
        }
        h.check();
    }
}
