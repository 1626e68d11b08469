//! Unlinking a node and restoring red-black balance.

use super::{descend, move_next, move_prev, set_link_at, update_sum, MostPolicy, Path, TreeHead};
use crate::aggregate::Aggregate;
use crate::arena::NodeArena;
use crate::link::{Dir, HEAD, NIL};

/// Unlink the node on top of `path` and return its index.
///
/// The path must come from a search on this tree that ended on the node.
/// The slot stays live; the caller frees it.
pub(crate) fn remove<T, A: Aggregate<T>, M: MostPolicy>(
    arena: &mut NodeArena<T, A::Sum>,
    head: &mut TreeHead<M>,
    path: &mut Path,
) -> u32 {
    let p = path.pop();
    debug_assert!(arena.is_live(p));
    let k = path.len();
    head.count -= 1;

    if M::CACHED {
        if head.most.left() == p {
            head.most.set_left(move_next(arena, p));
        }
        if head.most.right() == p {
            head.most.set_right(move_prev(arena, p));
        }
    }

    // Every ancestor loses exactly `p`.
    if A::ENABLED {
        let lost = A::init(arena.value(p));
        for i in 1..k {
            A::sub(arena.sum_mut(path.node(i)), &lost);
        }
    }

    let pl = *arena.links(p);
    let (parent, pdir) = (path.node(k - 1), path.dir(k - 1));

    if pl.right_is_thread() {
        if pl.left_is_child() {
            // Left subtree moves up; its maximum inherits p's successor.
            let t = descend(arena, pl.left_get_link(), Dir::Right);
            arena.links_mut(t).set_link(Dir::Right, pl.right_get_link());
            set_link_at(arena, head, parent, pdir, pl.left_get_link());
        } else {
            // Leaf: the parent's slot turns back into a thread.
            set_link_at(arena, head, parent, pdir, pl.link(pdir));
            if parent != HEAD {
                arena.links_mut(parent).set_thread(pdir);
            }
        }
    } else {
        let mut r = pl.right_get_link();
        if arena.links(r).left_is_thread() {
            // Right child is the successor: it takes p's place directly.
            {
                let rl = arena.links_mut(r);
                rl.set_link(Dir::Left, pl.left_get_link());
                if pl.left_is_child() {
                    rl.set_child(Dir::Left);
                } else {
                    rl.set_thread(Dir::Left);
                }
            }
            if pl.left_is_child() {
                let t = descend(arena, pl.left_get_link(), Dir::Right);
                arena.links_mut(t).set_link(Dir::Right, r);
            }
            set_link_at(arena, head, parent, pdir, r);
            swap_colors(arena, p, r);
            path.push(r, Dir::Right);
            update_sum::<T, A>(arena, r);
        } else {
            // Successor sits at the bottom of the right subtree's left spine.
            let j = k;
            path.push(p, Dir::Right);
            let s = loop {
                path.push(r, Dir::Left);
                let s = arena.links(r).left_get_link();
                if arena.links(s).left_is_thread() {
                    break s;
                }
                r = s;
            };
            path.set(j, s, Dir::Right);

            let sl = *arena.links(s);
            if sl.right_is_child() {
                arena.links_mut(r).set_link(Dir::Left, sl.right_get_link());
            } else {
                let rl = arena.links_mut(r);
                rl.set_link(Dir::Left, s);
                rl.set_thread(Dir::Left);
            }

            arena.links_mut(s).set_link(Dir::Left, pl.left_get_link());
            if pl.left_is_child() {
                let t = descend(arena, pl.left_get_link(), Dir::Right);
                arena.links_mut(t).set_link(Dir::Right, s);
                arena.links_mut(s).set_child(Dir::Left);
            }
            {
                let s_links = arena.links_mut(s);
                s_links.set_link(Dir::Right, pl.right_get_link());
                s_links.set_child(Dir::Right);
            }
            swap_colors(arena, p, s);
            set_link_at(arena, head, path.node(j - 1), path.dir(j - 1), s);

            if A::ENABLED {
                let moved = A::init(arena.value(s));
                for i in j + 1..path.len() {
                    A::sub(arena.sum_mut(path.node(i)), &moved);
                }
                update_sum::<T, A>(arena, s);
            }
        }
    }

    if arena.links(p).is_black() {
        rebalance::<T, A, M>(arena, head, path);
    }
    p
}

#[inline]
fn swap_colors<T, S>(arena: &mut NodeArena<T, S>, a: u32, b: u32) {
    let ca = arena.links(a).color();
    let cb = arena.links(b).color();
    arena.links_mut(a).set_color(cb);
    arena.links_mut(b).set_color(ca);
}

/// Deletion fixup: the `d` side of `path.node(k - 1)` is one black short.
fn rebalance<T, A: Aggregate<T>, M: MostPolicy>(
    arena: &mut NodeArena<T, A::Sum>,
    head: &mut TreeHead<M>,
    path: &mut Path,
) {
    let mut k = path.len();
    while k > 1 {
        let q = path.node(k - 1);
        let d = path.dir(k - 1);

        let ql = *arena.links(q);
        if ql.is_child(d) {
            let x = ql.link(d);
            if arena.links(x).is_red() {
                arena.links_mut(x).set_black();
                break;
            }
        }

        let mut w = ql.link(d.flip());
        trb_assert!(ql.is_child(d.flip()), "short side must have a real sibling");

        if arena.links(w).is_red() {
            trb_assert!(
                arena.links(w).is_child(d),
                "red sibling must have real children"
            );
            arena.links_mut(w).set_black();
            arena.links_mut(q).set_red();
            let w_inner = arena.links(w).link(d);
            arena.links_mut(q).set_link(d.flip(), w_inner);
            arena.links_mut(w).set_link(d, q);
            set_link_at(arena, head, path.node(k - 2), path.dir(k - 2), w);
            path.set(k, q, d);
            path.set(k - 1, w, d);
            k += 1;
            update_sum::<T, A>(arena, q);
            update_sum::<T, A>(arena, w);
            w = arena.links(q).link(d.flip());
        }

        let wl = *arena.links(w);
        let near_black = wl.is_thread(d) || arena.links(wl.link(d)).is_black();
        let far_black = wl.is_thread(d.flip()) || arena.links(wl.link(d.flip())).is_black();

        if near_black && far_black {
            arena.links_mut(w).set_red();
        } else {
            if far_black {
                // Near nephew is red: rotate it above the sibling.
                let y = wl.link(d);
                arena.links_mut(y).set_black();
                arena.links_mut(w).set_red();
                let y_outer = arena.links(y).link(d.flip());
                arena.links_mut(w).set_link(d, y_outer);
                arena.links_mut(y).set_link(d.flip(), w);
                if arena.links(y).is_thread(d.flip()) {
                    arena.links_mut(y).set_child(d.flip());
                    let wl = arena.links_mut(w);
                    wl.set_thread(d);
                    wl.set_link(d, y);
                }
                update_sum::<T, A>(arena, w);
                update_sum::<T, A>(arena, y);
                arena.links_mut(q).set_link(d.flip(), y);
                w = y;
            }

            let q_color = arena.links(q).color();
            arena.links_mut(w).set_color(q_color);
            arena.links_mut(q).set_black();
            let w_far = arena.links(w).link(d.flip());
            arena.links_mut(w_far).set_black();
            let w_inner = arena.links(w).link(d);
            arena.links_mut(q).set_link(d.flip(), w_inner);
            arena.links_mut(w).set_link(d, q);
            set_link_at(arena, head, path.node(k - 2), path.dir(k - 2), w);
            if arena.links(w).is_thread(d) {
                arena.links_mut(w).set_child(d);
                let ql = arena.links_mut(q);
                ql.set_thread(d.flip());
                ql.set_link(d.flip(), w);
            }
            update_sum::<T, A>(arena, q);
            update_sum::<T, A>(arena, w);
            break;
        }
        k -= 1;
    }

    if head.root != NIL {
        let root = head.root;
        arena.links_mut(root).set_black();
    }
}

#[cfg(test)]
mod tests {
    use crate::aggregate::SubtreeSize;
    use crate::engine::testing::Harness;
    use crate::engine::{verify, MostPolicy};
    use crate::link::NIL;
    use crate::InvariantViolation;

    fn build(keys: &[u32]) -> Harness<SubtreeSize> {
        let mut h = Harness::new();
        for &k in keys {
            h.insert(k);
        }
        h.check();
        h
    }

    #[test]
    fn test_remove_leaf() {
        let mut h = build(&[20, 10, 30]);
        assert!(h.remove(10));
        h.check();
        assert_eq!(h.keys(), vec![20, 30]);
        let root = h.head.root;
        assert!(h.arena.links(root).left_is_thread());
        assert_eq!(h.arena.links(root).left_get_link(), NIL);
    }

    #[test]
    fn test_remove_node_with_left_child_only() {
        let mut h = build(&[20, 10, 30, 5]);
        assert!(h.remove(10));
        h.check();
        assert_eq!(h.keys(), vec![5, 20, 30]);
    }

    #[test]
    fn test_remove_node_whose_right_child_is_successor() {
        let mut h = build(&[20, 10, 30, 40]);
        assert!(h.remove(30));
        h.check();
        assert_eq!(h.keys(), vec![10, 20, 40]);
    }

    #[test]
    fn test_remove_node_with_deep_successor() {
        let mut h = build(&[50, 20, 80, 10, 30, 70, 90, 60, 75]);
        assert!(h.remove(50));
        h.check();
        assert_eq!(h.keys(), vec![10, 20, 30, 60, 70, 75, 80, 90]);
        assert!(!h.remove(50));
    }

    #[test]
    fn test_remove_root_until_empty() {
        let mut h = build(&(0..50).collect::<Vec<_>>());
        while h.head.root != NIL {
            let root = h.head.root;
            let key = *h.arena.value(root);
            assert!(h.remove(key));
            h.check();
        }
        assert_eq!(h.head.len(), 0);
        assert_eq!(h.head.most.left(), NIL);
        assert_eq!(h.head.most.right(), NIL);
    }

    #[test]
    fn test_remove_extremes_updates_cache() {
        let mut h = build(&[4, 2, 6, 1, 3, 5, 7]);
        h.remove(1);
        assert_eq!(*h.arena.value(h.head.most.left()), 2);
        h.remove(7);
        assert_eq!(*h.arena.value(h.head.most.right()), 6);
        h.check();
    }

    #[test]
    fn test_sums_track_subtree_sizes() {
        let mut h = build(&(0..128).collect::<Vec<_>>());
        for k in (0..128).step_by(3) {
            h.remove(k);
            h.check();
        }
        let root = h.head.root;
        assert_eq!(*h.arena.sum(root), h.head.len());
    }

    /// Valid shape, but the red leaf 10 repainted black.
    fn with_black_leaf() -> Harness<SubtreeSize> {
        let mut h = build(&[20, 10, 30]);
        let ten = h.find(10);
        h.arena.links_mut(ten).set_black();
        h
    }

    #[test]
    fn test_verify_reports_recoloured_leaf() {
        let h = with_black_leaf();
        assert!(matches!(
            verify::verify_structure(&h.arena, &h.head),
            Err(InvariantViolation::BlackHeight { .. })
        ));
    }

    #[cfg(any(debug_assertions, feature = "strict-invariants"))]
    #[test]
    #[should_panic(expected = "red sibling must have real children")]
    fn test_checked_build_stops_fixup_on_bad_colour() {
        let mut h = with_black_leaf();
        h.remove(10);
    }

    #[cfg(not(any(debug_assertions, feature = "strict-invariants")))]
    #[test]
    fn test_production_build_compiles_checks_out() {
        trb_assert!(false, "rotation checks are off in this build");
        let h = with_black_leaf();
        assert!(verify::verify_structure(&h.arena, &h.head).is_err());
    }
}
