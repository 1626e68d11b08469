use super::*;

use proptest::prelude::*;
use proptest_derive::Arbitrary;
use std::collections::BTreeMap;

#[derive(Clone, Debug, Arbitrary)]
enum Op {
    Insert(#[proptest(strategy = "0u16..96")] u16, u32),
    Remove(#[proptest(strategy = "0u16..96")] u16),
    Get(#[proptest(strategy = "0u16..96")] u16),
    PopFirst,
    PopLast,
}

#[derive(Clone, Debug, Arbitrary)]
enum MultiOp {
    Insert(#[proptest(strategy = "0u8..24")] u8, u32),
    RemoveOne(#[proptest(strategy = "0u8..24")] u8),
    RemoveAll(#[proptest(strategy = "0u8..24")] u8),
}

fn ops_strategy() -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(any::<Op>(), 0..=600)
}

fn multi_ops_strategy() -> impl Strategy<Value = Vec<MultiOp>> {
    prop::collection::vec(any::<MultiOp>(), 0..=400)
}

/// Cursor walks in both directions must visit the same sequence.
fn assert_cursors_agree<V, A: Aggregate<(u16, V)>, M: MostPolicy>(
    m: &TrbMap<u16, V, OrdCompare, A, M>,
) {
    let mut forward = Vec::new();
    let mut cur = m.first();
    while let Some(id) = cur {
        forward.push(*m.entry_at(id).unwrap().0);
        if let Some(next) = m.next(id) {
            assert_eq!(m.prev(next), Some(id), "prev(next(x)) must be x");
        }
        cur = m.next(id);
    }
    let mut backward = Vec::new();
    let mut cur = m.last();
    while let Some(id) = cur {
        backward.push(*m.entry_at(id).unwrap().0);
        cur = m.prev(id);
    }
    backward.reverse();
    assert_eq!(forward, backward);
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        max_shrink_iters: 50_000,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_map_matches_btreemap(ops in ops_strategy()) {
        let mut t: TrbMap<u16, u32, OrdCompare, SubtreeSize> = TrbMap::default();
        let mut m: BTreeMap<u16, u32> = BTreeMap::new();

        for op in ops {
            match op {
                Op::Insert(k, v) => prop_assert_eq!(t.insert(k, v), m.insert(k, v)),
                Op::Remove(k) => prop_assert_eq!(t.remove(&k), m.remove(&k)),
                Op::Get(k) => prop_assert_eq!(t.get(&k), m.get(&k)),
                Op::PopFirst => prop_assert_eq!(t.pop_first(), m.pop_first()),
                Op::PopLast => prop_assert_eq!(t.pop_last(), m.pop_last()),
            }
            prop_assert_eq!(t.len(), m.len());
            prop_assert!(t.verify().is_ok(), "{:?}", t.verify());
        }

        let got: Vec<(u16, u32)> = t.iter().map(|(k, v)| (*k, *v)).collect();
        let expected: Vec<(u16, u32)> = m.iter().map(|(k, v)| (*k, *v)).collect();
        prop_assert_eq!(&got, &expected);

        let reversed: Vec<u16> = t.keys().rev().copied().collect();
        let expected_rev: Vec<u16> = m.keys().rev().copied().collect();
        prop_assert_eq!(reversed, expected_rev);

        for (i, (k, _)) in expected.iter().enumerate() {
            prop_assert_eq!(t.select(i).map(|(k, _)| *k), Some(*k));
            prop_assert_eq!(t.rank(k), i);
        }
        prop_assert_eq!(t.select(expected.len()), None);
        assert_cursors_agree(&t);
    }

    #[test]
    fn prop_uncached_extremes_match(ops in ops_strategy()) {
        let mut t: TrbMap<u16, u32, OrdCompare, NoSum, NoMost> = TrbMap::default();
        let mut m: BTreeMap<u16, u32> = BTreeMap::new();

        for op in ops {
            match op {
                Op::Insert(k, v) => { t.insert(k, v); m.insert(k, v); }
                Op::Remove(k) | Op::Get(k) => { t.remove(&k); m.remove(&k); }
                Op::PopFirst => { t.pop_first(); m.pop_first(); }
                Op::PopLast => { t.pop_last(); m.pop_last(); }
            }
            prop_assert_eq!(t.first_key_value(), m.first_key_value());
            prop_assert_eq!(t.last_key_value(), m.last_key_value());
        }
        prop_assert!(t.verify().is_ok());
        assert_cursors_agree(&t);
    }

    #[test]
    fn prop_range_matches_btreemap(
        keys in prop::collection::vec(0u16..200, 0..120),
        lo in 0u16..210,
        span in 0u16..80,
    ) {
        let t: TrbMap<u16, ()> = keys.iter().map(|&k| (k, ())).collect();
        let m: BTreeMap<u16, ()> = keys.iter().map(|&k| (k, ())).collect();
        let hi = lo.saturating_add(span);

        let got: Vec<u16> = t.range(lo..hi).map(|(k, _)| *k).collect();
        let expected: Vec<u16> = m.range(lo..hi).map(|(k, _)| *k).collect();
        prop_assert_eq!(got, expected);

        let got: Vec<u16> = t.range(lo..=hi).rev().map(|(k, _)| *k).collect();
        let expected: Vec<u16> = m.range(lo..=hi).rev().map(|(k, _)| *k).collect();
        prop_assert_eq!(got, expected);

        let got: Vec<u16> = t.range(..hi).map(|(k, _)| *k).collect();
        let expected: Vec<u16> = m.range(..hi).map(|(k, _)| *k).collect();
        prop_assert_eq!(got, expected);

        prop_assert_eq!(
            t.lower_bound(&lo).and_then(|id| t.entry_at(id)).map(|(k, _)| *k),
            m.range(lo..).next().map(|(k, _)| *k)
        );
        prop_assert_eq!(
            t.upper_bound(&lo).and_then(|id| t.entry_at(id)).map(|(k, _)| *k),
            m.range(lo + 1..).next().map(|(k, _)| *k)
        );
    }

    #[test]
    fn prop_multimap_keeps_insertion_order(ops in multi_ops_strategy()) {
        let mut t: TrbMultiMap<u8, u32> = TrbMultiMap::new();
        let mut m: BTreeMap<u8, Vec<u32>> = BTreeMap::new();

        for op in ops {
            match op {
                MultiOp::Insert(k, v) => {
                    t.insert(k, v);
                    m.entry(k).or_default().push(v);
                }
                MultiOp::RemoveOne(k) => match t.remove_one(&k) {
                    Some(v) => {
                        let vs = m.get_mut(&k).unwrap();
                        let at = vs.iter().position(|&x| x == v).unwrap();
                        vs.remove(at);
                        if vs.is_empty() {
                            m.remove(&k);
                        }
                    }
                    None => prop_assert!(!m.contains_key(&k)),
                },
                MultiOp::RemoveAll(k) => {
                    let expected = m.remove(&k).map_or(0, |vs| vs.len());
                    prop_assert_eq!(t.remove_all(&k), expected);
                }
            }
            prop_assert!(t.verify().is_ok(), "{:?}", t.verify());
        }

        // Freed slots are reused, so equal keys only keep insertion order
        // between removals; compare per-key contents as multisets.
        for (k, vs) in &m {
            let mut got: Vec<u32> = t.get_all(k).copied().collect();
            let mut expected = vs.clone();
            got.sort_unstable();
            expected.sort_unstable();
            prop_assert_eq!(got, expected);
        }
        prop_assert_eq!(t.len(), m.values().map(Vec::len).sum::<usize>());
    }

    #[test]
    fn prop_hash_map_matches_btreemap(ops in ops_strategy(), load in 1u8..4) {
        let config = HashConfig { initial_buckets: 1, max_load_factor: f32::from(load) };
        let mut t: TrbHashMap<u16, u32> = TrbHashMap::with_config(config);
        let mut m: BTreeMap<u16, u32> = BTreeMap::new();

        for op in ops {
            match op {
                Op::Insert(k, v) => prop_assert_eq!(t.insert(k, v), m.insert(k, v)),
                Op::Remove(k) => prop_assert_eq!(t.remove(&k), m.remove(&k)),
                Op::Get(k) => prop_assert_eq!(t.get(&k), m.get(&k)),
                Op::PopFirst | Op::PopLast => {}
            }
            prop_assert_eq!(t.len(), m.len());
            prop_assert!(t.load_factor() <= t.max_load_factor() + f32::EPSILON);
        }
        prop_assert!(t.verify().is_ok(), "{:?}", t.verify());

        let mut got: Vec<(u16, u32)> = t.iter().map(|(k, v)| (*k, *v)).collect();
        got.sort_unstable();
        let expected: Vec<(u16, u32)> = m.into_iter().collect();
        prop_assert_eq!(got, expected);
    }

    #[test]
    fn prop_dio_round_trip(keys in prop::collection::vec(any::<i64>(), 0..200)) {
        let set: TrbSet<i64> = keys.iter().copied().collect();
        let mut buf = Vec::new();
        set.dio_save(&mut buf).unwrap();
        let mut back: TrbSet<i64> = TrbSet::new();
        back.dio_load(&mut std::io::Cursor::new(buf)).unwrap();
        prop_assert!(back.verify().is_ok());
        prop_assert!(back.iter().eq(set.iter()));
    }
}

fn for_each_permutation<T: Clone>(items: &[T], mut f: impl FnMut(Vec<T>)) {
    fn rec<T: Clone>(items: &[T], used: &mut [bool], out: &mut Vec<T>, f: &mut impl FnMut(Vec<T>)) {
        if out.len() == items.len() {
            f(out.clone());
            return;
        }
        for i in 0..items.len() {
            if used[i] {
                continue;
            }
            used[i] = true;
            out.push(items[i].clone());
            rec(items, used, out, f);
            out.pop();
            used[i] = false;
        }
    }

    let mut used = vec![false; items.len()];
    let mut out = Vec::with_capacity(items.len());
    rec(items, &mut used, &mut out, &mut f);
}

#[test]
fn exhaustive_insert_order_small_set() {
    let keys = [3u8, 1, 4, 5, 9, 2, 6];

    for_each_permutation(&keys, |perm| {
        let mut t: TrbSet<u8, OrdCompare, SubtreeSize> = TrbSet::default();
        for k in perm {
            assert!(t.insert(k));
            t.verify().unwrap();
        }
        let got: Vec<u8> = t.iter().copied().collect();
        assert_eq!(got, vec![1, 2, 3, 4, 5, 6, 9]);
        assert!(t.height() <= 2 * 3);
    });
}

#[test]
fn exhaustive_remove_order_small_set() {
    let keys = [10u8, 20, 30, 40, 50, 60, 70];
    let base: TrbSet<u8, OrdCompare, SubtreeSize> = keys.iter().copied().collect();

    // Insert in a fixed order, then remove in all permutations.
    for_each_permutation(&keys, |perm| {
        let mut t = base.clone();
        let mut left = keys.len();
        for k in perm {
            assert!(t.remove(&k));
            left -= 1;
            assert_eq!(t.len(), left);
            t.verify().unwrap();
        }
        assert!(t.is_empty());
        assert_eq!(t.first(), None);
        assert_eq!(t.last(), None);
    });
}

#[test]
fn random_churn_keeps_invariants() {
    use rand::prelude::*;

    let mut rng = StdRng::seed_from_u64(0x7262);
    let mut t: TrbMultiSet<u32, OrdCompare, SubtreeSize> = TrbMultiSet::default();
    let mut model: Vec<u32> = Vec::new();

    for round in 0..4000 {
        if model.is_empty() || rng.gen_bool(0.6) {
            let v = rng.gen_range(0..500);
            t.insert(v);
            let at = model.partition_point(|&x| x <= v);
            model.insert(at, v);
        } else {
            let v = model[rng.gen_range(0..model.len())];
            assert!(t.remove_one(&v));
            let at = model.partition_point(|&x| x < v);
            model.remove(at);
        }
        if round % 97 == 0 {
            t.verify().unwrap();
            assert!(t.iter().copied().eq(model.iter().copied()));
        }
    }

    while let Some(id) = t.first() {
        t.remove_at(id).unwrap();
    }
    t.verify().unwrap();
    assert!(t.is_empty());
}
