//! Comparators and key extraction.

use std::cmp::Ordering;
use std::marker::PhantomData;

/// Strict weak order over keys.
///
/// Only `less` is required. Comparators that can answer with one call should
/// override `compare` and set `THREE_WAY`; the search then stops at the first
/// equal node instead of running a lower-bound descent.
pub trait KeyCompare<K: ?Sized> {
    const THREE_WAY: bool = false;

    fn less(&self, a: &K, b: &K) -> bool;

    #[inline]
    fn compare(&self, a: &K, b: &K) -> Ordering {
        if self.less(a, b) {
            Ordering::Less
        } else if self.less(b, a) {
            Ordering::Greater
        } else {
            Ordering::Equal
        }
    }
}

/// Natural order via [`Ord`].
#[derive(Clone, Copy, Debug, Default)]
pub struct OrdCompare;

impl<K: Ord + ?Sized> KeyCompare<K> for OrdCompare {
    const THREE_WAY: bool = true;

    #[inline]
    fn less(&self, a: &K, b: &K) -> bool {
        a < b
    }

    #[inline]
    fn compare(&self, a: &K, b: &K) -> Ordering {
        a.cmp(b)
    }
}

/// Strict `<` predicate.
pub struct LessBy<F> {
    less: F,
}

impl<F> LessBy<F> {
    pub fn new(less: F) -> Self {
        Self { less }
    }
}

impl<K: ?Sized, F: Fn(&K, &K) -> bool> KeyCompare<K> for LessBy<F> {
    #[inline]
    fn less(&self, a: &K, b: &K) -> bool {
        (self.less)(a, b)
    }
}

/// Three-way comparison function.
pub struct CompareBy<F> {
    cmp: F,
}

impl<F> CompareBy<F> {
    pub fn new(cmp: F) -> Self {
        Self { cmp }
    }
}

impl<K: ?Sized, F: Fn(&K, &K) -> Ordering> KeyCompare<K> for CompareBy<F> {
    const THREE_WAY: bool = true;

    #[inline]
    fn less(&self, a: &K, b: &K) -> bool {
        (self.cmp)(a, b) == Ordering::Less
    }

    #[inline]
    fn compare(&self, a: &K, b: &K) -> Ordering {
        (self.cmp)(a, b)
    }
}

/// Reverses another comparator.
#[derive(Clone, Copy, Debug, Default)]
pub struct Reverse<C>(pub C);

impl<K: ?Sized, C: KeyCompare<K>> KeyCompare<K> for Reverse<C> {
    const THREE_WAY: bool = C::THREE_WAY;

    #[inline]
    fn less(&self, a: &K, b: &K) -> bool {
        self.0.less(b, a)
    }

    #[inline]
    fn compare(&self, a: &K, b: &K) -> Ordering {
        self.0.compare(b, a)
    }
}

/// Projects the ordering key out of a stored element.
pub trait KeyOf<T> {
    type Key: ?Sized;

    fn key(value: &T) -> &Self::Key;
}

/// The element is its own key (sets).
pub struct Identity<T>(PhantomData<T>);

impl<T> KeyOf<T> for Identity<T> {
    type Key = T;

    #[inline]
    fn key(value: &T) -> &T {
        value
    }
}

/// First field of a `(key, value)` pair (maps).
pub struct First<K, V>(PhantomData<(K, V)>);

impl<K, V> KeyOf<(K, V)> for First<K, V> {
    type Key = K;

    #[inline]
    fn key(value: &(K, V)) -> &K {
        &value.0
    }
}
