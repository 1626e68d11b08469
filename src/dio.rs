//! Binary save / load of whole containers.
//!
//! Layout: a little-endian `u64` element count, then every element in
//! iteration order through its [`Codec`]. Ordered containers therefore write
//! sorted output; hash containers write bucket order.

use std::hash::{BuildHasher, Hash};
use std::io::{self, Read, Write};

use crate::aggregate::Aggregate;
use crate::compare::KeyCompare;
use crate::engine::MostPolicy;
use crate::hash::{TrbHashMap, TrbHashSet};
use crate::map::{TrbMap, TrbMultiMap};
use crate::set::{TrbMultiSet, TrbSet};
use crate::{Result, TrbError};

/// Reservation cap while loading, so a corrupt count cannot force a huge
/// allocation up front.
const PREALLOC_LIMIT: u64 = 1 << 16;

/// Fixed binary encoding of one value.
pub trait Codec: Sized {
    fn encode<W: Write>(&self, w: &mut W) -> io::Result<()>;

    fn decode<R: Read>(r: &mut R) -> Result<Self>;
}

macro_rules! int_codec {
    ($($t:ty),*) => {$(
        impl Codec for $t {
            #[inline]
            fn encode<W: Write>(&self, w: &mut W) -> io::Result<()> {
                w.write_all(&self.to_le_bytes())
            }

            #[inline]
            fn decode<R: Read>(r: &mut R) -> Result<Self> {
                let mut buf = [0u8; std::mem::size_of::<$t>()];
                r.read_exact(&mut buf)?;
                Ok(<$t>::from_le_bytes(buf))
            }
        }
    )*};
}

int_codec!(u8, u16, u32, u64, u128, i8, i16, i32, i64, i128);

impl Codec for bool {
    fn encode<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(&[u8::from(*self)])
    }

    fn decode<R: Read>(r: &mut R) -> Result<Self> {
        match u8::decode(r)? {
            0 => Ok(false),
            1 => Ok(true),
            b => Err(TrbError::Corrupt(format!("invalid bool byte {b}"))),
        }
    }
}

impl Codec for Vec<u8> {
    fn encode<W: Write>(&self, w: &mut W) -> io::Result<()> {
        (self.len() as u64).encode(w)?;
        w.write_all(self)
    }

    fn decode<R: Read>(r: &mut R) -> Result<Self> {
        let len = u64::decode(r)?;
        let mut buf = Vec::new();
        r.take(len).read_to_end(&mut buf)?;
        if buf.len() as u64 != len {
            return Err(TrbError::Corrupt(format!(
                "byte string truncated: {} of {len} bytes",
                buf.len()
            )));
        }
        Ok(buf)
    }
}

impl Codec for String {
    fn encode<W: Write>(&self, w: &mut W) -> io::Result<()> {
        (self.len() as u64).encode(w)?;
        w.write_all(self.as_bytes())
    }

    fn decode<R: Read>(r: &mut R) -> Result<Self> {
        let bytes = Vec::<u8>::decode(r)?;
        String::from_utf8(bytes).map_err(|e| TrbError::Corrupt(e.to_string()))
    }
}

impl<A: Codec, B: Codec> Codec for (A, B) {
    fn encode<W: Write>(&self, w: &mut W) -> io::Result<()> {
        self.0.encode(w)?;
        self.1.encode(w)
    }

    fn decode<R: Read>(r: &mut R) -> Result<Self> {
        let a = A::decode(r)?;
        let b = B::decode(r)?;
        Ok((a, b))
    }
}

fn write_all<'a, T: Codec + 'a, W: Write>(
    w: &mut W,
    len: usize,
    items: impl Iterator<Item = &'a T>,
) -> Result<()> {
    (len as u64).encode(w)?;
    let mut written = 0usize;
    for item in items {
        item.encode(w)?;
        written += 1;
    }
    debug_assert_eq!(written, len);
    tracing::debug!(count = len, "dio save");
    Ok(())
}

fn read_count<R: Read>(r: &mut R) -> Result<(u64, usize)> {
    let count = u64::decode(r)?;
    Ok((count, count.min(PREALLOC_LIMIT) as usize))
}

fn loaded(count: u64) {
    tracing::debug!(count, "dio load");
}

// =============================================================================
// Ordered containers
// =============================================================================

impl<K, V, C, A, M> TrbMap<K, V, C, A, M>
where
    K: Codec,
    V: Codec,
    C: KeyCompare<K>,
    A: Aggregate<(K, V)>,
    M: MostPolicy,
{
    pub fn dio_save<W: Write>(&self, w: &mut W) -> Result<()> {
        write_all(w, self.len(), self.tree().iter())
    }

    /// Replace the contents with what `r` holds. A repeated key is an error;
    /// the map then holds the elements read before it.
    pub fn dio_load<R: Read>(&mut self, r: &mut R) -> Result<()> {
        self.clear();
        let (count, prealloc) = read_count(r)?;
        let tree = self.tree_mut();
        tree.try_reserve(prealloc)?;
        for index in 0..count {
            let entry = <(K, V)>::decode(r)?;
            if tree.try_insert_unique(entry)?.1.is_some() {
                return Err(TrbError::DuplicateKey { index });
            }
        }
        loaded(count);
        Ok(())
    }
}

impl<K, V, C, A, M> TrbMultiMap<K, V, C, A, M>
where
    K: Codec,
    V: Codec,
    C: KeyCompare<K>,
    A: Aggregate<(K, V)>,
    M: MostPolicy,
{
    pub fn dio_save<W: Write>(&self, w: &mut W) -> Result<()> {
        write_all(w, self.len(), self.tree().iter())
    }

    pub fn dio_load<R: Read>(&mut self, r: &mut R) -> Result<()> {
        self.clear();
        let (count, prealloc) = read_count(r)?;
        let tree = self.tree_mut();
        tree.try_reserve(prealloc)?;
        for _ in 0..count {
            tree.try_insert_multi(<(K, V)>::decode(r)?)?;
        }
        loaded(count);
        Ok(())
    }
}

impl<T, C, A, M> TrbSet<T, C, A, M>
where
    T: Codec,
    C: KeyCompare<T>,
    A: Aggregate<T>,
    M: MostPolicy,
{
    pub fn dio_save<W: Write>(&self, w: &mut W) -> Result<()> {
        write_all(w, self.len(), self.tree().iter())
    }

    pub fn dio_load<R: Read>(&mut self, r: &mut R) -> Result<()> {
        self.clear();
        let (count, prealloc) = read_count(r)?;
        let tree = self.tree_mut();
        tree.try_reserve(prealloc)?;
        for index in 0..count {
            if tree.try_insert_unique(T::decode(r)?)?.1.is_some() {
                return Err(TrbError::DuplicateKey { index });
            }
        }
        loaded(count);
        Ok(())
    }
}

impl<T, C, A, M> TrbMultiSet<T, C, A, M>
where
    T: Codec,
    C: KeyCompare<T>,
    A: Aggregate<T>,
    M: MostPolicy,
{
    pub fn dio_save<W: Write>(&self, w: &mut W) -> Result<()> {
        write_all(w, self.len(), self.tree().iter())
    }

    pub fn dio_load<R: Read>(&mut self, r: &mut R) -> Result<()> {
        self.clear();
        let (count, prealloc) = read_count(r)?;
        let tree = self.tree_mut();
        tree.try_reserve(prealloc)?;
        for _ in 0..count {
            tree.try_insert_multi(T::decode(r)?)?;
        }
        loaded(count);
        Ok(())
    }
}

// =============================================================================
// Hash containers
// =============================================================================

impl<K, V, S, C> TrbHashMap<K, V, S, C>
where
    K: Codec + Hash,
    V: Codec,
    S: BuildHasher,
    C: KeyCompare<K>,
{
    pub fn dio_save<W: Write>(&self, w: &mut W) -> Result<()> {
        write_all(w, self.len(), self.entries())
    }

    pub fn dio_load<R: Read>(&mut self, r: &mut R) -> Result<()> {
        self.clear();
        let (count, prealloc) = read_count(r)?;
        self.try_reserve(prealloc)?;
        for index in 0..count {
            let (k, v) = <(K, V)>::decode(r)?;
            if self.contains_key(&k) {
                return Err(TrbError::DuplicateKey { index });
            }
            self.try_insert(k, v)?;
        }
        loaded(count);
        Ok(())
    }
}

impl<T, S, C> TrbHashSet<T, S, C>
where
    T: Codec + Hash,
    S: BuildHasher,
    C: KeyCompare<T>,
{
    pub fn dio_save<W: Write>(&self, w: &mut W) -> Result<()> {
        write_all(w, self.len(), self.iter())
    }

    pub fn dio_load<R: Read>(&mut self, r: &mut R) -> Result<()> {
        self.clear();
        let (count, prealloc) = read_count(r)?;
        self.try_reserve(prealloc)?;
        for index in 0..count {
            if !self.try_insert(T::decode(r)?)? {
                return Err(TrbError::DuplicateKey { index });
            }
        }
        loaded(count);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::SubtreeSize;
    use crate::compare::OrdCompare;
    use std::io::Cursor;

    #[test]
    fn test_map_save_is_sorted_and_loads_back() {
        let mut m = TrbMap::new();
        for (k, v) in [(3u32, "c"), (1, "a"), (2, "b")] {
            m.insert(k, v.to_string());
        }
        let mut buf = Vec::new();
        m.dio_save(&mut buf).unwrap();
        assert_eq!(&buf[..8], &3u64.to_le_bytes());
        assert_eq!(&buf[8..12], &1u32.to_le_bytes());

        let mut back = TrbMap::new();
        back.dio_load(&mut Cursor::new(&buf)).unwrap();
        assert_eq!(
            back.iter().collect::<Vec<_>>(),
            m.iter().collect::<Vec<_>>()
        );
        back.verify().unwrap();
    }

    #[test]
    fn test_duplicate_key_in_unique_load() {
        let mut buf = Vec::new();
        2u64.encode(&mut buf).unwrap();
        7i32.encode(&mut buf).unwrap();
        7i32.encode(&mut buf).unwrap();
        let mut set: TrbSet<i32> = TrbSet::new();
        let err = set.dio_load(&mut Cursor::new(&buf)).unwrap_err();
        assert!(matches!(err, TrbError::DuplicateKey { index: 1 }));

        let mut bag: TrbMultiSet<i32> = TrbMultiSet::new();
        bag.dio_load(&mut Cursor::new(&buf)).unwrap();
        assert_eq!(bag.count(&7), 2);
    }

    #[test]
    fn test_truncated_input_is_io_error() {
        let mut buf = Vec::new();
        5u64.encode(&mut buf).unwrap();
        1u16.encode(&mut buf).unwrap();
        let mut set: TrbSet<u16> = TrbSet::new();
        assert!(matches!(
            set.dio_load(&mut Cursor::new(&buf)),
            Err(TrbError::Io(_))
        ));
    }

    #[test]
    fn test_bad_utf8_is_corrupt() {
        let mut buf = Vec::new();
        1u64.encode(&mut buf).unwrap();
        vec![0xffu8, 0xfe].encode(&mut buf).unwrap();
        let mut set: TrbSet<String> = TrbSet::new();
        assert!(matches!(
            set.dio_load(&mut Cursor::new(&buf)),
            Err(TrbError::Corrupt(_))
        ));
    }

    #[test]
    fn test_multimap_and_hash_round_trip() {
        let mut mm: TrbMultiMap<String, bool, OrdCompare, SubtreeSize> = TrbMultiMap::default();
        mm.insert("a".into(), true);
        mm.insert("a".into(), false);
        mm.insert("b".into(), true);
        let mut buf = Vec::new();
        mm.dio_save(&mut buf).unwrap();
        let mut back: TrbMultiMap<String, bool, OrdCompare, SubtreeSize> = TrbMultiMap::default();
        back.dio_load(&mut Cursor::new(&buf)).unwrap();
        assert_eq!(back.get_all(&"a".to_string()).copied().collect::<Vec<_>>(), vec![true, false]);
        back.verify().unwrap();

        let mut h = TrbHashMap::new();
        for k in 0..100u64 {
            h.insert(k, k as i64 - 50);
        }
        let mut buf = Vec::new();
        h.dio_save(&mut buf).unwrap();
        let mut back: TrbHashMap<u64, i64> = TrbHashMap::new();
        back.dio_load(&mut Cursor::new(&buf)).unwrap();
        assert_eq!(back.len(), 100);
        assert_eq!(back.get(&7), Some(&-43));
        back.verify().unwrap();

        let hs: TrbHashSet<u8> = (0..=255).collect();
        let mut buf = Vec::new();
        hs.dio_save(&mut buf).unwrap();
        let mut back: TrbHashSet<u8> = TrbHashSet::new();
        back.dio_load(&mut Cursor::new(&buf)).unwrap();
        assert_eq!(back.len(), 256);
    }

    #[test]
    fn test_hash_map_layout_matches_ordered_map() {
        let mut hashed = TrbHashMap::new();
        let mut ordered = TrbMap::new();
        hashed.insert(9u16, String::from("nine"));
        ordered.insert(9u16, String::from("nine"));

        let (mut a, mut b) = (Vec::new(), Vec::new());
        hashed.dio_save(&mut a).unwrap();
        ordered.dio_save(&mut b).unwrap();
        assert_eq!(a, b);

        let mut back: TrbMap<u16, String> = TrbMap::new();
        back.dio_load(&mut Cursor::new(&a)).unwrap();
        assert_eq!(back.get(&9).map(String::as_str), Some("nine"));
    }
}
