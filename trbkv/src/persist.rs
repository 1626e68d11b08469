//! Flat-file persistence for [`KeyedMap`].
//!
//! Layout, all integers little-endian `u32`:
//!
//! ```text
//! [count] { [klen][key bytes][vlen][value bytes] } * count
//! ```
//!
//! Records are written in key order. Loading accepts any order but rejects
//! a repeated key.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::keyed::KeyedMap;
use crate::{KvError, Result};

/// Preallocation cap while loading; a corrupt length cannot force a huge
/// allocation before the bytes are actually read.
const PREALLOC_LIMIT: usize = 1 << 20;

fn put_len<W: Write>(w: &mut W, len: usize) -> Result<()> {
    let len = u32::try_from(len).map_err(|_| KvError::RecordTooLarge { len })?;
    w.write_all(&len.to_le_bytes())?;
    Ok(())
}

fn get_len<R: Read>(r: &mut R) -> Result<usize> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf) as usize)
}

fn get_bytes<R: Read>(r: &mut R) -> Result<Vec<u8>> {
    let len = get_len(r)?;
    let mut buf = Vec::with_capacity(len.min(PREALLOC_LIMIT));
    r.take(len as u64).read_to_end(&mut buf)?;
    if buf.len() != len {
        return Err(KvError::Corrupt(format!(
            "record truncated: {} of {len} bytes",
            buf.len()
        )));
    }
    Ok(buf)
}

/// Write every entry of `map`.
pub fn save<V: AsRef<[u8]>, W: Write>(map: &KeyedMap<V>, w: &mut W) -> Result<()> {
    put_len(w, map.len())?;
    for (key, value) in map {
        let value = value.as_ref();
        put_len(w, key.len())?;
        w.write_all(key)?;
        put_len(w, value.len())?;
        w.write_all(value)?;
    }
    w.flush()?;
    tracing::debug!(records = map.len(), "keyed map saved");
    Ok(())
}

/// Read a map written by [`save`].
pub fn load<V: From<Vec<u8>>, R: Read>(r: &mut R) -> Result<KeyedMap<V>> {
    let count = get_len(r)?;
    let mut map = KeyedMap::with_capacity(count.min(PREALLOC_LIMIT));
    for index in 0..count {
        let key = get_bytes(r)?;
        let value = V::from(get_bytes(r)?);
        if map.contains(&key) {
            return Err(KvError::DuplicateKey { index });
        }
        map.try_insert(&key, value)?;
    }
    tracing::debug!(records = count, "keyed map loaded");
    Ok(map)
}

/// [`save`] into a new file at `path`, replacing any existing one.
pub fn save_to_path<V: AsRef<[u8]>>(map: &KeyedMap<V>, path: impl AsRef<Path>) -> Result<()> {
    let mut w = BufWriter::new(File::create(path)?);
    save(map, &mut w)
}

/// [`load`] from the file at `path`.
pub fn load_from_path<V: From<Vec<u8>>>(path: impl AsRef<Path>) -> Result<KeyedMap<V>> {
    let mut r = BufReader::new(File::open(path)?);
    load(&mut r)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample() -> KeyedMap<Vec<u8>> {
        let mut m = KeyedMap::new();
        m.insert(b"user:2", b"bob".to_vec());
        m.insert(b"user:1", b"alice".to_vec());
        m.insert(b"", Vec::new());
        m
    }

    #[test]
    fn test_layout_is_sorted_length_prefixed() {
        let mut buf = Vec::new();
        save(&sample(), &mut buf).unwrap();

        assert_eq!(&buf[0..4], &3u32.to_le_bytes());
        // Empty key with an empty value comes first.
        assert_eq!(&buf[4..8], &0u32.to_le_bytes());
        assert_eq!(&buf[8..12], &0u32.to_le_bytes());
        assert_eq!(&buf[12..16], &6u32.to_le_bytes());
        assert_eq!(&buf[16..22], b"user:1");
        assert_eq!(&buf[22..26], &5u32.to_le_bytes());
        assert_eq!(&buf[26..31], b"alice");
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.trbkv");
        let original = sample();
        save_to_path(&original, &path).unwrap();

        let loaded: KeyedMap<Vec<u8>> = load_from_path(&path).unwrap();
        loaded.verify().unwrap();
        assert_eq!(loaded.len(), 3);
        assert!(loaded.iter().eq(original.iter()));
    }

    #[test]
    fn test_duplicate_and_truncated_input() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&2u32.to_le_bytes());
        for _ in 0..2 {
            bytes.extend_from_slice(&1u32.to_le_bytes());
            bytes.push(b'k');
            bytes.extend_from_slice(&1u32.to_le_bytes());
            bytes.push(b'v');
        }
        let err = load::<Vec<u8>, _>(&mut Cursor::new(&bytes)).unwrap_err();
        assert!(matches!(err, KvError::DuplicateKey { index: 1 }));

        bytes.truncate(bytes.len() - 3);
        let err = load::<Vec<u8>, _>(&mut Cursor::new(&bytes)).unwrap_err();
        assert!(matches!(err, KvError::Io(_)));
    }
}
