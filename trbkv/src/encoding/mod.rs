//! Byte encodings used by the key arena.
//!
//! - Variable-length integers (VarInt) for key lengths inside the arena
//! - Length-prefixed byte strings built on them
//! - Prefix successors for prefix scans

use smallvec::SmallVec;

/// Upper bound on an encoded `u64` varint.
pub const MAX_VARINT_LEN: usize = 10;

/// Scratch buffer for a prefix-scan end bound; short prefixes stay inline.
pub type KeyBuf = SmallVec<[u8; 32]>;

/// Encode a u64 as a variable-length integer.
///
/// Uses 1-10 bytes depending on the value:
/// - 0-127: 1 byte
/// - 128-16383: 2 bytes
/// - etc.
pub fn encode_varint(mut value: u64, buf: &mut [u8]) -> usize {
    let mut i = 0;
    while value >= 0x80 {
        buf[i] = (value as u8) | 0x80;
        value >>= 7;
        i += 1;
    }
    buf[i] = value as u8;
    i + 1
}

/// Decode a variable-length integer.
///
/// Returns `(value, bytes_consumed)`, or `None` if `buf` ends inside the
/// integer or it runs past ten bytes.
pub fn decode_varint(buf: &[u8]) -> Option<(u64, usize)> {
    let mut value = 0u64;
    for (i, &byte) in buf.iter().enumerate().take(MAX_VARINT_LEN) {
        value |= u64::from(byte & 0x7F) << (7 * i);
        if byte & 0x80 == 0 {
            return Some((value, i + 1));
        }
    }
    None
}

/// Number of bytes `encode_varint` writes for `value`.
pub fn varint_size(value: u64) -> usize {
    if value == 0 {
        return 1;
    }
    let bits = 64 - value.leading_zeros() as usize;
    (bits + 6) / 7
}

/// Append a varint-length-prefixed byte string.
pub fn encode_bytes(data: &[u8], buf: &mut Vec<u8>) {
    let mut len_buf = [0u8; MAX_VARINT_LEN];
    let len_size = encode_varint(data.len() as u64, &mut len_buf);
    buf.extend_from_slice(&len_buf[..len_size]);
    buf.extend_from_slice(data);
}

/// Decode a length-prefixed byte string.
///
/// Returns `(data, bytes_consumed)`.
pub fn decode_bytes(buf: &[u8]) -> Option<(&[u8], usize)> {
    let (len, len_size) = decode_varint(buf)?;
    let end = len_size.checked_add(usize::try_from(len).ok()?)?;
    Some((buf.get(len_size..end)?, end))
}

/// Size of `data` once length-prefixed.
pub fn encoded_len(data: &[u8]) -> usize {
    varint_size(data.len() as u64) + data.len()
}

/// Smallest key greater than every key starting with `prefix`, or `None`
/// when no such key exists (empty or all-`0xFF` prefix).
pub fn prefix_successor(prefix: &[u8]) -> Option<KeyBuf> {
    let mut end = KeyBuf::from_slice(prefix);
    while let Some(last) = end.pop() {
        if last < u8::MAX {
            end.push(last + 1);
            return Some(end);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_varint_roundtrip() {
        let test_values = [0, 1, 127, 128, 16383, 16384, u64::MAX];

        for &value in &test_values {
            let mut buf = [0u8; MAX_VARINT_LEN];
            let size = encode_varint(value, &mut buf);
            let (decoded, decoded_size) = decode_varint(&buf).unwrap();

            assert_eq!(decoded, value);
            assert_eq!(size, decoded_size);
            assert_eq!(size, varint_size(value));
        }
    }

    #[test]
    fn test_truncated_varint() {
        assert_eq!(decode_varint(&[]), None);
        assert_eq!(decode_varint(&[0x80, 0x80]), None);
        assert_eq!(decode_varint(&[0xFF; 11]), None);
    }

    #[test]
    fn test_bytes_roundtrip() {
        let data = b"hello world";
        let mut buf = Vec::new();
        encode_bytes(data, &mut buf);
        assert_eq!(buf.len(), encoded_len(data));

        let (decoded, size) = decode_bytes(&buf).unwrap();
        assert_eq!(decoded, data);
        assert_eq!(size, buf.len());

        assert_eq!(decode_bytes(&buf[..5]), None);
    }

    #[test]
    fn test_prefix_successor() {
        assert_eq!(prefix_successor(b"user:").as_deref(), Some(&b"user;"[..]));
        assert_eq!(prefix_successor(b"a\xff\xff").as_deref(), Some(&b"b"[..]));
        assert_eq!(prefix_successor(b"\xff"), None);
        assert_eq!(prefix_successor(b""), None);
    }
}
