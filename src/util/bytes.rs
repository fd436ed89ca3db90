//! Byte-string helpers for range bounds.

/// Smallest byte string greater than every string that starts with `prefix`.
///
/// Adds one to the last byte, carrying into earlier bytes when a byte wraps
/// from `0xFF` to `0x00`. Returns `None` when every byte wraps (including the
/// empty prefix), meaning the range is unbounded above.
pub fn increment_bytes(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut out = prefix.to_vec();
    for byte in out.iter_mut().rev() {
        let (next, overflowed) = byte.overflowing_add(1);
        *byte = next;
        if !overflowed {
            return Some(out);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_increment_simple() {
        assert_eq!(increment_bytes(b"cat"), Some(b"cau".to_vec()));
        assert_eq!(increment_bytes(&[0x00]), Some(vec![0x01]));
    }

    #[test]
    fn test_increment_carries() {
        assert_eq!(increment_bytes(&[0x61, 0xFF]), Some(vec![0x62, 0x00]));
        assert_eq!(
            increment_bytes(&[0x01, 0xFF, 0xFF]),
            Some(vec![0x02, 0x00, 0x00])
        );
    }

    #[test]
    fn test_increment_overflow_is_unbounded() {
        assert_eq!(increment_bytes(&[0xFF]), None);
        assert_eq!(increment_bytes(&[0xFF, 0xFF]), None);
        assert_eq!(increment_bytes(&[]), None);
    }
}
