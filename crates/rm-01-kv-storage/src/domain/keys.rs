//! # Indexed Key Codec
//!
//! Builds canonical byte keys for primary documents and secondary indices.
//!
//! ```text
//! document:     <entity> 0x01 <id>
//! index:        <entity> 0x02 <index name> 0x03 <index value> <id>
//! ```
//!
//! Entity names, index names and values must not contain the delimiter bytes
//! unless escaped by the caller. This is not checked here.
//!
//! Numeric index values should be encoded with [`encode_u64`] so byte order
//! matches numeric order.

/// Separates an entity name from a document id.
pub const DOCUMENT_DELIMITER: u8 = 0x01;

/// Separates an entity name from an index name.
pub const INDEX_KEY_DELIMITER: u8 = 0x02;

/// Separates an index name from the indexed value.
pub const INDEX_VALUE_DELIMITER: u8 = 0x03;

/// Primary key for `(entity, id)`.
pub fn document_key(entity: &str, id: &[u8]) -> Vec<u8> {
    let mut key = document_group_prefix(entity);
    key.extend_from_slice(id);
    key
}

/// Prefix shared by every document of `entity`.
pub fn document_group_prefix(entity: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(entity.len() + 1);
    key.extend_from_slice(entity.as_bytes());
    key.push(DOCUMENT_DELIMITER);
    key
}

/// Prefix shared by every entry of one secondary index.
pub fn index_group_prefix(entity: &str, index_name: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(entity.len() + index_name.len() + 2);
    key.extend_from_slice(entity.as_bytes());
    key.push(INDEX_KEY_DELIMITER);
    key.extend_from_slice(index_name.as_bytes());
    key.push(INDEX_VALUE_DELIMITER);
    key
}

/// Prefix shared by every entry of one secondary index with one value.
///
/// Stripping this prefix from an index key yields the document id.
pub fn index_value_prefix(entity: &str, index_name: &str, index_value: &[u8]) -> Vec<u8> {
    let mut key = index_group_prefix(entity, index_name);
    key.extend_from_slice(index_value);
    key
}

/// Secondary-index key for `(entity, index_name, index_value, id)`.
pub fn index_key(entity: &str, index_name: &str, index_value: &[u8], id: &[u8]) -> Vec<u8> {
    let mut key = index_value_prefix(entity, index_name, index_value);
    key.extend_from_slice(id);
    key
}

/// The smallest key greater than every key starting with `prefix`.
///
/// Used as the exclusive upper bound of a prefix range, which is how reverse
/// scans are seeded. Trailing `0xFF` bytes carry into the previous byte.
/// Returns `None` when no such key exists (empty or all-`0xFF` prefix).
pub fn reverse_seek_key(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut end = prefix.to_vec();
    while let Some(last) = end.pop() {
        if last < u8::MAX {
            end.push(last + 1);
            return Some(end);
        }
    }
    None
}

/// Order-preserving encoding for numeric ids and index values.
pub fn encode_u64(value: u64) -> [u8; 8] {
    value.to_be_bytes()
}

/// Inverse of [`encode_u64`]. `None` unless `bytes` is exactly 8 long.
pub fn decode_u64(bytes: &[u8]) -> Option<u64> {
    let array: [u8; 8] = bytes.try_into().ok()?;
    Some(u64::from_be_bytes(array))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_document_key_layout() {
        assert_eq!(document_key("tx", b"ab"), b"tx\x01ab".to_vec());
    }

    #[test]
    fn test_index_key_layout() {
        let key = index_key("tx", "height", &encode_u64(7), b"id");
        let mut expected = b"tx\x02height\x03".to_vec();
        expected.extend_from_slice(&[0, 0, 0, 0, 0, 0, 0, 7]);
        expected.extend_from_slice(b"id");
        assert_eq!(key, expected);
    }

    #[test]
    fn test_index_key_stripped_by_value_prefix() {
        let prefix = index_value_prefix("tx", "height", &encode_u64(3));
        let key = index_key("tx", "height", &encode_u64(3), b"doc-1");
        assert_eq!(&key[prefix.len()..], b"doc-1");
    }

    #[test]
    fn test_reverse_seek_key_increments_last_byte() {
        assert_eq!(reverse_seek_key(b"ab"), Some(b"ac".to_vec()));
    }

    #[test]
    fn test_reverse_seek_key_carries() {
        assert_eq!(reverse_seek_key(&[0x01, 0xFF, 0xFF]), Some(vec![0x02]));
        assert_eq!(reverse_seek_key(&[0xFF, 0xFF]), None);
        assert_eq!(reverse_seek_key(&[]), None);
    }

    #[test]
    fn test_decode_u64_rejects_wrong_length() {
        assert_eq!(decode_u64(&[1, 2, 3]), None);
        assert_eq!(decode_u64(&encode_u64(42)), Some(42));
    }

    proptest! {
        #[test]
        fn prop_index_keys_sort_by_value(a in any::<u64>(), b in any::<u64>()) {
            let ka = index_key("tx", "height", &encode_u64(a), b"id");
            let kb = index_key("tx", "height", &encode_u64(b), b"id");
            prop_assert_eq!(a.cmp(&b), ka.cmp(&kb));
        }

        #[test]
        fn prop_seek_key_bounds_prefix(
            prefix in proptest::collection::vec(any::<u8>(), 1..8),
            suffix in proptest::collection::vec(any::<u8>(), 0..8),
        ) {
            let mut key = prefix.clone();
            key.extend_from_slice(&suffix);
            if let Some(end) = reverse_seek_key(&prefix) {
                prop_assert!(key < end);
                prop_assert!(prefix < end);
            } else {
                prop_assert!(prefix.iter().all(|b| *b == u8::MAX));
            }
        }
    }
}
