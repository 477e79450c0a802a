//! Dynamic CBOR value type.

use std::cmp::Ordering;

use crate::hash::ContentHash;

/// A dynamic CBOR value.
///
/// This type represents any value admitted by skylark's canonical CBOR
/// profile. Floats are intentionally unsupported, and the only tag the
/// profile admits is the content-hash link (tag 42), surfaced here as
/// its own variant so record decoding never has to re-interpret raw
/// tagged bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Null value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Signed integer (supports full i64 range).
    Integer(i64),
    /// Byte string.
    Bytes(Vec<u8>),
    /// Text string (UTF-8).
    Text(String),
    /// Array of values.
    Array(Vec<Value>),
    /// Map of key-value pairs (keys are sorted for canonical encoding).
    Map(Vec<(Value, Value)>),
    /// Content-hash link to another block (tag 42).
    Link(ContentHash),
}

impl Value {
    /// Create a map value with sorted keys.
    ///
    /// Keys are sorted by their canonical CBOR encoding (length-first,
    /// then bytewise), so building a map through this constructor always
    /// yields the canonical layout.
    pub fn map(mut pairs: Vec<(Value, Value)>) -> Self {
        pairs.sort_by(|a, b| a.0.cmp_canonical(&b.0));
        Value::Map(pairs)
    }

    /// Compare two values for canonical ordering.
    ///
    /// Implements the bytewise comparison of canonical CBOR encodings
    /// required for map key sorting.
    #[allow(clippy::match_same_arms)]
    pub fn cmp_canonical(&self, other: &Self) -> Ordering {
        let self_type = self.major_type();
        let other_type = other.major_type();

        if self_type != other_type {
            return self_type.cmp(&other_type);
        }

        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Integer(a), Value::Integer(b)) => {
                // Positive (major type 0) and negative (major type 1)
                // integers were already separated by the major-type
                // comparison above; within one sign, canonical order is
                // encoded-length-first, then numeric.
                #[allow(clippy::cast_sign_loss)]
                match (a.signum(), b.signum()) {
                    (s1, s2) if s1 >= 0 && s2 >= 0 => {
                        Self::cmp_unsigned_canonical(*a as u64, *b as u64)
                    }
                    (s1, s2) if s1 < 0 && s2 < 0 => {
                        // CBOR encodes a negative n with argument -1 - n.
                        let arg_a = (-1 - *a) as u64;
                        let arg_b = (-1 - *b) as u64;
                        Self::cmp_unsigned_canonical(arg_a, arg_b)
                    }
                    (s1, _) if s1 >= 0 => Ordering::Less,
                    _ => Ordering::Greater,
                }
            }
            (Value::Bytes(a), Value::Bytes(b)) => match a.len().cmp(&b.len()) {
                Ordering::Equal => a.cmp(b),
                ord => ord,
            },
            (Value::Text(a), Value::Text(b)) => match a.len().cmp(&b.len()) {
                Ordering::Equal => a.cmp(b),
                ord => ord,
            },
            (Value::Array(a), Value::Array(b)) => match a.len().cmp(&b.len()) {
                Ordering::Equal => {
                    for (av, bv) in a.iter().zip(b.iter()) {
                        let ord = av.cmp_canonical(bv);
                        if ord != Ordering::Equal {
                            return ord;
                        }
                    }
                    Ordering::Equal
                }
                ord => ord,
            },
            (Value::Map(a), Value::Map(b)) => match a.len().cmp(&b.len()) {
                Ordering::Equal => {
                    for ((ak, av), (bk, bv)) in a.iter().zip(b.iter()) {
                        let key_ord = ak.cmp_canonical(bk);
                        if key_ord != Ordering::Equal {
                            return key_ord;
                        }
                        let val_ord = av.cmp_canonical(bv);
                        if val_ord != Ordering::Equal {
                            return val_ord;
                        }
                    }
                    Ordering::Equal
                }
                ord => ord,
            },
            // Links all encode to the same length, so ordering reduces
            // to the digest bytes.
            (Value::Link(a), Value::Link(b)) => a.as_bytes().cmp(b.as_bytes()),
            _ => Ordering::Equal,
        }
    }

    /// Compare two unsigned integers by their canonical CBOR encoding.
    fn cmp_unsigned_canonical(a: u64, b: u64) -> Ordering {
        let len_a = Self::cbor_uint_encoded_len(a);
        let len_b = Self::cbor_uint_encoded_len(b);

        match len_a.cmp(&len_b) {
            Ordering::Equal => a.cmp(&b),
            ord => ord,
        }
    }

    /// Returns the encoded length (in bytes) of an unsigned integer in CBOR.
    fn cbor_uint_encoded_len(n: u64) -> usize {
        if n <= 23 {
            1
        } else if n <= 0xFF {
            2
        } else if n <= 0xFFFF {
            3
        } else if n <= 0xFFFF_FFFF {
            5
        } else {
            9
        }
    }

    /// Get the CBOR major type for this value.
    fn major_type(&self) -> u8 {
        match self {
            Value::Integer(n) if *n >= 0 => 0,
            Value::Integer(_) => 1,
            Value::Bytes(_) => 2,
            Value::Text(_) => 3,
            Value::Array(_) => 4,
            Value::Map(_) => 5,
            Value::Link(_) => 6,
            Value::Bool(_) | Value::Null => 7,
        }
    }

    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Get this value as a boolean, if it is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get this value as an integer, if it is one.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Get this value as bytes, if it is a byte string.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Get this value as a string, if it is a text string.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Get this value as an array, if it is one.
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Get this value as a map, if it is one.
    pub fn as_map(&self) -> Option<&[(Value, Value)]> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Get this value as a content-hash link, if it is one.
    pub fn as_link(&self) -> Option<ContentHash> {
        match self {
            Value::Link(hash) => Some(*hash),
            _ => None,
        }
    }

    /// Look up a text key in this map value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Map(pairs) => pairs
                .iter()
                .find(|(k, _)| k.as_text() == Some(key))
                .map(|(_, v)| v),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

impl From<ContentHash> for Value {
    fn from(hash: ContentHash) -> Self {
        Value::Link(hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_keys_are_sorted() {
        let map = Value::map(vec![
            (Value::Text("z".to_string()), Value::Integer(1)),
            (Value::Text("a".to_string()), Value::Integer(2)),
            (Value::Text("m".to_string()), Value::Integer(3)),
        ]);

        if let Value::Map(pairs) = map {
            assert_eq!(pairs[0].0, Value::Text("a".to_string()));
            assert_eq!(pairs[1].0, Value::Text("m".to_string()));
            assert_eq!(pairs[2].0, Value::Text("z".to_string()));
        } else {
            panic!("Expected Map");
        }
    }

    #[test]
    fn map_key_length_ordering() {
        // Shorter keys come first in canonical CBOR.
        let map = Value::map(vec![
            (Value::Text("abc".to_string()), Value::Integer(1)),
            (Value::Text("a".to_string()), Value::Integer(2)),
            (Value::Text("ab".to_string()), Value::Integer(3)),
        ]);

        if let Value::Map(pairs) = map {
            assert_eq!(pairs[0].0, Value::Text("a".to_string()));
            assert_eq!(pairs[1].0, Value::Text("ab".to_string()));
            assert_eq!(pairs[2].0, Value::Text("abc".to_string()));
        } else {
            panic!("Expected Map");
        }
    }

    #[test]
    fn integer_ordering() {
        let values = vec![
            Value::Integer(-1),
            Value::Integer(0),
            Value::Integer(1),
            Value::Integer(-2),
            Value::Integer(2),
        ];

        let mut sorted = values.clone();
        sorted.sort_by(Value::cmp_canonical);

        assert_eq!(sorted[0], Value::Integer(0));
        assert_eq!(sorted[1], Value::Integer(1));
        assert_eq!(sorted[2], Value::Integer(2));
        assert_eq!(sorted[3], Value::Integer(-1));
        assert_eq!(sorted[4], Value::Integer(-2));
    }

    #[test]
    fn link_ordering_by_digest() {
        let a = Value::Link(ContentHash::from_bytes([0u8; 32]));
        let b = Value::Link(ContentHash::from_bytes([1u8; 32]));
        assert_eq!(a.cmp_canonical(&b), Ordering::Less);
        assert_eq!(b.cmp_canonical(&a), Ordering::Greater);
        assert_eq!(a.cmp_canonical(&a.clone()), Ordering::Equal);
    }

    #[test]
    fn value_accessors() {
        assert!(Value::Null.is_null());
        assert_eq!(Value::Bool(true).as_bool(), Some(true));
        assert_eq!(Value::Integer(42).as_integer(), Some(42));
        assert_eq!(Value::Text("hi".to_string()).as_text(), Some("hi"));
        assert_eq!(Value::Bytes(vec![1, 2]).as_bytes(), Some(&[1, 2][..]));

        let hash = ContentHash::of(b"x");
        assert_eq!(Value::Link(hash).as_link(), Some(hash));
        assert_eq!(Value::Null.as_link(), None);
    }

    #[test]
    fn map_get() {
        let map = Value::map(vec![
            (Value::Text("text".to_string()), Value::Text("hello".to_string())),
            (Value::Text("langs".to_string()), Value::Array(vec![])),
        ]);

        assert_eq!(map.get("text"), Some(&Value::Text("hello".to_string())));
        assert_eq!(map.get("missing"), None);
        assert_eq!(Value::Null.get("text"), None);
    }
}
