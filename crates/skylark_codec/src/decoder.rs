//! Canonical CBOR decoder.

use crate::encoder::LINK_TAG;
use crate::error::{CodecError, CodecResult};
use crate::hash::ContentHash;
use crate::value::Value;

/// Decode a value from CBOR bytes.
///
/// # Errors
///
/// Returns an error if the bytes are not valid CBOR or contain
/// constructs outside the canonical profile (floats, indefinite-length
/// items, non-shortest integers, unsorted map keys, tags other than the
/// content-hash link).
pub fn from_cbor(bytes: &[u8]) -> CodecResult<Value> {
    let mut decoder = CanonicalDecoder::new(bytes);
    let value = decoder.decode()?;
    if !decoder.is_empty() {
        return Err(CodecError::invalid_structure("trailing bytes after value"));
    }
    Ok(value)
}

/// A canonical CBOR decoder.
///
/// Stream frames are untrusted input, so the decoder validates the
/// canonical profile strictly and bounds every allocation.
pub struct CanonicalDecoder<'a> {
    data: &'a [u8],
    pos: usize,
}

/// Maximum allowed element count for arrays and maps.
/// A single frame never carries more than a few thousand entries;
/// this bound only exists to stop allocation attacks.
const MAX_CONTAINER_ELEMENTS: u64 = 1024 * 1024;

/// Maximum allowed byte/string length. Frames are capped well below
/// this by the transport; the bound stops allocation attacks.
const MAX_BYTES_LENGTH: u64 = 64 * 1024 * 1024;

impl<'a> CanonicalDecoder<'a> {
    /// Create a new decoder for the given bytes.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Decode the next value.
    #[allow(clippy::cast_possible_wrap)]
    pub fn decode(&mut self) -> CodecResult<Value> {
        let initial_byte = self.read_byte()?;
        let major_type = initial_byte >> 5;
        let additional_info = initial_byte & 0x1f;

        match major_type {
            0 => self
                .decode_unsigned(additional_info)
                .map(|n| Value::Integer(i64::try_from(n).unwrap_or(i64::MAX))),
            1 => self.decode_unsigned(additional_info).map(|n| {
                // Negative integer: value is -(n+1); the range check
                // keeps the cast in bounds.
                if i64::try_from(n).is_ok() {
                    Value::Integer(-(n as i64) - 1)
                } else {
                    Value::Integer(i64::MIN)
                }
            }),
            2 => self.decode_bytes(additional_info),
            3 => self.decode_text(additional_info),
            4 => self.decode_array(additional_info),
            5 => self.decode_map(additional_info),
            6 => self.decode_tag(additional_info),
            7 => self.decode_simple(additional_info),
            _ => Err(CodecError::invalid_structure("invalid major type")),
        }
    }

    /// Check if all bytes have been consumed.
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Get remaining bytes.
    pub fn remaining(&self) -> &[u8] {
        &self.data[self.pos..]
    }

    #[inline]
    fn read_byte(&mut self) -> CodecResult<u8> {
        if self.pos >= self.data.len() {
            return Err(CodecError::UnexpectedEof);
        }
        let byte = self.data[self.pos];
        self.pos += 1;
        Ok(byte)
    }

    #[inline]
    fn read_bytes(&mut self, len: usize) -> CodecResult<&'a [u8]> {
        if self.pos + len > self.data.len() {
            return Err(CodecError::UnexpectedEof);
        }
        let bytes = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    #[inline]
    fn decode_unsigned(&mut self, additional_info: u8) -> CodecResult<u64> {
        match additional_info {
            0..=23 => Ok(u64::from(additional_info)),
            24 => {
                let byte = self.read_byte()?;
                if byte < 24 {
                    return Err(CodecError::invalid_structure(
                        "non-canonical: value could be encoded in fewer bytes",
                    ));
                }
                Ok(u64::from(byte))
            }
            25 => {
                let bytes = self.read_bytes(2)?;
                let value = u16::from_be_bytes([bytes[0], bytes[1]]);
                if u8::try_from(value).is_ok() {
                    return Err(CodecError::invalid_structure(
                        "non-canonical: value could be encoded in fewer bytes",
                    ));
                }
                Ok(u64::from(value))
            }
            26 => {
                let bytes = self.read_bytes(4)?;
                let value = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
                if u16::try_from(value).is_ok() {
                    return Err(CodecError::invalid_structure(
                        "non-canonical: value could be encoded in fewer bytes",
                    ));
                }
                Ok(u64::from(value))
            }
            27 => {
                let bytes = self.read_bytes(8)?;
                let value = u64::from_be_bytes([
                    bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
                ]);
                if u32::try_from(value).is_ok() {
                    return Err(CodecError::invalid_structure(
                        "non-canonical: value could be encoded in fewer bytes",
                    ));
                }
                Ok(value)
            }
            28..=30 => Err(CodecError::invalid_structure("reserved additional info")),
            31 => Err(CodecError::IndefiniteLengthForbidden),
            _ => unreachable!(),
        }
    }

    fn decode_bytes(&mut self, additional_info: u8) -> CodecResult<Value> {
        if additional_info == 31 {
            return Err(CodecError::IndefiniteLengthForbidden);
        }
        let len_u64 = self.decode_unsigned(additional_info)?;
        if len_u64 > MAX_BYTES_LENGTH {
            return Err(CodecError::SizeLimitExceeded {
                claimed: len_u64,
                max_allowed: MAX_BYTES_LENGTH,
            });
        }
        let bytes = self.read_bytes(len_u64 as usize)?;
        Ok(Value::Bytes(bytes.to_vec()))
    }

    fn decode_text(&mut self, additional_info: u8) -> CodecResult<Value> {
        if additional_info == 31 {
            return Err(CodecError::IndefiniteLengthForbidden);
        }
        let len_u64 = self.decode_unsigned(additional_info)?;
        if len_u64 > MAX_BYTES_LENGTH {
            return Err(CodecError::SizeLimitExceeded {
                claimed: len_u64,
                max_allowed: MAX_BYTES_LENGTH,
            });
        }
        let bytes = self.read_bytes(len_u64 as usize)?;
        let text = std::str::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8)?;
        Ok(Value::Text(text.to_string()))
    }

    fn decode_array(&mut self, additional_info: u8) -> CodecResult<Value> {
        if additional_info == 31 {
            return Err(CodecError::IndefiniteLengthForbidden);
        }
        let len_u64 = self.decode_unsigned(additional_info)?;
        if len_u64 > MAX_CONTAINER_ELEMENTS {
            return Err(CodecError::SizeLimitExceeded {
                claimed: len_u64,
                max_allowed: MAX_CONTAINER_ELEMENTS,
            });
        }
        let len = len_u64 as usize;
        let mut items = Vec::with_capacity(len);
        for _ in 0..len {
            items.push(self.decode()?);
        }
        Ok(Value::Array(items))
    }

    fn decode_map(&mut self, additional_info: u8) -> CodecResult<Value> {
        if additional_info == 31 {
            return Err(CodecError::IndefiniteLengthForbidden);
        }
        let len_u64 = self.decode_unsigned(additional_info)?;
        if len_u64 > MAX_CONTAINER_ELEMENTS {
            return Err(CodecError::SizeLimitExceeded {
                claimed: len_u64,
                max_allowed: MAX_CONTAINER_ELEMENTS,
            });
        }
        let len = len_u64 as usize;
        let mut pairs = Vec::with_capacity(len);

        let mut prev_key_bytes: Option<Vec<u8>> = None;

        for _ in 0..len {
            let key_start = self.pos;
            let key = self.decode()?;
            let key_end = self.pos;
            let key_bytes = self.data[key_start..key_end].to_vec();

            // Keys must be strictly increasing in canonical order.
            if let Some(ref prev) = prev_key_bytes {
                let ordering = compare_cbor_bytes(prev, &key_bytes);
                if ordering != std::cmp::Ordering::Less {
                    return Err(CodecError::invalid_structure(
                        "non-canonical: map keys not in sorted order",
                    ));
                }
            }
            prev_key_bytes = Some(key_bytes);

            let value = self.decode()?;
            pairs.push((key, value));
        }

        Ok(Value::Map(pairs))
    }

    fn decode_tag(&mut self, additional_info: u8) -> CodecResult<Value> {
        let tag = self.decode_unsigned(additional_info)?;
        if tag != LINK_TAG {
            return Err(CodecError::unsupported_type(format!("tag {tag}")));
        }

        // A link is tag 42 over a 32-byte digest string.
        let inner = self.decode()?;
        let digest = inner.as_bytes().ok_or_else(|| CodecError::InvalidLink {
            message: "link payload must be a byte string".into(),
        })?;
        Ok(Value::Link(ContentHash::from_slice(digest)?))
    }

    fn decode_simple(&mut self, additional_info: u8) -> CodecResult<Value> {
        match additional_info {
            20 => Ok(Value::Bool(false)),
            21 => Ok(Value::Bool(true)),
            22 => Ok(Value::Null),
            23 => Ok(Value::Null), // undefined, treated as null
            24 => {
                let simple = self.read_byte()?;
                match simple {
                    0..=31 => Err(CodecError::invalid_structure(
                        "non-canonical: simple value should use direct encoding",
                    )),
                    _ => Err(CodecError::unsupported_type(format!(
                        "simple value {simple}"
                    ))),
                }
            }
            25..=27 => Err(CodecError::FloatForbidden),
            28..=30 => Err(CodecError::invalid_structure("reserved additional info")),
            31 => Err(CodecError::invalid_structure("break without indefinite")),
            _ => Err(CodecError::unsupported_type(format!(
                "simple value {additional_info}"
            ))),
        }
    }
}

/// Compare two CBOR byte sequences for canonical ordering
/// (length-first, then bytewise).
fn compare_cbor_bytes(a: &[u8], b: &[u8]) -> std::cmp::Ordering {
    match a.len().cmp(&b.len()) {
        std::cmp::Ordering::Equal => a.cmp(b),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::to_canonical_cbor;

    #[test]
    fn decode_simple_values() {
        assert_eq!(from_cbor(&[0xf6]).unwrap(), Value::Null);
        assert_eq!(from_cbor(&[0xf4]).unwrap(), Value::Bool(false));
        assert_eq!(from_cbor(&[0xf5]).unwrap(), Value::Bool(true));
    }

    #[test]
    fn decode_integers() {
        assert_eq!(from_cbor(&[0x00]).unwrap(), Value::Integer(0));
        assert_eq!(from_cbor(&[0x18, 24]).unwrap(), Value::Integer(24));
        assert_eq!(from_cbor(&[0x19, 0x01, 0x00]).unwrap(), Value::Integer(256));
        assert_eq!(from_cbor(&[0x20]).unwrap(), Value::Integer(-1));
        assert_eq!(from_cbor(&[0x38, 99]).unwrap(), Value::Integer(-100));
    }

    #[test]
    fn decode_containers() {
        assert_eq!(
            from_cbor(&[0x82, 0x01, 0x02]).unwrap(),
            Value::Array(vec![Value::Integer(1), Value::Integer(2)])
        );
        assert_eq!(
            from_cbor(&[0xa1, 0x61, b'a', 0x01]).unwrap(),
            Value::Map(vec![(Value::Text("a".to_string()), Value::Integer(1))])
        );
    }

    #[test]
    fn decode_link() {
        let hash = ContentHash::of(b"linked block");
        let encoded = to_canonical_cbor(&Value::Link(hash)).unwrap();
        assert_eq!(from_cbor(&encoded).unwrap(), Value::Link(hash));
    }

    #[test]
    fn reject_unknown_tags() {
        // Tag 0 (standard date-time) is outside the profile.
        let input = [0xc0, 0x61, b'x'];
        assert!(matches!(
            from_cbor(&input),
            Err(CodecError::UnsupportedType { .. })
        ));
    }

    #[test]
    fn reject_link_with_wrong_digest_length() {
        // Tag 42 over a 3-byte string.
        let input = [0xd8, 0x2a, 0x43, 1, 2, 3];
        assert!(matches!(
            from_cbor(&input),
            Err(CodecError::InvalidLink { .. })
        ));
    }

    #[test]
    fn reject_link_over_non_bytes() {
        // Tag 42 over an integer.
        let input = [0xd8, 0x2a, 0x01];
        assert!(matches!(
            from_cbor(&input),
            Err(CodecError::InvalidLink { .. })
        ));
    }

    #[test]
    fn reject_float() {
        assert!(matches!(
            from_cbor(&[0xf9, 0x00, 0x00]),
            Err(CodecError::FloatForbidden)
        ));
        assert!(matches!(
            from_cbor(&[0xfb, 0, 0, 0, 0, 0, 0, 0, 0]),
            Err(CodecError::FloatForbidden)
        ));
    }

    #[test]
    fn reject_indefinite_length() {
        assert!(matches!(
            from_cbor(&[0x5f, 0x41, b'a', 0xff]),
            Err(CodecError::IndefiniteLengthForbidden)
        ));
        assert!(matches!(
            from_cbor(&[0x9f, 0x01, 0xff]),
            Err(CodecError::IndefiniteLengthForbidden)
        ));
    }

    #[test]
    fn reject_non_shortest_encoding() {
        assert!(matches!(
            from_cbor(&[0x18, 23]),
            Err(CodecError::InvalidStructure { .. })
        ));
        assert!(matches!(
            from_cbor(&[0x19, 0x00, 0xff]),
            Err(CodecError::InvalidStructure { .. })
        ));
    }

    #[test]
    fn reject_unsorted_map_keys() {
        assert!(matches!(
            from_cbor(&[0xa2, 0x61, b'b', 0x01, 0x61, b'a', 0x02]),
            Err(CodecError::InvalidStructure { .. })
        ));
    }

    #[test]
    fn reject_trailing_bytes() {
        assert!(matches!(
            from_cbor(&[0x01, 0x02]),
            Err(CodecError::InvalidStructure { .. })
        ));
    }

    #[test]
    fn unexpected_eof() {
        assert!(matches!(from_cbor(&[]), Err(CodecError::UnexpectedEof)));
        assert!(matches!(
            from_cbor(&[0x19, 0x01]),
            Err(CodecError::UnexpectedEof)
        ));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn arb_value() -> impl Strategy<Value = Value> {
            let leaf = prop_oneof![
                Just(Value::Null),
                any::<bool>().prop_map(Value::Bool),
                any::<i64>().prop_map(Value::Integer),
                proptest::collection::vec(any::<u8>(), 0..24).prop_map(Value::Bytes),
                "[a-z]{0,12}".prop_map(Value::Text),
                any::<[u8; 32]>()
                    .prop_map(|d| Value::Link(ContentHash::from_bytes(d))),
            ];
            leaf.prop_recursive(3, 24, 4, |inner| {
                prop_oneof![
                    proptest::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                    proptest::collection::vec(("[a-z]{1,6}", inner), 0..4).prop_map(|pairs| {
                        let mut seen = std::collections::HashSet::new();
                        Value::map(
                            pairs
                                .into_iter()
                                .filter(|(k, _)| seen.insert(k.clone()))
                                .map(|(k, v)| (Value::Text(k), v))
                                .collect(),
                        )
                    }),
                ]
            })
        }

        proptest! {
            // Decoding what we encode must reproduce the value, and
            // re-encoding must reproduce the bytes: that is what makes
            // the content address of a record well defined.
            #[test]
            fn canonical_fixed_point(value in arb_value()) {
                let bytes = to_canonical_cbor(&value).unwrap();
                let decoded = from_cbor(&bytes).unwrap();
                let reencoded = to_canonical_cbor(&decoded).unwrap();
                prop_assert_eq!(decoded, value);
                prop_assert_eq!(reencoded, bytes);
            }
        }
    }
}
