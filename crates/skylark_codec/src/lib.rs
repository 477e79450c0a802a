//! # Skylark Codec
//!
//! Canonical CBOR encoding/decoding and content addressing for skylark.
//!
//! Repository records travel the wire as content-addressed CBOR blocks:
//! a block's address is the SHA-256 digest of its canonical encoding, so
//! the encoding must be deterministic everywhere.
//!
//! ## Canonical CBOR Rules
//!
//! - Maps are sorted by key (length-first, then bytewise on the encoded key)
//! - Integers use shortest encoding
//! - No floats
//! - Strings must be UTF-8
//! - No indefinite-length items
//! - The only admitted tag is 42, carrying a 32-byte content-hash link
//!
//! ## Usage
//!
//! ```
//! use skylark_codec::{to_canonical_cbor, from_cbor, ContentHash, Value};
//!
//! let record = Value::map(vec![
//!     (Value::Text("text".into()), Value::Text("hello".into())),
//! ]);
//! let bytes = to_canonical_cbor(&record).unwrap();
//! let address = ContentHash::of(&bytes);
//!
//! let decoded: Value = from_cbor(&bytes).unwrap();
//! assert_eq!(record, decoded);
//! assert_eq!(address, ContentHash::of(&to_canonical_cbor(&decoded).unwrap()));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod decoder;
mod encoder;
mod error;
mod hash;
mod value;

pub use decoder::{from_cbor, CanonicalDecoder};
pub use encoder::{to_canonical_cbor, CanonicalEncoder};
pub use error::{CodecError, CodecResult};
pub use hash::ContentHash;
pub use value::Value;

/// Trait for types that can be encoded to canonical CBOR.
pub trait Encode {
    /// Encode this value to canonical CBOR bytes.
    fn encode(&self) -> CodecResult<Vec<u8>>;
}

/// Trait for types that can be decoded from CBOR.
pub trait Decode: Sized {
    /// Decode this value from CBOR bytes.
    fn decode(bytes: &[u8]) -> CodecResult<Self>;
}

impl Encode for Value {
    fn encode(&self) -> CodecResult<Vec<u8>> {
        to_canonical_cbor(self)
    }
}

impl Decode for Value {
    fn decode(bytes: &[u8]) -> CodecResult<Self> {
        from_cbor(bytes)
    }
}
