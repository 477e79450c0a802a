//! Content addresses for CBOR blocks.

use sha2::{Digest, Sha256};
use std::fmt;

use crate::error::{CodecError, CodecResult};

/// The SHA-256 address of a canonically-encoded block.
///
/// A `ContentHash` names a block by its bytes: two blocks with the same
/// canonical encoding have the same address. Frames declare the address
/// of every record they carry, and consumers recompute it before
/// trusting the payload.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    /// Number of bytes in a digest.
    pub const LEN: usize = 32;

    /// Computes the address of a byte block.
    pub fn of(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self(hasher.finalize().into())
    }

    /// Wraps an existing 32-byte digest.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Reads a digest from a byte slice, rejecting wrong lengths.
    pub fn from_slice(bytes: &[u8]) -> CodecResult<Self> {
        let digest: [u8; 32] = bytes.try_into().map_err(|_| CodecError::InvalidLink {
            message: format!("link digest must be {} bytes, got {}", Self::LEN, bytes.len()),
        })?;
        Ok(Self(digest))
    }

    /// Returns the raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Renders the digest as lowercase hex.
    pub fn to_hex(&self) -> String {
        let mut out = String::with_capacity(Self::LEN * 2);
        for byte in &self.0 {
            out.push_str(&format!("{byte:02x}"));
        }
        out
    }

    /// Parses a digest from lowercase or uppercase hex.
    pub fn from_hex(hex: &str) -> CodecResult<Self> {
        if hex.len() != Self::LEN * 2 {
            return Err(CodecError::InvalidLink {
                message: format!("hex digest must be {} chars, got {}", Self::LEN * 2, hex.len()),
            });
        }
        let mut digest = [0u8; 32];
        for (i, chunk) in hex.as_bytes().chunks(2).enumerate() {
            let pair = std::str::from_utf8(chunk).map_err(|_| CodecError::InvalidLink {
                message: "non-ascii hex digest".into(),
            })?;
            digest[i] = u8::from_str_radix(pair, 16).map_err(|_| CodecError::InvalidLink {
                message: format!("invalid hex byte {pair:?}"),
            })?;
        }
        Ok(Self(digest))
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", self.to_hex())
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_bytes_same_address() {
        assert_eq!(ContentHash::of(b"abc"), ContentHash::of(b"abc"));
        assert_ne!(ContentHash::of(b"abc"), ContentHash::of(b"abd"));
    }

    #[test]
    fn hex_roundtrip() {
        let hash = ContentHash::of(b"roundtrip");
        let hex = hash.to_hex();
        assert_eq!(hex.len(), 64);
        assert_eq!(ContentHash::from_hex(&hex).unwrap(), hash);
    }

    #[test]
    fn from_hex_rejects_bad_input() {
        assert!(ContentHash::from_hex("abc").is_err());
        assert!(ContentHash::from_hex(&"zz".repeat(32)).is_err());
    }

    #[test]
    fn from_slice_rejects_wrong_length() {
        assert!(ContentHash::from_slice(&[0u8; 31]).is_err());
        assert!(ContentHash::from_slice(&[0u8; 32]).is_ok());
    }

    #[test]
    fn known_digest() {
        // SHA-256 of the empty string.
        assert_eq!(
            ContentHash::of(b"").to_hex(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
