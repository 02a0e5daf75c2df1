//! # Digest Module
//!
//! Computes the compact content identifier for an image payload.
//!
//! The identifier is the first 64 bits of the payload's SHA-1, rendered as
//! 16 uppercase hex characters. When the archive already carries a
//! `sha1:` payload digest (base32, as written by WARC tools) that value is
//! trusted instead of rehashing the payload.
//!
//! Truncating to 64 bits makes collisions possible at very large scale.

use data_encoding::BASE32;
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

/// Prefix of a SHA-1 payload digest header value
const SHA1_PREFIX: &str = "sha1:";

/// Number of hash bytes kept in an identifier
const ID_BYTES: usize = 8;

/// A 16-character uppercase hex content identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentId(String);

impl ContentId {
    /// Derive the identifier for a payload.
    ///
    /// `payload_digest` is the raw `WARC-Payload-Digest` header value, if
    /// any. Headers that are not `sha1:` or fail to decode fall through to
    /// hashing `payload`.
    pub fn compute(payload: &[u8], payload_digest: Option<&str>) -> Self {
        if let Some(bytes) = payload_digest.and_then(decode_sha1_header) {
            return Self::from_hash_prefix(&bytes);
        }
        Self::from_hash_prefix(&Sha1::digest(payload))
    }

    /// Identifier of a payload with no archive-supplied digest
    pub fn of_bytes(payload: &[u8]) -> Self {
        Self::compute(payload, None)
    }

    fn from_hash_prefix(hash: &[u8]) -> Self {
        ContentId(hex::encode_upper(&hash[..ID_BYTES]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ContentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Decode a `sha1:<base32>` header, returning `None` if it is unusable
fn decode_sha1_header(header: &str) -> Option<Vec<u8>> {
    let encoded = header.strip_prefix(SHA1_PREFIX)?;
    let bytes = BASE32.decode(encoded.trim().as_bytes()).ok()?;
    (bytes.len() >= ID_BYTES).then_some(bytes)
}
