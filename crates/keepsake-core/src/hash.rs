//! Content fingerprints
//!
//! SHA-256 over the exact bytes as fetched, hex-encoded in lowercase.
//! The same digest serves as the integrity checksum and the dedup key.

use sha2::{Digest, Sha256};

/// Length of a hex-encoded fingerprint
pub const CONTENT_HASH_LEN: usize = 64;

/// Compute the content fingerprint of `content`
pub fn content_hash(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}

/// Check that `value` looks like a fingerprint produced by [`content_hash`]
pub fn is_content_hash(value: &str) -> bool {
    value.len() == CONTENT_HASH_LEN
        && value
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}
