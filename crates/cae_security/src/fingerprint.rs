//! SHA-256 fingerprinting shared by history dedupe and learning hints
//! (§3.1). Adapted from a blake3 `hash_parts`-style joiner to SHA-256,
//! since the spec mandates SHA-256 for every fingerprint in this
//! system, not just file hashes.

use sha2::{Digest, Sha256};

const SEPARATOR: u8 = 0x1f;

/// Hash a sequence of already-normalized parts, joined by a byte that
/// cannot appear in normalized text, so `["a", "bc"]` and `["ab", "c"]`
/// never collide.
pub fn hash_parts(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            hasher.update([SEPARATOR]);
        }
        hasher.update(part.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Fingerprint of a pending item's identifying fields, for history
/// dedupe (§3.1, property 4). Callers must pass already-normalized
/// strings (via [`crate::normalize`]).
pub fn pending_fingerprint(
    platform_key: &str,
    type_id: &str,
    company_key: Option<&str>,
    person_key: Option<&str>,
    period_key: Option<&str>,
) -> String {
    hash_parts(&[
        platform_key,
        type_id,
        company_key.unwrap_or(""),
        person_key.unwrap_or(""),
        period_key.unwrap_or(""),
    ])
}

/// Content hash of bytes (document uploads, PDF blobs).
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
