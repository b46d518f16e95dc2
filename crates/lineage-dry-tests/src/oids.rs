// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Deterministic oid generation for tests.

use lineage_core::{Oid, OID_LEN};

fn truncate(hash: blake3::Hash) -> Oid {
    let mut bytes = [0u8; OID_LEN];
    bytes.copy_from_slice(&hash.as_bytes()[..OID_LEN]);
    Oid(bytes)
}

/// Oid derived from a label: the first 20 bytes of `blake3("oid:" + label)`.
///
/// # Example
///
/// ```
/// use lineage_dry_tests::make_oid;
///
/// assert_eq!(make_oid("C1"), make_oid("C1"));
/// assert_ne!(make_oid("C1"), make_oid("C2"));
/// ```
pub fn make_oid(label: &str) -> Oid {
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"oid:");
    hasher.update(label.as_bytes());
    truncate(hasher.finalize())
}

/// Oid derived from a numeric seed (useful in loops and property tests).
pub fn make_oid_from_seed(seed: u64) -> Oid {
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"seed:");
    hasher.update(&seed.to_le_bytes());
    truncate(hasher.finalize())
}
