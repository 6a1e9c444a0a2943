//! Canonical serialization for schedule fingerprints.
//!
//! ## Determinism Guarantees
//!
//! - Stable field order: struct fields serialize in declaration order
//! - Stable map order: hashed types use BTreeMap, never HashMap
//! - Circuit lists are sorted before hashing, so emission order does not matter

use serde::Serialize;
use xxhash_rust::xxh64::xxh64;

use crate::error::Result;
use crate::types::Circuit;

/// Canonical JSON bytes of `value`.
///
/// Fails for maps whose keys do not serialize as strings or integers.
pub fn to_canonical_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
}

/// xxh64 of the canonical bytes, seed 0.
pub fn canonical_hash<T: Serialize>(value: &T) -> Result<u64> {
    to_canonical_bytes(value).map(|bytes| xxh64(&bytes, 0))
}

/// [`canonical_hash`] as 16 lowercase hex digits.
pub fn canonical_hash_hex<T: Serialize>(value: &T) -> Result<String> {
    canonical_hash(value).map(|hash| format!("{:016x}", hash))
}

/// Order-independent fingerprint of a circuit list.
pub fn circuits_fingerprint(circuits: &[Circuit]) -> Result<String> {
    let mut sorted = circuits.to_vec();
    sorted.sort();
    canonical_hash_hex(&sorted)
}
