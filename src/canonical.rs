//! Canonical serialization for deterministic hashing.
//!
//! Configurations and finished schedules are hashed over their canonical JSON
//! bytes with xxh64. Two runs over the same network with the same parameters
//! must produce the same fingerprint, so everything hashed here is built from
//! `Vec`s and declaration-ordered structs only.

use serde::Serialize;
use xxhash_rust::xxh64::xxh64;

/// Serialize a value to canonical JSON bytes for hashing.
///
/// Returns an empty buffer for values that cannot be represented as JSON
/// (maps with non-string keys); every type hashed by this crate serializes.
pub fn to_canonical_bytes<T: Serialize>(value: &T) -> Vec<u8> {
    serde_json::to_vec(value).unwrap_or_default()
}

/// Compute canonical hash of a serializable value.
pub fn canonical_hash<T: Serialize>(value: &T) -> u64 {
    xxh64(&to_canonical_bytes(value), 0)
}

/// Compute canonical hash and return as hex string.
pub fn canonical_hash_hex<T: Serialize>(value: &T) -> String {
    format!("{:016x}", canonical_hash(value))
}

/// The parts of a finished run that identify it.
#[derive(Serialize)]
struct ScheduleDigest<'a> {
    levels: &'a [u32],
    po_levels: &'a [u32],
    depth: u32,
    total_relays: u64,
}

/// Fingerprint of a level assignment together with its relay total.
pub fn schedule_fingerprint(levels: &[u32], po_levels: &[u32], depth: u32, total_relays: u64) -> String {
    canonical_hash_hex(&ScheduleDigest {
        levels,
        po_levels,
        depth,
        total_relays,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_determinism() {
        let h1 = schedule_fingerprint(&[0, 1, 2], &[3], 2, 0);
        let h2 = schedule_fingerprint(&[0, 1, 2], &[3], 2, 0);
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 16);
    }

    #[test]
    fn test_fingerprint_sensitivity() {
        let base = schedule_fingerprint(&[0, 1, 2], &[3], 2, 0);
        assert_ne!(base, schedule_fingerprint(&[0, 1, 3], &[3], 2, 0));
        assert_ne!(base, schedule_fingerprint(&[0, 1, 2], &[4], 2, 0));
        assert_ne!(base, schedule_fingerprint(&[0, 1, 2], &[3], 2, 1));
    }
}
