//! Deterministic payloads keyed by version.
//!
//! A writer publishes `payload_for(v, len)` with hash `v`. A reader that
//! accepts a copy with hash `v` checks it with [`verify_payload`]; any
//! byte from a different write makes the check fail.

use rand_chacha::rand_core::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Fill `out` with the payload for `version`.
pub fn fill_payload(version: i32, out: &mut [u8]) {
    let mut rng = ChaCha8Rng::seed_from_u64(version as u32 as u64);
    rng.fill_bytes(out);
}

/// The payload for `version`, `len` bytes long.
pub fn payload_for(version: i32, len: usize) -> Vec<u8> {
    let mut out = vec![0u8; len];
    fill_payload(version, &mut out);
    out
}

/// Whether `bytes` is exactly the payload for `version`.
pub fn verify_payload(version: i32, bytes: &[u8]) -> bool {
    bytes == payload_for(version, bytes.len()).as_slice()
}
