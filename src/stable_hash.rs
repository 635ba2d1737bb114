//! Seed derivation and seed-controlled patient ordering.
//!
//! Not cryptographic. Every (patient, treatment) pair derives its generator seed from the
//! top-level seed and its own identity, never from scheduling order or thread count.

use crate::TreatmentId;

/// Stable 64-bit hash of `s` under `seed`: FNV-1a over the bytes, then a SplitMix64 finish.
///
/// Identical on every platform, so patient subsets and pair seeds are portable.
#[must_use]
pub fn stable_hash64(seed: u64, s: &str) -> u64 {
    let mut h: u64 = 14695981039346656037u64;
    for b in s.as_bytes() {
        h ^= *b as u64;
        h = h.wrapping_mul(1099511628211u64);
    }
    splitmix64(seed ^ h)
}

/// Stable hash of an integer key under a seed.
#[must_use]
pub fn stable_hash64_u64(seed: u64, x: u64) -> u64 {
    splitmix64(seed ^ splitmix64(x))
}

/// Generator seed for one (patient, treatment) pair.
///
/// Streams are fully independent per pair: the same patient under two treatments draws
/// from unrelated sequences, and adding patients never perturbs existing pairs.
#[must_use]
pub fn pair_seed(seed: u64, patient_id: &str, treatment: TreatmentId) -> u64 {
    let patient = stable_hash64(seed ^ 0x5041_5449, patient_id); // "PATI"
    stable_hash64_u64(patient, treatment.index() as u64)
}

#[inline]
fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
