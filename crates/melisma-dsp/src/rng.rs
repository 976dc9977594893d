//! Deterministic RNG using PCG32 with BLAKE3 seed derivation.
//!
//! All randomness in the signal engine flows through this module so that
//! rendering is reproducible. Independent components (jitter, breath,
//! humanization) get independent streams by hashing a component key into
//! the base seed.

use rand::SeedableRng;
use rand_pcg::Pcg32;

/// Creates a PCG32 RNG from a 32-bit seed.
///
/// The 32-bit seed is expanded to 64 bits by duplicating the value in both
/// halves, as required by PCG32's state initialization.
pub fn create_rng(seed: u32) -> Pcg32 {
    let seed64 = (seed as u64) | ((seed as u64) << 32);
    Pcg32::seed_from_u64(seed64)
}

/// Derives an independent seed for a named component.
///
/// Hashes the base seed (little-endian) concatenated with the component key
/// and truncates the BLAKE3 digest to 32 bits.
pub fn derive_component_seed(base_seed: u32, key: &str) -> u32 {
    let mut input = Vec::with_capacity(4 + key.len());
    input.extend_from_slice(&base_seed.to_le_bytes());
    input.extend_from_slice(key.as_bytes());

    let hash = blake3::hash(&input);
    let bytes: [u8; 4] = hash.as_bytes()[0..4].try_into().unwrap();
    u32::from_le_bytes(bytes)
}

/// Creates an RNG for a named component of the render.
pub fn create_component_rng(base_seed: u32, key: &str) -> Pcg32 {
    create_rng(derive_component_seed(base_seed, key))
}

/// Derives the stable base seed for a voice from its identifier.
///
/// Every voice sings with its own quirks (jitter phase, breath placement)
/// that stay the same across renders.
pub fn voice_seed(voice_id: &str) -> u32 {
    let hash = blake3::hash(voice_id.as_bytes());
    let bytes: [u8; 4] = hash.as_bytes()[0..4].try_into().unwrap();
    u32::from_le_bytes(bytes)
}
