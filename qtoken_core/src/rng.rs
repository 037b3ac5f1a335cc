//! RNG helpers separating seeded per-role streams from the OS entropy source.
//!
//! A protocol run is driven by one seed. Each role gets its own
//! `ChaCha20Rng`, keyed by BLAKE3 over the seed, the run index and a role
//! label, so a seed reproduces the whole run while the roles never share a
//! generator. Without a caller seed, the seed itself is drawn from `OsRng`.

use blake3::Hasher;
use rand::rngs::OsRng;
use rand_chacha::ChaCha20Rng;
use rand_core::{RngCore, SeedableRng};

pub const RUN_SEED_BYTES: usize = 32;

/// Convenience alias for the OS-backed RNG.
pub type SecureRng = OsRng;

/// Deterministic RNG derived from a run seed, run index, and role label.
pub fn derive_role_rng(seed: &[u8], run_index: u64, label: &[u8]) -> ChaCha20Rng {
    let mut hasher = Hasher::new();
    hasher.update(b"qtoken::role-rng");
    hasher.update(seed);
    hasher.update(&run_index.to_le_bytes());
    hasher.update(label);
    ChaCha20Rng::from_seed(*hasher.finalize().as_bytes())
}

/// Fresh run seed from the OS RNG.
pub fn fresh_seed() -> Vec<u8> {
    let mut seed = vec![0u8; RUN_SEED_BYTES];
    secure_rng().fill_bytes(&mut seed);
    seed
}

pub fn secure_rng() -> SecureRng {
    OsRng
}
