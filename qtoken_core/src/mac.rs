//! Keyed pseudorandom function used to derive measurement bases.
//!
//! `mac(secret, message, λ)` hashes `secret ‖ message` with SHA-256 and reads
//! the digest most-significant bit first. Outputs longer than one digest are
//! extended with counter blocks `SHA-256(secret ‖ message ‖ k)` where `k` is a
//! big-endian `u32` starting at 1.

use sha2::{Digest, Sha256};

use crate::bits::{BasisString, Bit, BitString};

const DIGEST_BITS: usize = 256;

pub fn mac(secret: &str, message: &str, lambda: usize) -> BitString {
    let mut bits = Vec::with_capacity(lambda);
    let mut counter = 0u32;
    while bits.len() < lambda {
        let block = digest_block(secret, message, counter);
        let take = (lambda - bits.len()).min(DIGEST_BITS);
        bits.extend(block_bits(&block).take(take));
        counter = counter.wrapping_add(1);
    }
    BitString::new(bits)
}

/// MAC output read as a basis string (bit 0 ↦ computational).
pub fn measurement_bases(secret: &str, verifier_id: &str, lambda: usize) -> BasisString {
    mac(secret, verifier_id, lambda).to_bases()
}

fn digest_block(secret: &str, message: &str, counter: u32) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.update(message.as_bytes());
    if counter > 0 {
        hasher.update(counter.to_be_bytes());
    }
    hasher.finalize().into()
}

fn block_bits(block: &[u8; 32]) -> impl Iterator<Item = Bit> + '_ {
    block
        .iter()
        .flat_map(|&byte| (0..8u8).rev().map(move |shift| Bit::from((byte >> shift) & 1 == 1)))
}
