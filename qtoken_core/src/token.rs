use rand_core::{CryptoRng, RngCore};

use crate::bits::{Basis, BasisString, Bit, BitString};
use crate::error::ProtocolError;
use crate::messages::TokenDescription;
use crate::quantum::QubitState;

/// Secret bit string plus the bases its states were prepared in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token {
    bits: BitString,
    bases: BasisString,
}

impl Token {
    pub fn new(bits: BitString, bases: BasisString) -> Result<Self, ProtocolError> {
        bases.expect_len("bases", bits.len())?;
        Ok(Self { bits, bases })
    }

    /// Draws `lambda` uniform bits, then `lambda` uniform bases.
    pub fn generate<R: RngCore + CryptoRng + ?Sized>(lambda: usize, rng: &mut R) -> Self {
        let bits: BitString = (0..lambda).map(|_| Bit::from(rng.next_u32() & 1 == 1)).collect();
        let bases: BasisString = (0..lambda)
            .map(|_| Basis::from(Bit::from(rng.next_u32() & 1 == 1)))
            .collect();
        Self { bits, bases }
    }

    pub fn bits(&self) -> &BitString {
        &self.bits
    }

    pub fn bases(&self) -> &BasisString {
        &self.bases
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// Wire copy handed to the holder; the issuer keeps the original.
    pub fn describe(&self) -> TokenDescription {
        TokenDescription::new(&self.bits, &self.bases)
    }

    pub fn ket_notation(&self) -> String {
        self.bits
            .iter()
            .zip(self.bases.iter())
            .map(|(bit, basis)| QubitState::prepare(bit, basis).ket())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::derive_role_rng;

    #[test]
    fn generation_is_reproducible_under_a_seed() {
        let a = Token::generate(32, &mut derive_role_rng(b"token", 0, b"issuer"));
        let b = Token::generate(32, &mut derive_role_rng(b"token", 0, b"issuer"));
        let c = Token::generate(32, &mut derive_role_rng(b"token", 1, b"issuer"));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 32);
        assert_eq!(a.bases().len(), 32);
    }

    #[test]
    fn generated_positions_use_both_symbols() {
        let token = Token::generate(256, &mut derive_role_rng(b"spread", 0, b"issuer"));
        let ones = token.bits().iter().filter(|b| *b == Bit::One).count();
        let hadamard = token
            .bases()
            .iter()
            .filter(|b| *b == Basis::Hadamard)
            .count();
        assert!((80..176).contains(&ones), "ones={ones}");
        assert!((80..176).contains(&hadamard), "hadamard={hadamard}");
    }

    #[test]
    fn mismatched_lengths_rejected() {
        let err = Token::new("101".parse().unwrap(), "10".parse().unwrap()).unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedMessage { .. }));
    }

    #[test]
    fn ket_notation_matches_reference_token() {
        let token = Token::new("10110010".parse().unwrap(), "01101100".parse().unwrap()).unwrap();
        assert_eq!(token.ket_notation(), "|1⟩ |+⟩ |-⟩ |1⟩ |+⟩ |+⟩ |1⟩ |0⟩");
    }
}
