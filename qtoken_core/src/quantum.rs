//! Abstract two-level system: the four BB84-style states and their
//! measurement law.
//!
//! A state prepared as `(bit, basis)` measured in the same basis yields `bit`
//! with certainty. Measured in the other basis it yields a fresh uniform bit
//! drawn from the caller's RNG on every call; nothing about the mismatched
//! outcome is cached between positions.
//!
//! States are not `Clone`: measuring consumes the state.

use rand_core::RngCore;

use crate::bits::{Basis, BasisString, Bit, BitString};
use crate::error::ProtocolError;

#[derive(Debug, PartialEq, Eq)]
pub enum QubitState {
    /// `|0⟩`
    Zero,
    /// `|1⟩`
    One,
    /// `|+⟩`
    Plus,
    /// `|-⟩`
    Minus,
}

impl QubitState {
    pub fn prepare(bit: Bit, basis: Basis) -> Self {
        match (basis, bit) {
            (Basis::Computational, Bit::Zero) => QubitState::Zero,
            (Basis::Computational, Bit::One) => QubitState::One,
            (Basis::Hadamard, Bit::Zero) => QubitState::Plus,
            (Basis::Hadamard, Bit::One) => QubitState::Minus,
        }
    }

    pub fn basis(&self) -> Basis {
        match self {
            QubitState::Zero | QubitState::One => Basis::Computational,
            QubitState::Plus | QubitState::Minus => Basis::Hadamard,
        }
    }

    fn encoded_bit(&self) -> Bit {
        match self {
            QubitState::Zero | QubitState::Plus => Bit::Zero,
            QubitState::One | QubitState::Minus => Bit::One,
        }
    }

    pub fn measure<R: RngCore + ?Sized>(self, basis: Basis, rng: &mut R) -> Bit {
        if basis == self.basis() {
            self.encoded_bit()
        } else {
            Bit::from(rng.next_u32() & 1 == 1)
        }
    }

    pub fn ket(&self) -> &'static str {
        match self {
            QubitState::Zero => "|0⟩",
            QubitState::One => "|1⟩",
            QubitState::Plus => "|+⟩",
            QubitState::Minus => "|-⟩",
        }
    }
}

/// One prepared state per token position.
#[derive(Debug)]
pub struct QuantumRegister {
    states: Vec<QubitState>,
}

impl QuantumRegister {
    pub fn prepare(bits: &BitString, bases: &BasisString) -> Result<Self, ProtocolError> {
        bases.expect_len("bases", bits.len())?;
        let states = bits
            .iter()
            .zip(bases.iter())
            .map(|(bit, basis)| QubitState::prepare(bit, basis))
            .collect();
        Ok(Self { states })
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Space-separated ket notation, e.g. `|1⟩ |+⟩ |-⟩`.
    pub fn describe(&self) -> String {
        self.states
            .iter()
            .map(QubitState::ket)
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Measures position `j` in `bases[j]`, consuming the register.
    pub fn measure_all<R: RngCore + ?Sized>(
        self,
        bases: &BasisString,
        rng: &mut R,
    ) -> Result<BitString, ProtocolError> {
        bases.expect_len("measurement bases", self.states.len())?;
        Ok(self
            .states
            .into_iter()
            .zip(bases.iter())
            .map(|(state, basis)| state.measure(basis, &mut *rng))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::derive_role_rng;

    const BITS: [Bit; 2] = [Bit::Zero, Bit::One];
    const BASES: [Basis; 2] = [Basis::Computational, Basis::Hadamard];

    fn other(basis: Basis) -> Basis {
        match basis {
            Basis::Computational => Basis::Hadamard,
            Basis::Hadamard => Basis::Computational,
        }
    }

    #[test]
    fn matching_basis_is_deterministic() {
        let mut rng = derive_role_rng(b"matching-basis", 0, b"measure");
        for bit in BITS {
            for basis in BASES {
                for _ in 0..1000 {
                    let state = QubitState::prepare(bit, basis);
                    assert_eq!(state.measure(basis, &mut rng), bit);
                }
            }
        }
    }

    #[test]
    fn mismatched_basis_is_uniform() {
        // χ² with one degree of freedom; 15.0 sits beyond p = 0.0002.
        const TRIALS: usize = 10_000;
        let mut rng = derive_role_rng(b"mismatched-basis", 0, b"measure");
        for bit in BITS {
            for basis in BASES {
                let ones = (0..TRIALS)
                    .filter(|_| {
                        QubitState::prepare(bit, basis).measure(other(basis), &mut rng) == Bit::One
                    })
                    .count();
                let expected = TRIALS as f64 / 2.0;
                let zeros = (TRIALS - ones) as f64;
                let chi2 = (ones as f64 - expected).powi(2) / expected
                    + (zeros - expected).powi(2) / expected;
                assert!(chi2 < 15.0, "chi2={chi2} for {bit:?}/{basis:?}");
            }
        }
    }

    #[test]
    fn mismatched_positions_draw_independently() {
        let mut rng = derive_role_rng(b"register", 0, b"measure");
        let bits: BitString = std::iter::repeat(Bit::Zero).take(256).collect();
        let bases: BasisString = std::iter::repeat(Basis::Computational).take(256).collect();
        let measure_in: BasisString = std::iter::repeat(Basis::Hadamard).take(256).collect();
        let register = QuantumRegister::prepare(&bits, &bases).unwrap();
        let outcome = register.measure_all(&measure_in, &mut rng).unwrap();
        let ones = outcome.iter().filter(|b| *b == Bit::One).count();
        assert!(ones > 0 && ones < 256, "outcomes were constant: {outcome}");
    }

    #[test]
    fn kets_follow_preparation() {
        let bits: BitString = "1010".parse().unwrap();
        let bases: BasisString = "0011".parse().unwrap();
        let register = QuantumRegister::prepare(&bits, &bases).unwrap();
        assert_eq!(register.describe(), "|1⟩ |0⟩ |-⟩ |+⟩");
    }

    #[test]
    fn register_rejects_length_mismatch() {
        let bits: BitString = "101".parse().unwrap();
        let bases: BasisString = "01".parse().unwrap();
        let err = QuantumRegister::prepare(&bits, &bases).unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedMessage { .. }));

        let bases: BasisString = "011".parse().unwrap();
        let register = QuantumRegister::prepare(&bits, &bases).unwrap();
        let mut rng = derive_role_rng(b"short", 0, b"measure");
        let short: BasisString = "0".parse().unwrap();
        assert!(register.measure_all(&short, &mut rng).is_err());
    }
}
