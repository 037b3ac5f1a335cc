//! Bit and basis alphabets plus their digit-string wire form.
//!
//! Both alphabets travel as strings of `0`/`1` digits. For bases the
//! convention is `0` = computational, `1` = Hadamard.

use std::fmt;
use std::ops::Index;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ProtocolError;

/// A single alphabet symbol with a one-digit encoding.
pub trait Symbol: Copy + Eq + fmt::Debug {
    fn from_digit(digit: char) -> Option<Self>;
    fn digit(self) -> char;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Bit {
    Zero,
    One,
}

impl Bit {
    pub fn flipped(self) -> Self {
        match self {
            Bit::Zero => Bit::One,
            Bit::One => Bit::Zero,
        }
    }
}

impl From<bool> for Bit {
    fn from(value: bool) -> Self {
        if value { Bit::One } else { Bit::Zero }
    }
}

impl Symbol for Bit {
    fn from_digit(digit: char) -> Option<Self> {
        match digit {
            '0' => Some(Bit::Zero),
            '1' => Some(Bit::One),
            _ => None,
        }
    }

    fn digit(self) -> char {
        match self {
            Bit::Zero => '0',
            Bit::One => '1',
        }
    }
}

/// Preparation / measurement frame of a two-level system.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Basis {
    Computational,
    Hadamard,
}

impl From<Bit> for Basis {
    fn from(bit: Bit) -> Self {
        match bit {
            Bit::Zero => Basis::Computational,
            Bit::One => Basis::Hadamard,
        }
    }
}

impl Symbol for Basis {
    fn from_digit(digit: char) -> Option<Self> {
        Bit::from_digit(digit).map(Basis::from)
    }

    fn digit(self) -> char {
        match self {
            Basis::Computational => '0',
            Basis::Hadamard => '1',
        }
    }
}

/// Ordered sequence of symbols, rendered as a digit string.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SymbolString<S: Symbol>(Vec<S>);

pub type BitString = SymbolString<Bit>;
pub type BasisString = SymbolString<Basis>;

impl<S: Symbol> SymbolString<S> {
    pub fn new(symbols: Vec<S>) -> Self {
        Self(symbols)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = S> + '_ {
        self.0.iter().copied()
    }

    pub fn get(&self, position: usize) -> Option<S> {
        self.0.get(position).copied()
    }

    pub fn as_slice(&self) -> &[S] {
        &self.0
    }

    /// Parses a wire string and enforces the security parameter.
    pub fn decode(field: &'static str, text: &str, lambda: usize) -> Result<Self, ProtocolError> {
        let found = text.chars().count();
        if found != lambda {
            return Err(ProtocolError::MalformedMessage {
                field,
                expected: lambda,
                found,
            });
        }
        text.chars()
            .enumerate()
            .map(|(position, digit)| {
                S::from_digit(digit).ok_or(ProtocolError::InvalidSymbol {
                    field,
                    symbol: digit,
                    position,
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }

    /// Checks the length against the security parameter.
    pub fn expect_len(&self, field: &'static str, lambda: usize) -> Result<(), ProtocolError> {
        if self.len() != lambda {
            return Err(ProtocolError::MalformedMessage {
                field,
                expected: lambda,
                found: self.len(),
            });
        }
        Ok(())
    }
}

impl BitString {
    /// Returns a copy with the bit at `position` inverted.
    pub fn with_flipped(&self, position: usize) -> Self {
        let mut bits = self.0.clone();
        if let Some(bit) = bits.get_mut(position) {
            *bit = bit.flipped();
        }
        Self(bits)
    }

    /// Reads the bit string as a basis string (bit 0 ↦ computational).
    pub fn to_bases(&self) -> BasisString {
        SymbolString(self.0.iter().copied().map(Basis::from).collect())
    }
}

impl<S: Symbol> Index<usize> for SymbolString<S> {
    type Output = S;

    fn index(&self, index: usize) -> &S {
        &self.0[index]
    }
}

impl<S: Symbol> FromIterator<S> for SymbolString<S> {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<S: Symbol> fmt::Display for SymbolString<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.iter().try_for_each(|s| write!(f, "{}", s.digit()))
    }
}

impl<S: Symbol> fmt::Debug for SymbolString<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParseSymbolError {
    pub symbol: char,
    pub position: usize,
}

impl fmt::Display for ParseSymbolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid symbol {:?} at position {}",
            self.symbol, self.position
        )
    }
}

impl std::error::Error for ParseSymbolError {}

impl<S: Symbol> FromStr for SymbolString<S> {
    type Err = ParseSymbolError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        text.chars()
            .enumerate()
            .map(|(position, symbol)| {
                S::from_digit(symbol).ok_or(ParseSymbolError { symbol, position })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }
}

impl<S: Symbol> Serialize for SymbolString<S> {
    fn serialize<Ser>(&self, serializer: Ser) -> Result<Ser::Ok, Ser::Error>
    where
        Ser: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de, S: Symbol> Deserialize<'de> for SymbolString<S> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}
