//! The four records exchanged between roles, plus the issuer's fault reply.
//!
//! Bit and basis sequences travel as digit strings and are only checked
//! against λ when the receiving role decodes them.

use serde::{Deserialize, Serialize};

use crate::bits::{BasisString, BitString};
use crate::error::ProtocolError;

/// Issuer → Holder.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenDescription {
    pub bits: String,
    pub bases: String,
}

impl TokenDescription {
    pub fn new(bits: &BitString, bases: &BasisString) -> Self {
        Self {
            bits: bits.to_string(),
            bases: bases.to_string(),
        }
    }

    pub fn decode(&self, lambda: usize) -> Result<(BitString, BasisString), ProtocolError> {
        let bits = BitString::decode("bits", &self.bits, lambda)?;
        let bases = BasisString::decode("bases", &self.bases, lambda)?;
        Ok((bits, bases))
    }
}

/// Holder → Verifier.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMessage {
    pub holder_id: String,
    pub kappa: String,
}

impl PaymentMessage {
    pub fn new(holder_id: impl Into<String>, kappa: &BitString) -> Self {
        Self {
            holder_id: holder_id.into(),
            kappa: kappa.to_string(),
        }
    }

    pub fn decode_kappa(&self, lambda: usize) -> Result<BitString, ProtocolError> {
        BitString::decode("kappa", &self.kappa, lambda)
    }
}

/// Verifier → Issuer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationRequest {
    pub holder_id: String,
    pub kappa: String,
    pub verifier_id: String,
}

impl VerificationRequest {
    pub fn decode_kappa(&self, lambda: usize) -> Result<BitString, ProtocolError> {
        BitString::decode("kappa", &self.kappa, lambda)
    }
}

/// Issuer → Verifier verdict.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub accepted: bool,
}

/// Issuer → Verifier when the request could not be evaluated at all.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaultReport {
    pub fault: String,
    pub detail: String,
}

impl From<&ProtocolError> for FaultReport {
    fn from(err: &ProtocolError) -> Self {
        Self {
            fault: err.code().to_string(),
            detail: err.to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VerificationReply {
    Verdict(VerificationResult),
    Fault(FaultReport),
}

impl VerificationReply {
    pub fn verdict(accepted: bool) -> Self {
        VerificationReply::Verdict(VerificationResult { accepted })
    }

    /// Verdict as a boolean; a fault becomes [`ProtocolError::IssuerFault`].
    pub fn into_result(self) -> Result<VerificationResult, ProtocolError> {
        match self {
            VerificationReply::Verdict(result) => Ok(result),
            VerificationReply::Fault(report) => Err(ProtocolError::IssuerFault {
                code: report.fault,
                detail: report.detail,
            }),
        }
    }
}
