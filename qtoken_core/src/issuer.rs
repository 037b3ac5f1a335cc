//! Trusted third party: issues tokens and rules on presented cryptograms.

use std::collections::HashMap;
use std::sync::Arc;

use log::debug;
use rand_core::{CryptoRng, RngCore};
use serde::Serialize;

use crate::bits::{BasisString, BitString};
use crate::error::ProtocolError;
use crate::mac::measurement_bases;
use crate::messages::{
    FaultReport, TokenDescription, VerificationReply, VerificationRequest,
};
use crate::store::{SecretRegistry, TokenStore};
use crate::token::Token;
use crate::trace::{NullObserver, ProtocolEvent, ProtocolObserver, Role};
use crate::transport::Link;

/// Per-holder lifecycle on the issuer side.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssuerPhase {
    Idle,
    TokenIssued,
    AwaitingVerification,
    Verified,
}

/// Outcome of comparing a cryptogram with the stored token.
///
/// A position is checked when the MAC-derived basis equals the token's
/// preparation basis; only there can the issuer predict the holder's bit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct VerificationReport {
    pub checked: Vec<usize>,
    pub mismatched: Vec<usize>,
}

impl VerificationReport {
    pub fn total_checked(&self) -> usize {
        self.checked.len()
    }

    pub fn matches(&self) -> usize {
        self.checked.len() - self.mismatched.len()
    }

    /// An empty checked set carries no evidence and is rejected.
    pub fn accepted(&self) -> bool {
        !self.checked.is_empty() && self.mismatched.is_empty()
    }
}

/// Applies the acceptance rule to every position before answering.
pub fn evaluate_cryptogram(
    token: &Token,
    expected: &BasisString,
    kappa: &BitString,
) -> Result<VerificationReport, ProtocolError> {
    expected.expect_len("expected bases", token.len())?;
    kappa.expect_len("kappa", token.len())?;
    let mut checked = Vec::new();
    let mut mismatched = Vec::new();
    for j in 0..token.len() {
        if expected[j] != token.bases()[j] {
            continue;
        }
        checked.push(j);
        if kappa[j] != token.bits()[j] {
            mismatched.push(j);
        }
    }
    Ok(VerificationReport {
        checked,
        mismatched,
    })
}

pub struct Issuer {
    lambda: usize,
    secrets: SecretRegistry,
    tokens: TokenStore,
    phases: HashMap<String, IssuerPhase>,
    observer: Arc<dyn ProtocolObserver>,
}

impl Issuer {
    pub fn new(lambda: usize, secrets: SecretRegistry) -> Self {
        Self {
            lambda,
            secrets,
            tokens: TokenStore::new(),
            phases: HashMap::new(),
            observer: Arc::new(NullObserver),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn ProtocolObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn phase(&self, holder_id: &str) -> IssuerPhase {
        self.phases
            .get(holder_id)
            .copied()
            .unwrap_or(IssuerPhase::Idle)
    }

    pub fn has_outstanding_token(&self, holder_id: &str) -> bool {
        self.tokens.contains(holder_id)
    }

    /// Generates a fresh token for `holder_id` and returns the holder's copy.
    pub fn issue<R: RngCore + CryptoRng + ?Sized>(
        &mut self,
        holder_id: &str,
        rng: &mut R,
    ) -> Result<TokenDescription, ProtocolError> {
        self.ensure_no_outstanding(holder_id)?;
        let token = Token::generate(self.lambda, rng);
        self.issue_token(holder_id, token)
    }

    /// Stores an externally prepared token, e.g. a fixture.
    pub fn issue_token(
        &mut self,
        holder_id: &str,
        token: Token,
    ) -> Result<TokenDescription, ProtocolError> {
        self.ensure_no_outstanding(holder_id)?;
        token.bits().expect_len("bits", self.lambda)?;
        let description = token.describe();
        self.observer.observe(&ProtocolEvent::TokenIssued {
            holder_id: holder_id.to_string(),
            lambda: self.lambda,
            states: token.ket_notation(),
        });
        self.tokens.insert(holder_id, token);
        self.phases
            .insert(holder_id.to_string(), IssuerPhase::TokenIssued);
        Ok(description)
    }

    /// Marks the holder's token as handed over; the next step is a request.
    pub fn await_verification(&mut self, holder_id: &str) -> Result<(), ProtocolError> {
        if !self.tokens.contains(holder_id) {
            return Err(ProtocolError::NoOutstandingToken {
                holder_id: holder_id.to_string(),
            });
        }
        self.phases
            .insert(holder_id.to_string(), IssuerPhase::AwaitingVerification);
        Ok(())
    }

    /// Evaluates a request and consumes the token.
    ///
    /// Lookup and shape failures are returned as errors and leave the token in
    /// place; a completed evaluation, accepting or not, consumes it.
    pub fn verify(
        &mut self,
        request: &VerificationRequest,
    ) -> Result<VerificationReport, ProtocolError> {
        let report = self.evaluate(request)?;
        self.tokens.take(&request.holder_id);
        self.phases
            .insert(request.holder_id.clone(), IssuerPhase::Verified);
        debug!(
            "issuer: holder={} verifier={} checked={:?} mismatched={:?}",
            request.holder_id, request.verifier_id, report.checked, report.mismatched
        );
        self.observer.observe(&ProtocolEvent::VerificationEvaluated {
            holder_id: request.holder_id.clone(),
            verifier_id: request.verifier_id.clone(),
            checked: report.checked.clone(),
            mismatched: report.mismatched.clone(),
            accepted: report.accepted(),
        });
        Ok(report)
    }

    /// Wire reply for a request: a verdict, or a fault for lookup/shape errors.
    pub fn reply(&mut self, request: &VerificationRequest) -> VerificationReply {
        match self.verify(request) {
            Ok(report) => VerificationReply::verdict(report.accepted()),
            Err(err) => {
                self.report_fault(&err);
                VerificationReply::Fault(FaultReport::from(&err))
            }
        }
    }

    /// Runs the issuer side of one protocol run for `holder_id`.
    ///
    /// A request that cannot be decoded or evaluated is answered with a
    /// fault before the error is returned.
    pub fn serve<R: RngCore + CryptoRng + ?Sized>(
        &mut self,
        holder_id: &str,
        holder: &Link,
        verifier: &Link,
        rng: &mut R,
    ) -> Result<VerificationReport, ProtocolError> {
        let description = self.issue(holder_id, rng)?;
        holder.send(&description)?;
        self.await_verification(holder_id)?;

        let outcome = match verifier.recv::<VerificationRequest>() {
            Ok(request) => self.verify(&request),
            Err(err @ ProtocolError::ChannelClosed { .. }) => return Err(err),
            Err(err) => Err(err),
        };
        match outcome {
            Ok(report) => {
                verifier.send(&VerificationReply::verdict(report.accepted()))?;
                Ok(report)
            }
            Err(err) => {
                self.report_fault(&err);
                verifier.send(&VerificationReply::Fault(FaultReport::from(&err)))?;
                Err(err)
            }
        }
    }

    fn evaluate(&self, request: &VerificationRequest) -> Result<VerificationReport, ProtocolError> {
        let holder_id = request.holder_id.as_str();
        let secret = self
            .secrets
            .get(holder_id)
            .ok_or_else(|| ProtocolError::UnknownHolder {
                holder_id: holder_id.to_string(),
            })?;
        let token = self
            .tokens
            .get(holder_id)
            .ok_or_else(|| ProtocolError::NoOutstandingToken {
                holder_id: holder_id.to_string(),
            })?;
        let kappa = request.decode_kappa(self.lambda)?;
        let expected = measurement_bases(secret.expose(), &request.verifier_id, self.lambda);
        evaluate_cryptogram(token, &expected, &kappa)
    }

    fn ensure_no_outstanding(&self, holder_id: &str) -> Result<(), ProtocolError> {
        if self.tokens.contains(holder_id) {
            return Err(ProtocolError::DuplicateToken {
                holder_id: holder_id.to_string(),
            });
        }
        Ok(())
    }

    fn report_fault(&self, err: &ProtocolError) {
        self.observer.observe(&ProtocolEvent::Fault {
            role: Role::Issuer,
            code: err.code().to_string(),
            detail: err.to_string(),
        });
    }
}
