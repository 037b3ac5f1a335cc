//! Merchant side: attaches its identity and relays the issuer's verdict.
//!
//! The verifier never sees a secret or a token, only the final boolean.

use std::sync::Arc;

use crate::error::ProtocolError;
use crate::messages::{PaymentMessage, VerificationReply, VerificationRequest, VerificationResult};
use crate::trace::{NullObserver, ProtocolEvent, ProtocolObserver, Role};
use crate::transport::Link;

pub struct Verifier {
    verifier_id: String,
    observer: Arc<dyn ProtocolObserver>,
}

impl Verifier {
    pub fn new(verifier_id: impl Into<String>) -> Self {
        Self {
            verifier_id: verifier_id.into(),
            observer: Arc::new(NullObserver),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn ProtocolObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn forward(&self, payment: PaymentMessage) -> VerificationRequest {
        VerificationRequest {
            holder_id: payment.holder_id,
            kappa: payment.kappa,
            verifier_id: self.verifier_id.clone(),
        }
    }

    /// Turns the issuer's reply into a verdict, surfacing faults as errors.
    pub fn report(
        &self,
        holder_id: &str,
        reply: VerificationReply,
    ) -> Result<VerificationResult, ProtocolError> {
        match reply.into_result() {
            Ok(result) => {
                self.observer.observe(&ProtocolEvent::VerdictReported {
                    holder_id: holder_id.to_string(),
                    accepted: result.accepted,
                });
                Ok(result)
            }
            Err(err) => {
                self.observer.observe(&ProtocolEvent::Fault {
                    role: Role::Verifier,
                    code: err.code().to_string(),
                    detail: err.to_string(),
                });
                Err(err)
            }
        }
    }

    /// Runs the verifier side of one protocol run.
    pub fn run(&self, holder: &Link, issuer: &Link) -> Result<VerificationResult, ProtocolError> {
        let payment: PaymentMessage = holder.recv()?;
        let holder_id = payment.holder_id.clone();
        let request = self.forward(payment);
        issuer.send(&request)?;
        self.observer.observe(&ProtocolEvent::RequestForwarded {
            holder_id: holder_id.clone(),
            verifier_id: self.verifier_id.clone(),
        });
        let reply: VerificationReply = issuer.recv()?;
        self.report(&holder_id, reply)
    }
}
