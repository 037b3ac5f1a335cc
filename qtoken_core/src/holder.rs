//! Client side: turns a token description into a cryptogram bound to one
//! verifier.

use std::sync::Arc;

use log::debug;
use rand_core::RngCore;
use serde::Serialize;

use crate::bits::{BasisString, BitString};
use crate::error::ProtocolError;
use crate::mac::measurement_bases;
use crate::messages::{PaymentMessage, TokenDescription};
use crate::quantum::QuantumRegister;
use crate::store::SharedSecret;
use crate::trace::{NullObserver, ProtocolEvent, ProtocolObserver, Role};
use crate::transport::Link;

/// What the holder measured in and what it got.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HolderReceipt {
    pub measurement_basis: BasisString,
    pub kappa: BitString,
}

pub struct Holder {
    holder_id: String,
    secret: SharedSecret,
    verifier_id: String,
    lambda: usize,
    observer: Arc<dyn ProtocolObserver>,
}

impl Holder {
    pub fn new(
        holder_id: impl Into<String>,
        secret: impl Into<SharedSecret>,
        verifier_id: impl Into<String>,
        lambda: usize,
    ) -> Self {
        Self {
            holder_id: holder_id.into(),
            secret: secret.into(),
            verifier_id: verifier_id.into(),
            lambda,
            observer: Arc::new(NullObserver),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn ProtocolObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Prepares one state per position and measures it in the MAC-derived basis.
    pub fn measure_token<R: RngCore + ?Sized>(
        &self,
        description: &TokenDescription,
        rng: &mut R,
    ) -> Result<HolderReceipt, ProtocolError> {
        let (bits, bases) = description.decode(self.lambda)?;
        let register = QuantumRegister::prepare(&bits, &bases)?;
        self.observer.observe(&ProtocolEvent::StatesPrepared {
            holder_id: self.holder_id.clone(),
            count: register.len(),
        });

        let measurement_basis =
            measurement_bases(self.secret.expose(), &self.verifier_id, self.lambda);
        self.observer.observe(&ProtocolEvent::BasisDerived {
            holder_id: self.holder_id.clone(),
            verifier_id: self.verifier_id.clone(),
            basis: measurement_basis.to_string(),
        });

        let kappa = register.measure_all(&measurement_basis, rng)?;
        debug!("holder {}: m={} kappa={}", self.holder_id, measurement_basis, kappa);
        Ok(HolderReceipt {
            measurement_basis,
            kappa,
        })
    }

    pub fn payment(&self, receipt: &HolderReceipt) -> PaymentMessage {
        PaymentMessage::new(self.holder_id.clone(), &receipt.kappa)
    }

    /// Runs the holder side of one protocol run.
    pub fn run<R: RngCore + ?Sized>(
        &self,
        issuer: &Link,
        verifier: &Link,
        rng: &mut R,
    ) -> Result<HolderReceipt, ProtocolError> {
        let outcome = issuer
            .recv::<TokenDescription>()
            .and_then(|description| {
                self.observer.observe(&ProtocolEvent::TokenReceived {
                    holder_id: self.holder_id.clone(),
                });
                self.measure_token(&description, rng)
            });
        let receipt = match outcome {
            Ok(receipt) => receipt,
            Err(err) => {
                self.observer.observe(&ProtocolEvent::Fault {
                    role: Role::Holder,
                    code: err.code().to_string(),
                    detail: err.to_string(),
                });
                return Err(err);
            }
        };
        self.observer.observe(&ProtocolEvent::CryptogramSent {
            holder_id: self.holder_id.clone(),
            kappa: receipt.kappa.to_string(),
        });
        verifier.send(&self.payment(&receipt))?;
        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bits::Bit;
    use crate::rng::derive_role_rng;
    use crate::token::Token;

    fn holder() -> Holder {
        Holder::new("client_alice", "secret_token_abc123", "merchant_shop_xyz", 8)
    }

    #[test]
    fn checked_positions_reproduce_the_token_bits() {
        let token = Token::new("10110010".parse().unwrap(), "01101100".parse().unwrap()).unwrap();
        for run in 0..50 {
            let mut rng = derive_role_rng(b"holder-checked", run, b"holder");
            let receipt = holder().measure_token(&token.describe(), &mut rng).unwrap();
            assert_eq!(receipt.measurement_basis.to_string(), "00110000");
            for j in [0, 2, 6, 7] {
                assert_eq!(receipt.kappa[j], token.bits()[j], "position {j}, run {run}");
            }
        }
    }

    #[test]
    fn mismatched_positions_vary_across_runs() {
        let token = Token::new("10110010".parse().unwrap(), "01101100".parse().unwrap()).unwrap();
        let ones = (0..64)
            .map(|run| {
                let mut rng = derive_role_rng(b"holder-unchecked", run, b"holder");
                holder().measure_token(&token.describe(), &mut rng).unwrap().kappa[1]
            })
            .filter(|bit| *bit == Bit::One)
            .count();
        assert!(ones > 0 && ones < 64, "position 1 never varied: {ones}");
    }

    #[test]
    fn wrong_length_description_is_malformed() {
        let description = TokenDescription {
            bits: "1011".into(),
            bases: "0110".into(),
        };
        let mut rng = derive_role_rng(b"holder-short", 0, b"holder");
        let err = holder().measure_token(&description, &mut rng).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::MalformedMessage {
                expected: 8,
                found: 4,
                ..
            }
        ));
    }

    #[test]
    fn payment_carries_identity_and_kappa() {
        let receipt = HolderReceipt {
            measurement_basis: "00110000".parse().unwrap(),
            kappa: "10101010".parse().unwrap(),
        };
        let payment = holder().payment(&receipt);
        assert_eq!(payment.holder_id, "client_alice");
        assert_eq!(payment.kappa, "10101010");
    }
}
