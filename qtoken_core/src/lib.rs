//! Core of a three-party quantum-token payment authentication protocol.
//!
//! An issuer hands a holder a token of λ states; the holder measures them in
//! a basis derived from `MAC(secret, verifier_id)` and presents the outcomes
//! through a verifier, and the issuer checks the positions where that basis
//! coincides with the preparation basis. The physical layer is simulated and
//! the implementation should **not** be used for real payments.

pub mod bits;
pub mod config;
pub mod error;
pub mod holder;
pub mod issuer;
pub mod mac;
pub mod messages;
pub mod quantum;
pub mod rng;
pub mod session;
pub mod store;
pub mod token;
pub mod trace;
pub mod transport;
pub mod verifier;

pub use crate::bits::{Basis, BasisString, Bit, BitString, Symbol, SymbolString};
pub use crate::config::{DEFAULT_LAMBDA, HolderEntry, ProtocolConfig};
pub use crate::error::ProtocolError;
pub use crate::holder::{Holder, HolderReceipt};
pub use crate::issuer::{Issuer, IssuerPhase, VerificationReport, evaluate_cryptogram};
pub use crate::mac::{mac, measurement_bases};
pub use crate::messages::{
    FaultReport, PaymentMessage, TokenDescription, VerificationReply, VerificationRequest,
    VerificationResult,
};
pub use crate::quantum::{QuantumRegister, QubitState};
pub use crate::rng::{SecureRng, derive_role_rng, fresh_seed, secure_rng};
pub use crate::session::{ProtocolSession, RunStatistics, SessionOutcome};
pub use crate::store::{SecretRegistry, SharedSecret, TokenStore};
pub use crate::token::Token;
pub use crate::trace::{
    LogObserver, NullObserver, ProtocolEvent, ProtocolObserver, RecordingObserver, Role, Tee,
};
pub use crate::transport::{Link, link_pair};
pub use crate::verifier::Verifier;
