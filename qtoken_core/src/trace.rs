//! Structured protocol narration.
//!
//! Roles report what they did as [`ProtocolEvent`]s to an injected
//! [`ProtocolObserver`]; the verification rule itself never formats output.

use std::sync::{Arc, Mutex};

use log::{debug, info, warn};
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Issuer,
    Holder,
    Verifier,
}

impl Role {
    pub fn name(self) -> &'static str {
        match self {
            Role::Issuer => "issuer",
            Role::Holder => "holder",
            Role::Verifier => "verifier",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProtocolEvent {
    TokenIssued {
        holder_id: String,
        lambda: usize,
        states: String,
    },
    TokenReceived {
        holder_id: String,
    },
    StatesPrepared {
        holder_id: String,
        count: usize,
    },
    BasisDerived {
        holder_id: String,
        verifier_id: String,
        basis: String,
    },
    CryptogramSent {
        holder_id: String,
        kappa: String,
    },
    RequestForwarded {
        holder_id: String,
        verifier_id: String,
    },
    VerificationEvaluated {
        holder_id: String,
        verifier_id: String,
        checked: Vec<usize>,
        mismatched: Vec<usize>,
        accepted: bool,
    },
    VerdictReported {
        holder_id: String,
        accepted: bool,
    },
    Fault {
        role: Role,
        code: String,
        detail: String,
    },
}

pub trait ProtocolObserver: Send + Sync {
    fn observe(&self, event: &ProtocolEvent);
}

/// Discards every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullObserver;

impl ProtocolObserver for NullObserver {
    fn observe(&self, _event: &ProtocolEvent) {}
}

/// Forwards events to the `log` facade.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogObserver;

impl ProtocolObserver for LogObserver {
    fn observe(&self, event: &ProtocolEvent) {
        match event {
            ProtocolEvent::TokenIssued {
                holder_id,
                lambda,
                states,
            } => info!("issuer: token for {holder_id} (λ={lambda}) |P⟩ = {states}"),
            ProtocolEvent::TokenReceived { holder_id } => {
                debug!("holder {holder_id}: token description received")
            }
            ProtocolEvent::StatesPrepared { holder_id, count } => {
                debug!("holder {holder_id}: prepared {count} states")
            }
            ProtocolEvent::BasisDerived {
                holder_id,
                verifier_id,
                basis,
            } => debug!("holder {holder_id}: m = MAC(secret, {verifier_id}) = {basis}"),
            ProtocolEvent::CryptogramSent { holder_id, kappa } => {
                info!("holder {holder_id}: cryptogram κ = {kappa}")
            }
            ProtocolEvent::RequestForwarded {
                holder_id,
                verifier_id,
            } => info!("verifier {verifier_id}: forwarding payment of {holder_id} to issuer"),
            ProtocolEvent::VerificationEvaluated {
                holder_id,
                verifier_id,
                checked,
                mismatched,
                accepted,
            } => info!(
                "issuer: {holder_id} at {verifier_id}: {}/{} checked positions match -> {}",
                checked.len() - mismatched.len(),
                checked.len(),
                if *accepted { "accept" } else { "reject" }
            ),
            ProtocolEvent::VerdictReported {
                holder_id,
                accepted,
            } => info!(
                "verifier: payment from {holder_id} {}",
                if *accepted { "ACCEPTED" } else { "REJECTED" }
            ),
            ProtocolEvent::Fault { role, code, detail } => {
                warn!("{}: fault {code}: {detail}", role.name())
            }
        }
    }
}

/// Keeps every event in arrival order.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<ProtocolEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProtocolEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl ProtocolObserver for RecordingObserver {
    fn observe(&self, event: &ProtocolEvent) {
        let mut events = match self.events.lock() {
            Ok(events) => events,
            Err(poisoned) => poisoned.into_inner(),
        };
        events.push(event.clone());
    }
}

/// Sends each event to two observers.
pub struct Tee {
    first: Arc<dyn ProtocolObserver>,
    second: Arc<dyn ProtocolObserver>,
}

impl Tee {
    pub fn new(first: Arc<dyn ProtocolObserver>, second: Arc<dyn ProtocolObserver>) -> Self {
        Self { first, second }
    }
}

impl ProtocolObserver for Tee {
    fn observe(&self, event: &ProtocolEvent) {
        self.first.observe(event);
        self.second.observe(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn events_serialize_with_a_tag() {
        let event = ProtocolEvent::VerdictReported {
            holder_id: "client_alice".into(),
            accepted: true,
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"event": "verdict_reported", "holder_id": "client_alice", "accepted": true})
        );
    }

    #[test]
    fn tee_feeds_both_recorders() {
        let a = Arc::new(RecordingObserver::new());
        let b = Arc::new(RecordingObserver::new());
        let tee = Tee::new(a.clone(), b.clone());
        tee.observe(&ProtocolEvent::TokenReceived {
            holder_id: "h".into(),
        });
        assert_eq!(a.events().len(), 1);
        assert_eq!(a.events(), b.events());
    }
}
