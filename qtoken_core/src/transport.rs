//! Blocking, ordered, exactly-once links between two named roles.
//!
//! Each direction is an `mpsc` channel carrying JSON frames, so every record
//! crosses the link in its wire form and is decoded by the receiver.

use std::sync::mpsc::{Receiver, Sender, channel};

use log::debug;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::ProtocolError;
use crate::trace::Role;

#[derive(Debug)]
pub struct Link {
    local: Role,
    peer: Role,
    outbound: Sender<String>,
    inbound: Receiver<String>,
}

/// Both ends of a bidirectional link between `a` and `b`.
pub fn link_pair(a: Role, b: Role) -> (Link, Link) {
    let (a_tx, b_rx) = channel();
    let (b_tx, a_rx) = channel();
    (
        Link {
            local: a,
            peer: b,
            outbound: a_tx,
            inbound: a_rx,
        },
        Link {
            local: b,
            peer: a,
            outbound: b_tx,
            inbound: b_rx,
        },
    )
}

impl Link {
    pub fn peer(&self) -> Role {
        self.peer
    }

    pub fn send<T: Serialize>(&self, message: &T) -> Result<(), ProtocolError> {
        let frame = serde_json::to_string(message)?;
        debug!(
            "{} -> {}: {frame}",
            self.local.name(),
            self.peer.name()
        );
        self.send_frame(frame)
    }

    /// Sends a raw frame as-is.
    pub fn send_frame(&self, frame: String) -> Result<(), ProtocolError> {
        self.outbound
            .send(frame)
            .map_err(|_| ProtocolError::ChannelClosed {
                peer: self.peer.name(),
            })
    }

    /// Blocks until the peer sends the next frame.
    pub fn recv<T: DeserializeOwned>(&self) -> Result<T, ProtocolError> {
        let frame = self.recv_frame()?;
        Ok(serde_json::from_str(&frame)?)
    }

    pub fn recv_frame(&self) -> Result<String, ProtocolError> {
        self.inbound.recv().map_err(|_| ProtocolError::ChannelClosed {
            peer: self.peer.name(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{PaymentMessage, VerificationReply};

    #[test]
    fn frames_arrive_in_order() {
        let (holder, verifier) = link_pair(Role::Holder, Role::Verifier);
        for i in 0..3 {
            holder
                .send(&PaymentMessage {
                    holder_id: format!("h{i}"),
                    kappa: "01".into(),
                })
                .unwrap();
        }
        for i in 0..3 {
            let msg: PaymentMessage = verifier.recv().unwrap();
            assert_eq!(msg.holder_id, format!("h{i}"));
        }
        assert_eq!(verifier.peer(), Role::Holder);
    }

    #[test]
    fn dropped_peer_closes_the_link() {
        let (issuer, verifier) = link_pair(Role::Issuer, Role::Verifier);
        drop(issuer);
        let err = verifier.recv::<VerificationReply>().unwrap_err();
        assert!(matches!(err, ProtocolError::ChannelClosed { peer: "issuer" }));
        let err = verifier.send(&VerificationReply::verdict(true)).unwrap_err();
        assert!(matches!(err, ProtocolError::ChannelClosed { peer: "issuer" }));
    }

    #[test]
    fn garbage_frame_is_a_codec_error() {
        let (issuer, verifier) = link_pair(Role::Issuer, Role::Verifier);
        issuer.send_frame("{not json".into()).unwrap();
        let err = verifier.recv::<VerificationReply>().unwrap_err();
        assert!(matches!(err, ProtocolError::Codec(_)));
    }
}
