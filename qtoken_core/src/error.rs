use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("unknown holder {holder_id:?}: no pre-shared secret registered")]
    UnknownHolder { holder_id: String },

    #[error("no outstanding token for holder {holder_id:?}")]
    NoOutstandingToken { holder_id: String },

    #[error("holder {holder_id:?} already has an outstanding token")]
    DuplicateToken { holder_id: String },

    #[error("malformed {field}: expected {expected} symbols, found {found}")]
    MalformedMessage {
        field: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("malformed {field}: invalid symbol {symbol:?} at position {position}")]
    InvalidSymbol {
        field: &'static str,
        symbol: char,
        position: usize,
    },

    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("frame decoding failed: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("channel to {peer} closed")]
    ChannelClosed { peer: &'static str },

    #[error("issuer rejected the request with fault {code}: {detail}")]
    IssuerFault { code: String, detail: String },

    #[error("{role} role terminated abnormally")]
    RoleFailed { role: &'static str },
}

impl ProtocolError {
    /// Stable reason code carried in fault replies.
    pub fn code(&self) -> &'static str {
        match self {
            ProtocolError::UnknownHolder { .. } => "UNKNOWN_HOLDER",
            ProtocolError::NoOutstandingToken { .. } => "NO_OUTSTANDING_TOKEN",
            ProtocolError::DuplicateToken { .. } => "DUPLICATE_TOKEN",
            ProtocolError::MalformedMessage { .. }
            | ProtocolError::InvalidSymbol { .. }
            | ProtocolError::Codec(_) => "MALFORMED_MESSAGE",
            ProtocolError::InvalidConfig { .. } => "INVALID_CONFIG",
            ProtocolError::ChannelClosed { .. } => "CHANNEL_CLOSED",
            ProtocolError::IssuerFault { .. } => "ISSUER_FAULT",
            ProtocolError::RoleFailed { .. } => "ROLE_FAILED",
        }
    }

    pub(crate) fn invalid_config(reason: impl Into<String>) -> Self {
        ProtocolError::InvalidConfig {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_errors_share_one_code() {
        let short = ProtocolError::MalformedMessage {
            field: "kappa",
            expected: 8,
            found: 7,
        };
        let foreign = ProtocolError::InvalidSymbol {
            field: "kappa",
            symbol: '2',
            position: 0,
        };
        let undecodable = ProtocolError::from(
            serde_json::from_str::<serde_json::Value>("{not json").unwrap_err(),
        );
        assert_eq!(short.code(), "MALFORMED_MESSAGE");
        assert_eq!(foreign.code(), short.code());
        assert_eq!(undecodable.code(), short.code());
    }

    #[test]
    fn display_names_the_holder() {
        let err = ProtocolError::NoOutstandingToken {
            holder_id: "client_alice".into(),
        };
        assert_eq!(
            err.to_string(),
            "no outstanding token for holder \"client_alice\""
        );
    }
}
