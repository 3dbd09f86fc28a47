//! Reply messages

use crate::{MSG_KIND_HEADER, ProtocolError, Result};
use pact_common::{Outcome, ParticipantId};
use pact_rendezvous::Message;
use serde::{Deserialize, Serialize};

/// Prepare vote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Vote {
    /// Participant validated the operation and holds the key's
    /// provisional lock until commit or abort
    Yes,
    /// Participant cannot take part; the transaction must abort
    No,
}

/// Commit acknowledgement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommitAck {
    /// Operation applied (or already applied; redelivery is harmless)
    Applied,
    /// No matching prepare was recorded for this request - an anomaly,
    /// since only the coordinator invokes commit after a successful prepare
    NoMatchingPrepare,
}

/// A reply from a participant's serve loop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParticipantReply {
    /// Reply to `SayHello`
    Greeting(String),

    /// Reply to `GetIdentity`
    Identity(ParticipantId),

    /// Reply to `SetPeers`
    PeersInstalled,

    /// Reply to `HandleRequest`
    Outcome(Outcome),

    /// Reply to `Prepare`
    Vote(Vote),

    /// Reply to `Commit`
    Ack(CommitAck),
}

impl ParticipantReply {
    /// Variant name for headers and logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Greeting(_) => "greeting",
            Self::Identity(_) => "identity",
            Self::PeersInstalled => "peers_installed",
            Self::Outcome(_) => "outcome",
            Self::Vote(_) => "vote",
            Self::Ack(_) => "ack",
        }
    }

    /// Encode into a transport message
    pub fn encode(&self) -> Result<Message> {
        let body = serde_json::to_vec(self)?;
        Ok(Message::with_body(body).with_header(MSG_KIND_HEADER, self.kind()))
    }

    /// Decode from a transport message
    pub fn decode(message: &Message) -> Result<Self> {
        Ok(serde_json::from_slice(&message.body)?)
    }

    /// Decode, expecting an operation outcome
    pub fn expect_outcome(message: &Message) -> Result<Outcome> {
        match Self::decode(message)? {
            Self::Outcome(outcome) => Ok(outcome),
            other => Err(ProtocolError::UnexpectedReply {
                expected: "outcome",
                got: other.kind(),
            }),
        }
    }

    /// Decode, expecting a prepare vote
    pub fn expect_vote(message: &Message) -> Result<Vote> {
        match Self::decode(message)? {
            Self::Vote(vote) => Ok(vote),
            other => Err(ProtocolError::UnexpectedReply {
                expected: "vote",
                got: other.kind(),
            }),
        }
    }

    /// Decode, expecting a commit acknowledgement
    pub fn expect_ack(message: &Message) -> Result<CommitAck> {
        match Self::decode(message)? {
            Self::Ack(ack) => Ok(ack),
            other => Err(ProtocolError::UnexpectedReply {
                expected: "ack",
                got: other.kind(),
            }),
        }
    }
}

/// Acknowledgement of a coordinator callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackAck;

impl CallbackAck {
    /// Encode into a transport message
    pub fn encode(&self) -> Result<Message> {
        let body = serde_json::to_vec(self)?;
        Ok(Message::with_body(body).with_header(MSG_KIND_HEADER, "callback_ack"))
    }

    /// Decode from a transport message
    pub fn decode(message: &Message) -> Result<Self> {
        Ok(serde_json::from_slice(&message.body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pact_common::RequestId;

    #[test]
    fn test_vote_roundtrip() {
        let reply = ParticipantReply::Vote(Vote::No);
        let message = reply.encode().unwrap();
        assert_eq!(ParticipantReply::expect_vote(&message).unwrap(), Vote::No);
    }

    #[test]
    fn test_expect_mismatch() {
        let reply = ParticipantReply::Outcome(Outcome::Committed {
            request_id: RequestId::new(),
        });
        let message = reply.encode().unwrap();
        assert!(matches!(
            ParticipantReply::expect_vote(&message),
            Err(ProtocolError::UnexpectedReply { .. })
        ));
    }
}
