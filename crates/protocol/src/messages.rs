//! Request messages
//!
//! `ParticipantRequest` is the surface every participant serves; the
//! coordinator serves the same surface plus `CoordinatorCallback`, the
//! vote/ack reporting path participants call during prepare and commit.

use crate::{MSG_KIND_HEADER, Result};
use pact_common::{Operation, ParticipantId, RequestId};
use pact_rendezvous::Message;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A request to a participant's serve loop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParticipantRequest {
    /// Liveness probe; replies with a greeting naming the participant
    SayHello,

    /// Ask for the participant's stable identity
    GetIdentity,

    /// One-time installation of the peer set at bootstrap
    SetPeers { peers: HashSet<ParticipantId> },

    /// A client operation; reads are served locally, writes forwarded
    /// to the coordinator
    HandleRequest {
        request_id: RequestId,
        operation: Operation,
    },

    /// Phase one of 2PC; coordinator-only
    Prepare {
        request_id: RequestId,
        operation: Operation,
    },

    /// Phase two of 2PC; coordinator-only
    Commit {
        request_id: RequestId,
        operation: Operation,
    },
}

impl ParticipantRequest {
    /// Variant name for headers and logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SayHello => "say_hello",
            Self::GetIdentity => "get_identity",
            Self::SetPeers { .. } => "set_peers",
            Self::HandleRequest { .. } => "handle_request",
            Self::Prepare { .. } => "prepare",
            Self::Commit { .. } => "commit",
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
}

/// Vote/ack reporting call from a participant to the coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoordinatorCallback {
    /// The named participant voted Yes in prepare for this request
    NotifyPrepared {
        participant: ParticipantId,
        request_id: RequestId,
    },

    /// The named participant applied the commit for this request
    NotifyCommitted {
        participant: ParticipantId,
        request_id: RequestId,
    },
}

impl CoordinatorCallback {
    /// Variant name for headers and logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotifyPrepared { .. } => "notify_prepared",
            Self::NotifyCommitted { .. } => "notify_committed",
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
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_roundtrip() {
        let request = ParticipantRequest::Prepare {
            request_id: RequestId::new(),
            operation: Operation::Put {
                key: "APPLE".into(),
                value: "$1".into(),
            },
        };

        let message = request.encode().unwrap();
        assert_eq!(message.get_header(MSG_KIND_HEADER), Some("prepare"));
        assert_eq!(ParticipantRequest::decode(&message).unwrap(), request);
    }

    #[test]
    fn test_callback_roundtrip() {
        let callback = CoordinatorCallback::NotifyPrepared {
            participant: ParticipantId(3),
            request_id: RequestId::new(),
        };

        let message = callback.encode().unwrap();
        assert_eq!(CoordinatorCallback::decode(&message).unwrap(), callback);
    }

    #[test]
    fn test_garbage_body_is_an_error() {
        let message = Message::with_body(b"not json".to_vec());
        assert!(ParticipantRequest::decode(&message).is_err());
    }
}
