//! Typed message contracts between submitter, participants, and coordinator
//!
//! The transport carries opaque bodies; this crate owns the typed view of
//! both directions of every call. Bodies are serde_json-encoded and a
//! `msg_kind` header names the payload type for dispatch diagnostics.

mod messages;
mod responses;

use thiserror::Error;

pub use messages::{CoordinatorCallback, ParticipantRequest};
pub use responses::{CallbackAck, CommitAck, ParticipantReply, Vote};

/// Header naming the payload type
pub const MSG_KIND_HEADER: &str = "msg_kind";

/// Protocol encode/decode errors
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Failed to decode message body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Unexpected reply: expected {expected}, got {got}")]
    UnexpectedReply {
        expected: &'static str,
        got: &'static str,
    },
}

/// Result type for protocol operations
pub type Result<T> = std::result::Result<T, ProtocolError>;
