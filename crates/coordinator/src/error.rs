//! Error types for the coordinator

use pact_common::RequestId;
use thiserror::Error;

/// Result type for coordinator operations
pub type Result<T> = std::result::Result<T, CoordinatorError>;

/// Coordinator errors
#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("Request already tracked: {0}")]
    DuplicateRequest(RequestId),

    #[error("Unknown request: {0}")]
    UnknownRequest(RequestId),

    #[error("Invalid transaction state: {0}")]
    InvalidState(String),

    #[error("Transport error: {0}")]
    Transport(#[from] pact_rendezvous::RendezvousError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] pact_protocol::ProtocolError),
}
