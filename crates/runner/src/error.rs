//! Error types for the runner

use thiserror::Error;

/// Result type for runner operations
pub type Result<T> = std::result::Result<T, RunnerError>;

/// Runner errors
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("Cluster too small: need at least {min} participants, got {got}")]
    ClusterTooSmall { min: usize, got: usize },

    #[error("Transport error: {0}")]
    Rendezvous(#[from] pact_rendezvous::RendezvousError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] pact_protocol::ProtocolError),
}
