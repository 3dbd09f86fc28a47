//! Common types for the pact key-value cluster
//!
//! This crate defines:
//! - Request IDs (UUIDv7-based, generated by the submitter)
//! - Participant identities
//! - Key-value operations and their read/write classification
//! - Structured operation outcomes

mod operation;
mod outcome;
mod participant_id;
mod request_id;

pub use operation::Operation;
pub use operation::OperationType;
pub use outcome::Outcome;
pub use participant_id::ParticipantId;
pub use request_id::RequestId;
