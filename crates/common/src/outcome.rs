//! Structured operation outcomes
//!
//! The submitter receives one of these per operation. Write outcomes
//! distinguish a clean commit, a clean abort (nothing applied anywhere),
//! and a commit-phase timeout where the cluster state is unknown - the
//! documented gap of running without a recovery log.

use crate::RequestId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The terminal result of one submitted operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    /// Read hit: the current value for the key
    Value { key: String, value: String },

    /// Read miss: the key is not currently in the store
    NotFound { key: String },

    /// Write applied on every participant
    Committed { request_id: RequestId },

    /// Write applied on no participant
    Aborted { request_id: RequestId, reason: String },

    /// Commit dispatched but not every participant acked within the
    /// deadline; some replicas may have applied the write
    TimedOutUnknown { request_id: RequestId },
}

impl Outcome {
    /// True for outcomes that report the write as fully applied
    pub fn is_committed(&self) -> bool {
        matches!(self, Outcome::Committed { .. })
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Value { key, value } => write!(f, "{} = {}", key, value),
            Outcome::NotFound { key } => write!(f, "{} is not currently in the store", key),
            Outcome::Committed { request_id } => {
                write!(f, "all participants committed request {}", request_id)
            }
            Outcome::Aborted { request_id, reason } => {
                write!(f, "request {} aborted: {}", request_id, reason)
            }
            Outcome::TimedOutUnknown { request_id } => write!(
                f,
                "request {} timed out during commit; cluster state unknown",
                request_id
            ),
        }
    }
}
