//! Request identifier using UUIDv7
//!
//! Each client operation carries one globally unique request id that
//! correlates the operation with every protocol message it produces.
//! Uniqueness is what lets duplicate delivery be detected; the v7
//! layout keeps ids time-ordered at millisecond precision.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for one submitted operation
///
/// Generated by the submitter, one per operation; travels on the wire
/// in serde form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Generate a fresh request id
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniqueness() {
        let a = RequestId::new();
        let b = RequestId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn test_time_ordering() {
        let earlier = RequestId::new();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let later = RequestId::new();
        assert!(earlier < later);
    }
}
