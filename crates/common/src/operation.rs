//! Key-value operations
//!
//! GET is served locally by whichever participant receives it; PUT and
//! DELETE are routed through the coordinator and committed atomically
//! across every replica.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Type of operation - read or write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationType {
    /// Read operation - does not modify state
    Read,
    /// Write operation - modifies state
    Write,
}

/// A key-value operation submitted by a client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    /// Get a value by key
    Get { key: String },

    /// Put a key-value pair
    Put { key: String, value: String },

    /// Delete a key
    Delete { key: String },
}

impl Operation {
    /// Get the type of this operation (read or write)
    pub fn operation_type(&self) -> OperationType {
        match self {
            Operation::Get { .. } => OperationType::Read,
            Operation::Put { .. } => OperationType::Write,
            Operation::Delete { .. } => OperationType::Write,
        }
    }

    /// True if this operation mutates the store
    pub fn is_write(&self) -> bool {
        self.operation_type() == OperationType::Write
    }

    /// The key this operation touches
    pub fn key(&self) -> &str {
        match self {
            Operation::Get { key } => key,
            Operation::Put { key, .. } => key,
            Operation::Delete { key } => key,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Get { key } => write!(f, "GET {}", key),
            Operation::Put { key, value } => write!(f, "PUT {} {}", key, value),
            Operation::Delete { key } => write!(f, "DELETE {}", key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_classification() {
        let get = Operation::Get { key: "a".into() };
        let put = Operation::Put {
            key: "a".into(),
            value: "1".into(),
        };
        let delete = Operation::Delete { key: "a".into() };

        assert_eq!(get.operation_type(), OperationType::Read);
        assert_eq!(put.operation_type(), OperationType::Write);
        assert_eq!(delete.operation_type(), OperationType::Write);
        assert!(!get.is_write());
        assert!(put.is_write());
    }

    #[test]
    fn test_key_accessor() {
        let op = Operation::Put {
            key: "APPLE".into(),
            value: "$1".into(),
        };
        assert_eq!(op.key(), "APPLE");
    }
}
