//! Coordinator for two-phase commit across the participant set
//!
//! A single, statically known instance drives every write: it broadcasts
//! prepare to all participants concurrently, waits (signaled, never
//! polled) for the full vote set, then broadcasts commit and waits for
//! the full ack set, each wait bounded by a deadline. The coordinator
//! composes a participant handle for its own replica share rather than
//! being one by inheritance.

mod coordinator;
mod error;
mod tracker;

pub use coordinator::{Coordinator, CoordinatorConfig};
pub use error::{CoordinatorError, Result};
pub use tracker::{ResponseTracker, TransactionPhase, WaitResult};
