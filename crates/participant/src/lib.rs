//! Participant: one replica of the key-value store
//!
//! A participant serves reads from its local store, forwards writes to
//! the coordinator, and exposes the prepare/commit entry points the
//! coordinator drives during two-phase commit. Between a Yes vote and
//! the matching commit it holds a provisional per-key lock so a second
//! transaction on the same key cannot interleave.

mod lock;
mod participant;
mod store;

pub use lock::{LockAttemptResult, LockManager};
pub use participant::{COORDINATOR_NAME, Participant, participant_name};
pub use store::Store;
