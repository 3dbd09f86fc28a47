//! Cluster bootstrap for the pact key-value cluster
//!
//! Registers the coordinator and every participant on a shared
//! rendezvous, spawns their serve loops, and performs the one-time
//! peer-set broadcast. Cluster size is fixed here at startup; minimum
//! five participants.

mod cluster;
mod error;

pub use cluster::{Cluster, ClusterConfig, MIN_PARTICIPANTS};
pub use error::{Result, RunnerError};
