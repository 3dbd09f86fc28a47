//! In-process rendezvous service and remote-call transport
//!
//! Every process in the cluster registers a handler under a well-known
//! name; callers resolve names and issue synchronous request/reply calls
//! bounded by a timeout. The wire encoding is deliberately opaque here -
//! messages carry raw bytes plus string headers, and the protocol crate
//! owns the typed view.

mod client;
mod message;
mod registry;

use thiserror::Error;

pub use client::NodeClient;
pub use message::Message;
pub use registry::{Rendezvous, RequestReceiver};

/// Transport errors
#[derive(Debug, Error)]
pub enum RendezvousError {
    #[error("No handler registered under name: {0}")]
    NoHandler(String),

    #[error("Name already registered: {0}")]
    DuplicateName(String),

    #[error("Handler channel closed")]
    ChannelClosed,

    #[error("Request timed out")]
    Timeout,
}

/// Result type for transport operations
pub type Result<T> = std::result::Result<T, RendezvousError>;
