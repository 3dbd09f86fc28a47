//! Client handle used by one process to call others through the registry

use crate::{Message, Rendezvous, Result};
use std::sync::Arc;
use std::time::Duration;

/// Per-process client for the rendezvous transport
#[derive(Clone)]
pub struct NodeClient {
    /// Name of the owning process, attached to outgoing requests
    node_name: String,

    /// Shared registry
    rendezvous: Arc<Rendezvous>,
}

impl NodeClient {
    /// Create a new client for a named process
    pub fn new(node_name: impl Into<String>, rendezvous: Arc<Rendezvous>) -> Self {
        Self {
            node_name: node_name.into(),
            rendezvous,
        }
    }

    /// The name of the process this client belongs to
    pub fn node_name(&self) -> &str {
        &self.node_name
    }

    /// Send a request to a named handler and wait for its reply
    pub async fn request(
        &self,
        name: &str,
        message: impl Into<Message>,
        timeout: Duration,
    ) -> Result<Message> {
        let message = message.into().with_header("sender", self.node_name.clone());
        self.rendezvous.request(name, message, timeout).await
    }

    /// Check whether a name currently resolves to a live handler
    pub async fn has_responder(&self, name: &str) -> bool {
        self.rendezvous.lookup(name)
    }
}
