//! Name registry and request routing
//!
//! The registry maps well-known names to request handlers. A handler is
//! the receiving half of an unbounded channel whose items pair the
//! request with a oneshot reply sender, so every call is strictly
//! request/reply.

use crate::{Message, RendezvousError, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

/// Type alias for request handler channels
type RequestHandler = mpsc::UnboundedSender<(Message, oneshot::Sender<Message>)>;

/// Receiving side handed to a registered process; its serve loop pulls
/// requests off this channel and replies through the paired sender
pub type RequestReceiver = mpsc::UnboundedReceiver<(Message, oneshot::Sender<Message>)>;

/// In-process rendezvous service
///
/// Stands in for an external name-to-address lookup service plus the
/// remote-call plumbing between processes.
pub struct Rendezvous {
    /// Request/reply handlers by well-known name
    handlers: Mutex<HashMap<String, RequestHandler>>,
}

impl Rendezvous {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            handlers: Mutex::new(HashMap::new()),
        }
    }

    /// Register a handler under a well-known name
    ///
    /// Returns the request receiver the owning process serves from.
    /// Names are exclusive; re-registering an active name is an error.
    pub fn register(&self, name: impl Into<String>) -> Result<RequestReceiver> {
        let name = name.into();
        let mut handlers = self.handlers.lock();
        if handlers.contains_key(&name) {
            return Err(RendezvousError::DuplicateName(name));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        handlers.insert(name.clone(), tx);
        tracing::debug!(name, "handler registered");
        Ok(rx)
    }

    /// Remove a name from the registry
    pub fn deregister(&self, name: &str) {
        if self.handlers.lock().remove(name).is_some() {
            tracing::debug!(name, "handler deregistered");
        }
    }

    /// Check whether a name currently resolves
    pub fn lookup(&self, name: &str) -> bool {
        self.handlers.lock().contains_key(name)
    }

    /// Send a request to a named handler and wait for its reply
    pub async fn request(&self, name: &str, message: Message, timeout: Duration) -> Result<Message> {
        let reply_rx = {
            let handlers = self.handlers.lock();
            let handler = handlers
                .get(name)
                .ok_or_else(|| RendezvousError::NoHandler(name.to_string()))?;

            let (reply_tx, reply_rx) = oneshot::channel();
            if handler.send((message, reply_tx)).is_err() {
                return Err(RendezvousError::ChannelClosed);
            }
            reply_rx
        };

        match tokio::time::timeout(timeout, reply_rx).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => Err(RendezvousError::ChannelClosed),
            Err(_) => Err(RendezvousError::Timeout),
        }
    }
}

impl Default for Rendezvous {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_request_reply() {
        let rendezvous = Arc::new(Rendezvous::new());
        let mut rx = rendezvous.register("echo").unwrap();

        tokio::spawn(async move {
            while let Some((request, reply_tx)) = rx.recv().await {
                let _ = reply_tx.send(request);
            }
        });

        let reply = rendezvous
            .request(
                "echo",
                Message::with_body(b"ping".to_vec()),
                Duration::from_secs(1),
            )
            .await
            .unwrap();
        assert_eq!(reply.body, b"ping");
    }

    #[tokio::test]
    async fn test_unknown_name() {
        let rendezvous = Rendezvous::new();
        let err = rendezvous
            .request(
                "nobody",
                Message::with_body(vec![]),
                Duration::from_millis(100),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RendezvousError::NoHandler(_)));
    }

    #[tokio::test]
    async fn test_duplicate_name_rejected() {
        let rendezvous = Rendezvous::new();
        let _rx = rendezvous.register("node-1").unwrap();
        assert!(matches!(
            rendezvous.register("node-1"),
            Err(RendezvousError::DuplicateName(_))
        ));
    }

    #[tokio::test]
    async fn test_silent_handler_times_out() {
        let rendezvous = Rendezvous::new();
        // Keep the receiver alive but never serve it
        let _rx = rendezvous.register("mute").unwrap();

        let err = rendezvous
            .request(
                "mute",
                Message::with_body(vec![]),
                Duration::from_millis(50),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RendezvousError::Timeout));
    }

    #[tokio::test]
    async fn test_deregister() {
        let rendezvous = Rendezvous::new();
        let _rx = rendezvous.register("node-2").unwrap();
        assert!(rendezvous.lookup("node-2"));

        rendezvous.deregister("node-2");
        assert!(!rendezvous.lookup("node-2"));
    }
}
