//! The participant state machine
//!
//! Serves the full participant surface from a rendezvous request loop.
//! Each incoming request is handled on its own task so a participant
//! blocked forwarding a write can still answer the coordinator's
//! prepare for that same write.

use crate::lock::{LockAttemptResult, LockManager};
use crate::store::Store;
use pact_common::{Operation, Outcome, ParticipantId, RequestId};
use pact_protocol::{
    CallbackAck, CommitAck, CoordinatorCallback, ParticipantReply, ParticipantRequest, Vote,
};
use pact_rendezvous::{Message, NodeClient, RequestReceiver};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

/// Well-known rendezvous name of the coordinator
pub const COORDINATOR_NAME: &str = "coordinator";

/// Well-known rendezvous name for a participant id
pub fn participant_name(id: ParticipantId) -> String {
    format!("participant-{}", id)
}

/// Timeout for vote/ack callbacks to the coordinator
const CALLBACK_TIMEOUT: Duration = Duration::from_secs(5);

/// One replica of the store plus its 2PC state
pub struct Participant {
    /// Stable identity, fixed at construction
    id: ParticipantId,

    /// Transport client for coordinator calls
    client: NodeClient,

    /// The replica's key-value map
    store: Store,

    /// Provisional per-key locks held between Yes vote and commit
    locks: Mutex<LockManager>,

    /// Promises made in prepare, awaiting commit
    pending: Mutex<HashMap<RequestId, Operation>>,

    /// Requests whose commit has already been applied
    applied: Mutex<HashSet<RequestId>>,

    /// Peer set, installed once at bootstrap
    peers: Mutex<Option<HashSet<ParticipantId>>>,

    /// Provisional lock lifetime; matches the coordinator's protocol window
    lock_ttl: Duration,
}

impl Participant {
    /// Create a new participant
    ///
    /// `lock_ttl` should equal the coordinator's per-phase deadline: a
    /// lock whose transaction the coordinator abandoned stops blocking
    /// new transactions once that window passes.
    pub fn new(id: ParticipantId, client: NodeClient, lock_ttl: Duration) -> Self {
        Self {
            id,
            client,
            store: Store::new(),
            locks: Mutex::new(LockManager::new()),
            pending: Mutex::new(HashMap::new()),
            applied: Mutex::new(HashSet::new()),
            peers: Mutex::new(None),
            lock_ttl,
        }
    }

    /// Stable identity of this participant
    pub fn id(&self) -> ParticipantId {
        self.id
    }

    /// Direct read access to the replica's store
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Liveness probe
    pub fn say_hello(&self) -> String {
        format!("Participant {} says hello!", self.id)
    }

    /// One-time installation of the peer set; repeats are ignored
    pub fn set_peers(&self, peers: HashSet<ParticipantId>) {
        let mut slot = self.peers.lock();
        if slot.is_some() {
            tracing::warn!(id = %self.id, "ignoring repeated peer-set broadcast");
            return;
        }
        tracing::debug!(id = %self.id, peers = peers.len(), "peer set installed");
        *slot = Some(peers);
    }

    /// The installed peer set, empty before bootstrap completes
    pub fn peers(&self) -> HashSet<ParticipantId> {
        self.peers.lock().clone().unwrap_or_default()
    }

    /// Handle a client operation
    ///
    /// Reads are served from the local store and never touch the
    /// protocol; writes are forwarded verbatim to the coordinator.
    pub async fn handle_request(&self, request_id: RequestId, operation: Operation) -> Outcome {
        match &operation {
            Operation::Get { key } => match self.store.get(key) {
                Some(value) => Outcome::Value {
                    key: key.clone(),
                    value,
                },
                None => Outcome::NotFound { key: key.clone() },
            },
            _ => self.forward_write(request_id, operation).await,
        }
    }

    async fn forward_write(&self, request_id: RequestId, operation: Operation) -> Outcome {
        let request = ParticipantRequest::HandleRequest {
            request_id,
            operation,
        };
        let message = match request.encode() {
            Ok(message) => message,
            Err(e) => {
                return Outcome::Aborted {
                    request_id,
                    reason: format!("failed to encode request: {}", e),
                };
            }
        };

        // Both protocol phases are bounded by the coordinator's window
        let timeout = self.lock_ttl * 2 + Duration::from_secs(5);
        match self.client.request(COORDINATOR_NAME, message, timeout).await {
            Ok(reply) => match ParticipantReply::expect_outcome(&reply) {
                Ok(outcome) => outcome,
                Err(e) => Outcome::Aborted {
                    request_id,
                    reason: format!("malformed coordinator reply: {}", e),
                },
            },
            Err(e) => Outcome::Aborted {
                request_id,
                reason: format!("coordinator unreachable: {}", e),
            },
        }
    }

    /// Phase one: validate, take the key's provisional lock, vote
    ///
    /// A Yes vote is reported to the coordinator through
    /// `notify_prepared` before the reply goes out; if that report
    /// cannot be delivered the vote is withdrawn and the lock released,
    /// so no lock outlives a vote the coordinator never saw.
    pub async fn prepare(&self, request_id: RequestId, operation: Operation) -> Vote {
        if !operation.is_write() {
            tracing::warn!(id = %self.id, %request_id, "prepare for a read operation");
            return Vote::No;
        }

        let key = operation.key().to_string();
        let attempt = self
            .locks
            .lock()
            .try_acquire(request_id, &key, self.lock_ttl);
        match attempt {
            LockAttemptResult::Conflict { holder } => {
                tracing::debug!(
                    id = %self.id,
                    %request_id,
                    key,
                    %holder,
                    "prepare rejected: key locked by another transaction"
                );
                return Vote::No;
            }
            LockAttemptResult::Granted {
                evicted: Some(stale),
            } => {
                // The promise made under the expired lock is void; a late
                // commit for it must nack, not apply
                self.pending.lock().remove(&stale);
            }
            LockAttemptResult::Granted { evicted: None } => {}
        }

        self.pending.lock().insert(request_id, operation);

        let callback = CoordinatorCallback::NotifyPrepared {
            participant: self.id,
            request_id,
        };
        if self.notify(callback).await.is_err() {
            tracing::warn!(id = %self.id, %request_id, "withdrawing vote: coordinator unreachable");
            self.pending.lock().remove(&request_id);
            self.locks.lock().release(request_id, &key);
            return Vote::No;
        }

        tracing::debug!(id = %self.id, %request_id, key, "voted yes");
        Vote::Yes
    }

    /// Phase two: apply the promised operation and release the lock
    ///
    /// Idempotent: redelivery of an applied request re-acks without
    /// touching the store. A commit with no matching prepare is an
    /// anomaly and nacks.
    pub async fn commit(&self, request_id: RequestId, operation: Operation) -> CommitAck {
        if self.applied.lock().contains(&request_id) {
            tracing::debug!(id = %self.id, %request_id, "commit redelivery, already applied");
            let _ = self
                .notify(CoordinatorCallback::NotifyCommitted {
                    participant: self.id,
                    request_id,
                })
                .await;
            return CommitAck::Applied;
        }

        let promised = self.pending.lock().remove(&request_id);
        let Some(promised) = promised else {
            tracing::warn!(id = %self.id, %request_id, "commit without a matching prepare");
            return CommitAck::NoMatchingPrepare;
        };
        if promised != operation {
            tracing::warn!(id = %self.id, %request_id, "commit operation differs from prepared one");
        }

        match &promised {
            Operation::Put { key, value } => {
                self.store.put(key.clone(), value.clone());
            }
            Operation::Delete { key } => {
                self.store.delete(key);
            }
            Operation::Get { .. } => unreachable!("reads never enter prepare"),
        }

        self.locks.lock().release(request_id, promised.key());
        self.applied.lock().insert(request_id);
        tracing::debug!(id = %self.id, %request_id, key = promised.key(), "commit applied");

        // The write is durable locally either way; a failed report just
        // means the coordinator times out and says so
        let _ = self
            .notify(CoordinatorCallback::NotifyCommitted {
                participant: self.id,
                request_id,
            })
            .await;

        CommitAck::Applied
    }

    async fn notify(&self, callback: CoordinatorCallback) -> Result<(), ()> {
        let message = callback.encode().map_err(|_| ())?;
        let reply = self
            .client
            .request(COORDINATOR_NAME, message, CALLBACK_TIMEOUT)
            .await
            .map_err(|_| ())?;
        CallbackAck::decode(&reply).map(|_| ()).map_err(|_| ())
    }

    /// Serve the participant surface from a rendezvous request loop
    ///
    /// Each request runs on its own task; a participant awaiting the
    /// coordinator's outcome must still answer prepare and commit.
    pub async fn serve(self: Arc<Self>, mut requests: RequestReceiver) {
        while let Some((message, reply_tx)) = requests.recv().await {
            let participant = Arc::clone(&self);
            tokio::spawn(async move {
                match participant.dispatch(&message).await {
                    Ok(reply) => match reply.encode() {
                        Ok(encoded) => {
                            let _ = reply_tx.send(encoded);
                        }
                        Err(e) => {
                            tracing::warn!(id = %participant.id, error = %e, "failed to encode reply")
                        }
                    },
                    Err(e) => {
                        tracing::warn!(id = %participant.id, error = %e, "dropping undecodable request")
                    }
                }
            });
        }
        tracing::debug!(id = %self.id, "serve loop ended");
    }

    async fn dispatch(&self, message: &Message) -> pact_protocol::Result<ParticipantReply> {
        let request = ParticipantRequest::decode(message)?;
        Ok(match request {
            ParticipantRequest::SayHello => ParticipantReply::Greeting(self.say_hello()),
            ParticipantRequest::GetIdentity => ParticipantReply::Identity(self.id),
            ParticipantRequest::SetPeers { peers } => {
                self.set_peers(peers);
                ParticipantReply::PeersInstalled
            }
            ParticipantRequest::HandleRequest {
                request_id,
                operation,
            } => ParticipantReply::Outcome(self.handle_request(request_id, operation).await),
            ParticipantRequest::Prepare {
                request_id,
                operation,
            } => ParticipantReply::Vote(self.prepare(request_id, operation).await),
            ParticipantRequest::Commit {
                request_id,
                operation,
            } => ParticipantReply::Ack(self.commit(request_id, operation).await),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pact_rendezvous::Rendezvous;

    const TTL: Duration = Duration::from_secs(60);

    fn put(key: &str, value: &str) -> Operation {
        Operation::Put {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Coordinator stand-in that acks every callback
    fn spawn_stub_coordinator(rendezvous: &Arc<Rendezvous>) {
        let mut rx = rendezvous.register(COORDINATOR_NAME).unwrap();
        tokio::spawn(async move {
            while let Some((_message, reply_tx)) = rx.recv().await {
                let _ = reply_tx.send(CallbackAck.encode().unwrap());
            }
        });
    }

    fn test_participant(rendezvous: &Arc<Rendezvous>, id: u32) -> Participant {
        let client = NodeClient::new(participant_name(ParticipantId(id)), Arc::clone(rendezvous));
        Participant::new(ParticipantId(id), client, TTL)
    }

    #[tokio::test]
    async fn test_get_is_local() {
        let rendezvous = Arc::new(Rendezvous::new());
        // No coordinator registered: reads must not need one
        let participant = test_participant(&rendezvous, 1);
        participant.store().put("APPLE".into(), "$1".into());

        let outcome = participant
            .handle_request(RequestId::new(), Operation::Get { key: "APPLE".into() })
            .await;
        assert_eq!(
            outcome,
            Outcome::Value {
                key: "APPLE".into(),
                value: "$1".into()
            }
        );

        let outcome = participant
            .handle_request(RequestId::new(), Operation::Get { key: "PEAR".into() })
            .await;
        assert_eq!(outcome, Outcome::NotFound { key: "PEAR".into() });
    }

    #[tokio::test]
    async fn test_prepare_then_commit_applies() {
        let rendezvous = Arc::new(Rendezvous::new());
        spawn_stub_coordinator(&rendezvous);
        let participant = test_participant(&rendezvous, 1);

        let request_id = RequestId::new();
        let op = put("APPLE", "$1");

        assert_eq!(participant.prepare(request_id, op.clone()).await, Vote::Yes);
        assert!(participant.locks.lock().is_held_by("APPLE", request_id));

        assert_eq!(participant.commit(request_id, op).await, CommitAck::Applied);
        assert_eq!(participant.store().get("APPLE"), Some("$1".into()));
        assert!(participant.locks.lock().is_empty());
    }

    #[tokio::test]
    async fn test_commit_redelivery_is_idempotent() {
        let rendezvous = Arc::new(Rendezvous::new());
        spawn_stub_coordinator(&rendezvous);
        let participant = test_participant(&rendezvous, 1);

        let request_id = RequestId::new();
        let op = put("APPLE", "$1");
        participant.prepare(request_id, op.clone()).await;
        assert_eq!(
            participant.commit(request_id, op.clone()).await,
            CommitAck::Applied
        );
        assert_eq!(participant.commit(request_id, op).await, CommitAck::Applied);
        assert_eq!(participant.store().get("APPLE"), Some("$1".into()));
    }

    #[tokio::test]
    async fn test_commit_without_prepare_nacks() {
        let rendezvous = Arc::new(Rendezvous::new());
        spawn_stub_coordinator(&rendezvous);
        let participant = test_participant(&rendezvous, 1);

        let ack = participant.commit(RequestId::new(), put("APPLE", "$1")).await;
        assert_eq!(ack, CommitAck::NoMatchingPrepare);
        assert_eq!(participant.store().get("APPLE"), None);
    }

    #[tokio::test]
    async fn test_prepare_conflict_votes_no() {
        let rendezvous = Arc::new(Rendezvous::new());
        spawn_stub_coordinator(&rendezvous);
        let participant = test_participant(&rendezvous, 1);

        let first = RequestId::new();
        let second = RequestId::new();
        assert_eq!(
            participant.prepare(first, put("APPLE", "$1")).await,
            Vote::Yes
        );
        assert_eq!(
            participant.prepare(second, put("APPLE", "$2")).await,
            Vote::No
        );
        // A different key is unaffected
        assert_eq!(
            participant.prepare(second, put("ORANGE", "$2")).await,
            Vote::Yes
        );
    }

    #[tokio::test]
    async fn test_prepare_for_read_votes_no() {
        let rendezvous = Arc::new(Rendezvous::new());
        spawn_stub_coordinator(&rendezvous);
        let participant = test_participant(&rendezvous, 1);

        let vote = participant
            .prepare(RequestId::new(), Operation::Get { key: "APPLE".into() })
            .await;
        assert_eq!(vote, Vote::No);
    }

    #[tokio::test]
    async fn test_abandoned_prepare_state_cleared_on_lock_expiry() {
        let rendezvous = Arc::new(Rendezvous::new());
        spawn_stub_coordinator(&rendezvous);
        let client = NodeClient::new(participant_name(ParticipantId(1)), Arc::clone(&rendezvous));
        let participant = Participant::new(ParticipantId(1), client, Duration::from_millis(10));

        // Prepared, then abandoned: no commit ever arrives
        let abandoned = RequestId::new();
        assert_eq!(
            participant.prepare(abandoned, put("APPLE", "$1")).await,
            Vote::Yes
        );
        tokio::time::sleep(Duration::from_millis(20)).await;

        // A new transaction on the same key takes over the expired lock
        // and voids the abandoned promise
        let fresh = RequestId::new();
        assert_eq!(
            participant.prepare(fresh, put("APPLE", "$2")).await,
            Vote::Yes
        );
        assert!(!participant.pending.lock().contains_key(&abandoned));
        assert!(participant.pending.lock().contains_key(&fresh));

        // A late commit for the abandoned transaction nacks cleanly
        let ack = participant.commit(abandoned, put("APPLE", "$1")).await;
        assert_eq!(ack, CommitAck::NoMatchingPrepare);
        assert_eq!(participant.store().get("APPLE"), None);
    }

    #[tokio::test]
    async fn test_unreachable_coordinator_withdraws_vote() {
        let rendezvous = Arc::new(Rendezvous::new());
        // No coordinator registered at all
        let participant = test_participant(&rendezvous, 1);

        let request_id = RequestId::new();
        let vote = participant.prepare(request_id, put("APPLE", "$1")).await;
        assert_eq!(vote, Vote::No);
        assert!(participant.locks.lock().is_empty());
        assert!(participant.pending.lock().is_empty());
    }

    #[tokio::test]
    async fn test_forward_without_coordinator_fails_cleanly() {
        let rendezvous = Arc::new(Rendezvous::new());
        let participant = test_participant(&rendezvous, 1);

        let request_id = RequestId::new();
        let outcome = participant.handle_request(request_id, put("APPLE", "$1")).await;
        assert!(matches!(outcome, Outcome::Aborted { request_id: id, .. } if id == request_id));
    }
}
