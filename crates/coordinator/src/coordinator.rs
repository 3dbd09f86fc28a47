//! The 2PC driver
//!
//! One `execute` call runs a full transaction: broadcast prepare, wait
//! for the vote set, broadcast commit, wait for the ack set. Dispatch is
//! concurrent (one task per participant) so end-to-end latency is
//! bounded by the slowest participant rather than their sum. The serve
//! loop spawns a task per incoming message so vote callbacks land while
//! an execute is blocked waiting on them.

use crate::error::CoordinatorError;
use crate::tracker::{ResponseTracker, TransactionPhase, WaitResult};
use pact_common::{Operation, Outcome, ParticipantId, RequestId};
use pact_participant::Participant;
use pact_protocol::{
    CallbackAck, CommitAck, CoordinatorCallback, MSG_KIND_HEADER, ParticipantReply,
    ParticipantRequest, Vote,
};
use pact_rendezvous::{Message, NodeClient, RequestReceiver};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Coordinator configuration
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Bound on each protocol phase's wait for votes/acks
    pub deadline: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            deadline: Duration::from_secs(60),
        }
    }
}

/// Orchestrates two-phase commit across the fixed participant set
///
/// Holds a participant handle for its own replica share; the replica
/// receives prepare and commit through the same dispatch path as every
/// other participant.
pub struct Coordinator {
    /// The coordinator's own replica
    participant: Arc<Participant>,

    /// The full participant set (this replica included), fixed at startup
    members: Vec<(ParticipantId, String)>,

    /// Transport client for dispatching to participants
    client: NodeClient,

    /// Per-request vote/ack bookkeeping; shared with dispatch tasks
    tracker: Arc<ResponseTracker>,

    config: CoordinatorConfig,
}

impl Coordinator {
    /// Create a new coordinator
    pub fn new(
        participant: Arc<Participant>,
        members: Vec<(ParticipantId, String)>,
        client: NodeClient,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            participant,
            members,
            client,
            tracker: Arc::new(ResponseTracker::new()),
            config,
        }
    }

    /// The coordinator's own replica
    pub fn participant(&self) -> &Arc<Participant> {
        &self.participant
    }

    /// The fixed participant set
    pub fn members(&self) -> &[(ParticipantId, String)] {
        &self.members
    }

    /// Idempotently record a prepare vote
    pub fn notify_prepared(&self, participant: ParticipantId, request_id: RequestId) {
        self.tracker.record_prepared(participant, request_id);
    }

    /// Idempotently record a commit ack
    pub fn notify_committed(&self, participant: ParticipantId, request_id: RequestId) {
        self.tracker.record_committed(participant, request_id);
    }

    /// Run one operation through the protocol
    ///
    /// Reads are served from the local replica. For writes, every
    /// failure path resolves here into a single outcome; no fault
    /// crosses the call boundary raw.
    pub async fn execute(&self, request_id: RequestId, operation: Operation) -> Outcome {
        if !operation.is_write() {
            return self.participant.handle_request(request_id, operation).await;
        }

        if let Err(CoordinatorError::DuplicateRequest(_)) =
            self.tracker.begin(request_id, operation.clone())
        {
            return self.outcome_for_tracked(request_id).await;
        }

        tracing::info!(%request_id, %operation, "transaction started");

        // Phase one: prepare
        self.dispatch_to_all(request_id, &operation, Phase::Prepare);
        let deadline = Instant::now() + self.config.deadline;
        match self
            .tracker
            .wait_all_prepared(request_id, self.members.len(), deadline)
            .await
        {
            WaitResult::Complete => {
                self.advance(request_id, TransactionPhase::Prepared);
            }
            WaitResult::Rejected => {
                self.advance(request_id, TransactionPhase::Aborted);
                tracing::info!(%request_id, "aborted: a participant rejected prepare");
                return Outcome::Aborted {
                    request_id,
                    reason: "a participant rejected prepare".into(),
                };
            }
            WaitResult::TimedOut => {
                self.advance(request_id, TransactionPhase::Aborted);
                tracing::info!(%request_id, "aborted: prepare deadline elapsed");
                return Outcome::Aborted {
                    request_id,
                    reason: format!(
                        "not all participants prepared within {:?}",
                        self.config.deadline
                    ),
                };
            }
        }

        // Phase two: commit
        self.advance(request_id, TransactionPhase::Committing);
        self.dispatch_to_all(request_id, &operation, Phase::Commit);
        let deadline = Instant::now() + self.config.deadline;
        match self
            .tracker
            .wait_all_committed(request_id, self.members.len(), deadline)
            .await
        {
            WaitResult::Complete => {
                self.advance(request_id, TransactionPhase::Committed);
                tracing::info!(%request_id, "transaction committed");
                Outcome::Committed { request_id }
            }
            // No rejection path exists during commit; only expiry
            WaitResult::Rejected | WaitResult::TimedOut => {
                self.advance(request_id, TransactionPhase::Aborted);
                // Some replicas may have applied the write; without a
                // recovery log there is no way to resolve this here
                tracing::warn!(%request_id, "commit acks incomplete at deadline; cluster state unknown");
                Outcome::TimedOutUnknown { request_id }
            }
        }
    }

    /// Outcome for a request id that is already tracked (duplicate
    /// delivery); derived from the record instead of re-running 2PC.
    /// A duplicate racing the original rides out the original's
    /// terminal transition rather than guessing at it.
    async fn outcome_for_tracked(&self, request_id: RequestId) -> Outcome {
        // The original resolves within two phase deadlines
        let deadline = Instant::now() + self.config.deadline * 2;
        match self.tracker.wait_terminal(request_id, deadline).await {
            Some(TransactionPhase::Committed) => Outcome::Committed { request_id },
            Some(TransactionPhase::Aborted) => Outcome::Aborted {
                request_id,
                reason: "duplicate delivery of an aborted request".into(),
            },
            _ => Outcome::TimedOutUnknown { request_id },
        }
    }

    /// Broadcast one phase to every participant, each on its own task
    fn dispatch_to_all(&self, request_id: RequestId, operation: &Operation, phase: Phase) {
        for (participant_id, name) in &self.members {
            let request = match phase {
                Phase::Prepare => ParticipantRequest::Prepare {
                    request_id,
                    operation: operation.clone(),
                },
                Phase::Commit => ParticipantRequest::Commit {
                    request_id,
                    operation: operation.clone(),
                },
            };
            let message = match request.encode() {
                Ok(message) => message,
                Err(e) => {
                    tracing::warn!(%request_id, error = %e, "failed to encode dispatch");
                    self.tracker.record_rejection(request_id);
                    continue;
                }
            };

            let participant_id = *participant_id;
            let name = name.clone();
            let client = self.client.clone();
            let timeout = self.config.deadline;
            // A No vote or an unreachable participant rejects the
            // prepare phase immediately; commit-phase failures are left
            // to the ack deadline
            let tracker = Arc::clone(&self.tracker);
            tokio::spawn(async move {
                let reply = client.request(&name, message, timeout).await;
                match phase {
                    Phase::Prepare => match reply.map(|m| ParticipantReply::expect_vote(&m)) {
                        Ok(Ok(Vote::Yes)) => {
                            // Counted when the participant's
                            // notify_prepared callback lands
                        }
                        Ok(Ok(Vote::No)) => {
                            tracing::debug!(%participant_id, %request_id, "no vote");
                            tracker.record_rejection(request_id);
                        }
                        Ok(Err(e)) => {
                            tracing::warn!(%participant_id, %request_id, error = %e, "bad prepare reply");
                            tracker.record_rejection(request_id);
                        }
                        Err(e) => {
                            tracing::warn!(%participant_id, %request_id, error = %e, "prepare dispatch failed");
                            tracker.record_rejection(request_id);
                        }
                    },
                    Phase::Commit => match reply.map(|m| ParticipantReply::expect_ack(&m)) {
                        Ok(Ok(CommitAck::Applied)) => {}
                        Ok(Ok(CommitAck::NoMatchingPrepare)) => {
                            tracing::warn!(%participant_id, %request_id, "commit nacked: no matching prepare");
                        }
                        Ok(Err(e)) => {
                            tracing::warn!(%participant_id, %request_id, error = %e, "bad commit reply");
                        }
                        Err(e) => {
                            tracing::warn!(%participant_id, %request_id, error = %e, "commit dispatch failed");
                        }
                    },
                }
            });
        }
    }

    fn advance(&self, request_id: RequestId, phase: TransactionPhase) {
        if let Err(e) = self.tracker.set_phase(request_id, phase) {
            tracing::warn!(%request_id, ?phase, error = %e, "phase transition refused");
        }
    }

    /// Serve the coordinator surface: the full participant surface via
    /// the composed replica, plus `execute` and the vote callbacks
    pub async fn serve(self: Arc<Self>, mut requests: RequestReceiver) {
        while let Some((message, reply_tx)) = requests.recv().await {
            let coordinator = Arc::clone(&self);
            tokio::spawn(async move {
                match coordinator.dispatch_message(&message).await {
                    Ok(reply) => {
                        let _ = reply_tx.send(reply);
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "dropping undecodable request");
                    }
                }
            });
        }
        tracing::debug!("coordinator serve loop ended");
    }

    async fn dispatch_message(&self, message: &Message) -> pact_protocol::Result<Message> {
        match message.get_header(MSG_KIND_HEADER) {
            Some("notify_prepared") | Some("notify_committed") => {
                match CoordinatorCallback::decode(message)? {
                    CoordinatorCallback::NotifyPrepared {
                        participant,
                        request_id,
                    } => self.notify_prepared(participant, request_id),
                    CoordinatorCallback::NotifyCommitted {
                        participant,
                        request_id,
                    } => self.notify_committed(participant, request_id),
                }
                CallbackAck.encode()
            }
            _ => {
                let reply = match ParticipantRequest::decode(message)? {
                    ParticipantRequest::SayHello => {
                        ParticipantReply::Greeting(self.participant.say_hello())
                    }
                    ParticipantRequest::GetIdentity => {
                        ParticipantReply::Identity(self.participant.id())
                    }
                    ParticipantRequest::SetPeers { peers } => {
                        self.participant.set_peers(peers);
                        ParticipantReply::PeersInstalled
                    }
                    ParticipantRequest::HandleRequest {
                        request_id,
                        operation,
                    } => ParticipantReply::Outcome(self.execute(request_id, operation).await),
                    ParticipantRequest::Prepare {
                        request_id,
                        operation,
                    } => {
                        ParticipantReply::Vote(self.participant.prepare(request_id, operation).await)
                    }
                    ParticipantRequest::Commit {
                        request_id,
                        operation,
                    } => {
                        ParticipantReply::Ack(self.participant.commit(request_id, operation).await)
                    }
                };
                reply.encode()
            }
        }
    }
}

/// Which half of the protocol a dispatch belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Prepare,
    Commit,
}
