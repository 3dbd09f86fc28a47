//! Per-transaction response tracking
//!
//! Bookkeeping of which participants have voted in which phase, indexed
//! primarily by request id with separate prepare and commit sets, owned
//! by the coordinator instance. Waiters block on a notify signal raised
//! by every vote/ack arrival and re-evaluate per signal, always bounded
//! by a deadline - no spin-polling.

use crate::error::{CoordinatorError, Result};
use pact_common::{Operation, ParticipantId, RequestId};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use tokio::sync::Notify;
use tokio::time::Instant;

/// Lifecycle of one tracked transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionPhase {
    Preparing,
    Prepared,
    Committing,
    Committed,
    Aborted,
}

impl TransactionPhase {
    /// Committed and Aborted accept no further transitions or votes
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Committed | Self::Aborted)
    }
}

/// What a bounded wait resolved to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitResult {
    /// Every participant responded for the phase
    Complete,
    /// At least one participant voted No
    Rejected,
    /// The deadline elapsed first
    TimedOut,
}

/// State of one transaction
#[derive(Debug)]
struct TransactionRecord {
    operation: Operation,
    phase: TransactionPhase,
    prepared: HashSet<ParticipantId>,
    committed: HashSet<ParticipantId>,
    rejected: bool,
}

/// Vote/ack bookkeeping, keyed by request id
pub struct ResponseTracker {
    records: Mutex<HashMap<RequestId, TransactionRecord>>,
    changed: Notify,
}

impl ResponseTracker {
    /// Create an empty tracker
    pub fn new() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            changed: Notify::new(),
        }
    }

    /// Start tracking a write; a request id seen before is a duplicate
    pub fn begin(&self, request_id: RequestId, operation: Operation) -> Result<()> {
        let mut records = self.records.lock();
        if records.contains_key(&request_id) {
            return Err(CoordinatorError::DuplicateRequest(request_id));
        }
        records.insert(
            request_id,
            TransactionRecord {
                operation,
                phase: TransactionPhase::Preparing,
                prepared: HashSet::new(),
                committed: HashSet::new(),
                rejected: false,
            },
        );
        Ok(())
    }

    /// Current phase of a tracked request
    pub fn phase(&self, request_id: RequestId) -> Option<TransactionPhase> {
        self.records.lock().get(&request_id).map(|r| r.phase)
    }

    /// The operation a tracked request carries
    pub fn operation(&self, request_id: RequestId) -> Option<Operation> {
        self.records
            .lock()
            .get(&request_id)
            .map(|r| r.operation.clone())
    }

    /// Record a prepare vote; idempotent, tolerant of late delivery
    pub fn record_prepared(&self, participant: ParticipantId, request_id: RequestId) {
        let mut records = self.records.lock();
        match records.get_mut(&request_id) {
            Some(record) if record.phase == TransactionPhase::Preparing => {
                record.prepared.insert(participant);
            }
            Some(record) => {
                tracing::warn!(
                    %participant,
                    %request_id,
                    phase = ?record.phase,
                    "ignoring late prepare vote"
                );
            }
            None => {
                tracing::warn!(%participant, %request_id, "prepare vote for unknown request");
            }
        }
        drop(records);
        self.changed.notify_waiters();
    }

    /// Record a commit ack; idempotent, tolerant of late delivery
    pub fn record_committed(&self, participant: ParticipantId, request_id: RequestId) {
        let mut records = self.records.lock();
        match records.get_mut(&request_id) {
            Some(record) if record.phase == TransactionPhase::Committing => {
                record.committed.insert(participant);
            }
            Some(record) => {
                tracing::warn!(
                    %participant,
                    %request_id,
                    phase = ?record.phase,
                    "ignoring late commit ack"
                );
            }
            None => {
                tracing::warn!(%participant, %request_id, "commit ack for unknown request");
            }
        }
        drop(records);
        self.changed.notify_waiters();
    }

    /// Record a No vote; the transaction must abort
    pub fn record_rejection(&self, request_id: RequestId) {
        let mut records = self.records.lock();
        if let Some(record) = records.get_mut(&request_id)
            && record.phase == TransactionPhase::Preparing
        {
            record.rejected = true;
        }
        drop(records);
        self.changed.notify_waiters();
    }

    /// Advance a request to a new phase
    pub fn set_phase(&self, request_id: RequestId, phase: TransactionPhase) -> Result<()> {
        let mut records = self.records.lock();
        let record = records
            .get_mut(&request_id)
            .ok_or(CoordinatorError::UnknownRequest(request_id))?;
        if record.phase.is_terminal() {
            return Err(CoordinatorError::InvalidState(format!(
                "request {} already terminal in {:?}",
                request_id, record.phase
            )));
        }
        record.phase = phase;
        drop(records);
        // Duplicate deliveries block on the terminal transition
        self.changed.notify_waiters();
        Ok(())
    }

    /// Block until a tracked request reaches a terminal phase or the
    /// deadline elapses; `None` for untracked requests and expiry
    pub async fn wait_terminal(
        &self,
        request_id: RequestId,
        deadline: Instant,
    ) -> Option<TransactionPhase> {
        loop {
            let notified = self.changed.notified();

            let phase = self.phase(request_id)?;
            if phase.is_terminal() {
                return Some(phase);
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                let phase = self.phase(request_id)?;
                return phase.is_terminal().then_some(phase);
            }
        }
    }

    /// Block until every participant has voted Yes, a rejection arrives,
    /// or the deadline elapses
    pub async fn wait_all_prepared(
        &self,
        request_id: RequestId,
        cluster_size: usize,
        deadline: Instant,
    ) -> WaitResult {
        self.wait_until(deadline, |records| {
            let record = records.get(&request_id)?;
            if record.rejected {
                Some(WaitResult::Rejected)
            } else if record.prepared.len() >= cluster_size {
                Some(WaitResult::Complete)
            } else {
                None
            }
        })
        .await
    }

    /// Block until every participant has acked commit or the deadline
    /// elapses
    pub async fn wait_all_committed(
        &self,
        request_id: RequestId,
        cluster_size: usize,
        deadline: Instant,
    ) -> WaitResult {
        self.wait_until(deadline, |records| {
            let record = records.get(&request_id)?;
            if record.committed.len() >= cluster_size {
                Some(WaitResult::Complete)
            } else {
                None
            }
        })
        .await
    }

    async fn wait_until<F>(&self, deadline: Instant, check: F) -> WaitResult
    where
        F: Fn(&HashMap<RequestId, TransactionRecord>) -> Option<WaitResult>,
    {
        loop {
            // Arm the signal before checking so an arrival between the
            // check and the await cannot be lost
            let notified = self.changed.notified();

            if let Some(result) = check(&self.records.lock()) {
                return result;
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                // Final re-check: the deciding vote may have landed as
                // the deadline fired
                if let Some(result) = check(&self.records.lock()) {
                    return result;
                }
                return WaitResult::TimedOut;
            }
        }
    }
}

impl Default for ResponseTracker {
    fn default() -> Self {
        Self::new()
    }
}
