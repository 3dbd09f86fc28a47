//! Cluster assembly and the one-time peer-set broadcast

use crate::error::{Result, RunnerError};
use pact_common::ParticipantId;
use pact_coordinator::{Coordinator, CoordinatorConfig};
use pact_participant::{COORDINATOR_NAME, Participant, participant_name};
use pact_protocol::ParticipantRequest;
use pact_rendezvous::{NodeClient, Rendezvous};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Smallest participant set the protocol is run with
pub const MIN_PARTICIPANTS: usize = 5;

/// Cluster configuration
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    /// Total number of replicas, the coordinator's own included
    pub participants: usize,

    /// Per-phase protocol deadline; also the participants' lock window
    pub deadline: Duration,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            participants: MIN_PARTICIPANTS,
            deadline: Duration::from_secs(60),
        }
    }
}

/// A running cluster: one coordinator plus its participant set
pub struct Cluster {
    rendezvous: Arc<Rendezvous>,
    coordinator: Arc<Coordinator>,
    members: Vec<(ParticipantId, String)>,
    tasks: Vec<JoinHandle<()>>,
}

impl Cluster {
    /// Start a cluster on the given rendezvous
    ///
    /// Replica 0 is the coordinator's own share, served through the
    /// coordinator's well-known name; replicas 1..n serve under their
    /// participant names. Finishes with the one-time peer-set broadcast.
    pub async fn start(rendezvous: Arc<Rendezvous>, config: ClusterConfig) -> Result<Self> {
        if config.participants < MIN_PARTICIPANTS {
            return Err(RunnerError::ClusterTooSmall {
                min: MIN_PARTICIPANTS,
                got: config.participants,
            });
        }

        let mut members = vec![(ParticipantId(0), COORDINATOR_NAME.to_string())];
        for id in 1..config.participants as u32 {
            let id = ParticipantId(id);
            members.push((id, participant_name(id)));
        }

        let mut tasks = Vec::new();

        // Coordinator with its own replica share
        let replica = Arc::new(Participant::new(
            ParticipantId(0),
            NodeClient::new(COORDINATOR_NAME, Arc::clone(&rendezvous)),
            config.deadline,
        ));
        let coordinator = Arc::new(Coordinator::new(
            replica,
            members.clone(),
            NodeClient::new(COORDINATOR_NAME, Arc::clone(&rendezvous)),
            CoordinatorConfig {
                deadline: config.deadline,
            },
        ));
        let requests = rendezvous.register(COORDINATOR_NAME)?;
        tasks.push(tokio::spawn(Arc::clone(&coordinator).serve(requests)));

        // Remaining participants
        for (id, name) in members.iter().skip(1) {
            let participant = Arc::new(Participant::new(
                *id,
                NodeClient::new(name.clone(), Arc::clone(&rendezvous)),
                config.deadline,
            ));
            let requests = rendezvous.register(name.clone())?;
            tasks.push(tokio::spawn(participant.serve(requests)));
        }

        let cluster = Self {
            rendezvous,
            coordinator,
            members,
            tasks,
        };
        cluster.broadcast_peers().await?;

        tracing::info!(
            participants = cluster.members.len(),
            "cluster up, peer sets installed"
        );
        Ok(cluster)
    }

    /// One-time broadcast of each member's peer set; never repeated
    async fn broadcast_peers(&self) -> Result<()> {
        let client = NodeClient::new("runner", Arc::clone(&self.rendezvous));
        let all: HashSet<ParticipantId> = self.members.iter().map(|(id, _)| *id).collect();

        for (id, name) in &self.members {
            let mut peers = all.clone();
            peers.remove(id);
            let message = ParticipantRequest::SetPeers { peers }.encode()?;
            client
                .request(name, message, Duration::from_secs(5))
                .await?;
        }
        Ok(())
    }

    /// The coordinator instance
    pub fn coordinator(&self) -> &Arc<Coordinator> {
        &self.coordinator
    }

    /// The full participant set, ids paired with rendezvous names
    pub fn members(&self) -> &[(ParticipantId, String)] {
        &self.members
    }

    /// The shared rendezvous
    pub fn rendezvous(&self) -> &Arc<Rendezvous> {
        &self.rendezvous
    }

    /// Stop serve loops and release every registered name
    pub fn shutdown(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
        for (_, name) in &self.members {
            self.rendezvous.deregister(name);
        }
        tracing::info!("cluster shut down");
    }
}

impl Drop for Cluster {
    fn drop(&mut self) {
        self.shutdown();
    }
}
