//! Operation submitter
//!
//! Generates a fresh request id per write and issues exactly one
//! `handle_request` call to the chosen participant. Input validation
//! happens here, before any remote call.

use pact_common::{Operation, Outcome, ParticipantId, RequestId};
use pact_protocol::{ParticipantReply, ParticipantRequest};
use pact_rendezvous::{NodeClient, Rendezvous};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Submitter errors
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("Unknown participant: {0}")]
    UnknownParticipant(ParticipantId),

    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error("Transport error: {0}")]
    Transport(#[from] pact_rendezvous::RendezvousError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] pact_protocol::ProtocolError),
}

/// Result type for submitter operations
pub type Result<T> = std::result::Result<T, SubmitError>;

/// A parsed submitter command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// End the interactive loop
    Exit,
    /// Issue one operation to one participant
    Submit {
        participant: ParticipantId,
        operation: Operation,
    },
}

/// Parse one line of submitter input
///
/// Accepted forms: `<participant> PUT <key> <value>`,
/// `<participant> GET <key>`, `<participant> DELETE <key>`, `EXIT`.
/// Operation words are case-insensitive. Malformed input is rejected
/// before any remote call is made.
pub fn parse_command(line: &str, known: &[ParticipantId]) -> Result<Command> {
    let tokens: Vec<&str> = line.split_whitespace().collect();

    match tokens.as_slice() {
        [] => Err(SubmitError::InvalidCommand("empty input".into())),
        [word] if word.eq_ignore_ascii_case("exit") => Ok(Command::Exit),
        [participant, rest @ ..] => {
            let participant = participant
                .parse::<u32>()
                .map(ParticipantId)
                .map_err(|_| {
                    SubmitError::InvalidCommand(format!("not a participant id: {}", participant))
                })?;
            if !known.contains(&participant) {
                return Err(SubmitError::UnknownParticipant(participant));
            }

            let operation = match rest {
                [op, key] if op.eq_ignore_ascii_case("get") => Operation::Get {
                    key: key.to_string(),
                },
                [op, key] if op.eq_ignore_ascii_case("delete") => Operation::Delete {
                    key: key.to_string(),
                },
                [op, key, value] if op.eq_ignore_ascii_case("put") => Operation::Put {
                    key: key.to_string(),
                    value: value.to_string(),
                },
                _ => {
                    return Err(SubmitError::InvalidCommand(
                        "expected PUT <key> <value>, GET <key>, or DELETE <key>".into(),
                    ));
                }
            };
            Ok(Command::Submit {
                participant,
                operation,
            })
        }
    }
}

/// Issues operations to cluster participants
pub struct Submitter {
    client: NodeClient,
    members: Vec<(ParticipantId, String)>,
    timeout: Duration,
}

impl Submitter {
    /// Create a submitter for a cluster's participant set
    ///
    /// `deadline` is the cluster's per-phase protocol deadline; the
    /// submitter waits out both phases plus slack before giving up.
    pub fn new(
        rendezvous: Arc<Rendezvous>,
        members: Vec<(ParticipantId, String)>,
        deadline: Duration,
    ) -> Self {
        Self {
            client: NodeClient::new("submitter", rendezvous),
            members,
            timeout: deadline * 2 + Duration::from_secs(10),
        }
    }

    /// The participant ids this submitter can target
    pub fn participant_ids(&self) -> Vec<ParticipantId> {
        self.members.iter().map(|(id, _)| *id).collect()
    }

    /// Issue one operation to one participant and await its outcome
    pub async fn submit(
        &self,
        participant: ParticipantId,
        operation: Operation,
    ) -> Result<Outcome> {
        let name = self
            .members
            .iter()
            .find(|(id, _)| *id == participant)
            .map(|(_, name)| name.clone())
            .ok_or(SubmitError::UnknownParticipant(participant))?;

        let request_id = RequestId::new();
        tracing::debug!(%participant, %request_id, %operation, "submitting");

        let message = ParticipantRequest::HandleRequest {
            request_id,
            operation,
        }
        .encode()?;
        let reply = self.client.request(&name, message, self.timeout).await?;
        Ok(ParticipantReply::expect_outcome(&reply)?)
    }
}
