//! The end-to-end scenario: five participants, one submitter

use pact_client::Submitter;
use pact_common::{Operation, Outcome};
use pact_rendezvous::Rendezvous;
use pact_runner::{Cluster, ClusterConfig};
use std::sync::Arc;
use std::time::Duration;

fn put(key: &str, value: &str) -> Operation {
    Operation::Put {
        key: key.into(),
        value: value.into(),
    }
}

#[tokio::test]
async fn test_put_get_delete_scenario() {
    let rendezvous = Arc::new(Rendezvous::new());
    let config = ClusterConfig {
        participants: 5,
        deadline: Duration::from_secs(10),
    };
    let cluster = Cluster::start(Arc::clone(&rendezvous), config.clone())
        .await
        .unwrap();
    let submitter = Submitter::new(rendezvous, cluster.members().to_vec(), config.deadline);
    let ids = submitter.participant_ids();

    // PUT through one participant commits everywhere
    let outcome = submitter.submit(ids[1], put("APPLE", "$1")).await.unwrap();
    assert!(outcome.is_committed(), "unexpected outcome: {outcome}");

    // GET on any participant sees the value
    for id in &ids {
        let outcome = submitter
            .submit(*id, Operation::Get { key: "APPLE".into() })
            .await
            .unwrap();
        assert_eq!(
            outcome,
            Outcome::Value {
                key: "APPLE".into(),
                value: "$1".into()
            }
        );
    }

    // DELETE commits everywhere
    let outcome = submitter
        .submit(ids[3], Operation::Delete { key: "APPLE".into() })
        .await
        .unwrap();
    assert!(outcome.is_committed(), "unexpected outcome: {outcome}");

    // GET on every participant reports not-found
    for id in &ids {
        let outcome = submitter
            .submit(*id, Operation::Get { key: "APPLE".into() })
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::NotFound { key: "APPLE".into() });
    }
}

#[tokio::test]
async fn test_unknown_participant_rejected_before_any_call() {
    let rendezvous = Arc::new(Rendezvous::new());
    let config = ClusterConfig {
        participants: 5,
        deadline: Duration::from_secs(10),
    };
    let cluster = Cluster::start(Arc::clone(&rendezvous), config.clone())
        .await
        .unwrap();
    let submitter = Submitter::new(rendezvous, cluster.members().to_vec(), config.deadline);

    let result = submitter
        .submit(pact_common::ParticipantId(42), put("APPLE", "$1"))
        .await;
    assert!(matches!(
        result,
        Err(pact_client::SubmitError::UnknownParticipant(_))
    ));
}
