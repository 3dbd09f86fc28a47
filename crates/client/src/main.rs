//! Interactive submitter for the pact key-value cluster
//!
//! Boots a cluster in-process, optionally pre-fills test data, then
//! loops reading commands of the form `<participant> PUT <key> <value>`,
//! `<participant> GET <key>`, `<participant> DELETE <key>`, until `EXIT`.

use clap::Parser;
use pact_client::{Command, Submitter, parse_command};
use pact_common::{Operation, ParticipantId};
use pact_rendezvous::Rendezvous;
use pact_runner::{Cluster, ClusterConfig};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Interactive submitter for a 2PC-replicated key-value cluster
#[derive(Parser, Debug)]
#[command(name = "pact")]
#[command(about = "Two-phase-commit replicated key-value store")]
struct Args {
    /// Number of replicas to run (minimum 5)
    #[arg(short, long, default_value_t = 5)]
    participants: usize,

    /// Per-phase protocol deadline in seconds
    #[arg(short, long, default_value_t = 60)]
    deadline: u64,

    /// Skip the scripted test-data pre-fill
    #[arg(long)]
    skip_prefill: bool,
}

const PREFILL: &[(&str, &str)] = &[
    ("APPLE", "$1"),
    ("ORANGE", "$2"),
    ("BANANA", "$5"),
    ("KIWI", "$9"),
    ("WATERMELON", "$3"),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();

    let rendezvous = Arc::new(Rendezvous::new());
    let config = ClusterConfig {
        participants: args.participants,
        deadline: Duration::from_secs(args.deadline),
    };
    let cluster = Cluster::start(Arc::clone(&rendezvous), config.clone()).await?;
    let submitter = Submitter::new(rendezvous, cluster.members().to_vec(), config.deadline);
    let known = submitter.participant_ids();

    if !args.skip_prefill {
        prefill(&submitter, known[0]).await;
    }

    println!(
        "\nThe cluster replicates a map of key-value pairs across {} participants.",
        known.len()
    );
    println!("Commands:");
    println!("    <participant> PUT <key> <value>");
    println!("    <participant> GET <key>");
    println!("    <participant> DELETE <key>");
    println!(
        "Participants: {}. Type EXIT to quit.\n",
        known
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    );

    let mut editor = DefaultEditor::new()?;
    loop {
        match editor.readline("pact> ") {
            Ok(line) => {
                let _ = editor.add_history_entry(&line);
                match parse_command(&line, &known) {
                    Ok(Command::Exit) => break,
                    Ok(Command::Submit {
                        participant,
                        operation,
                    }) => match submitter.submit(participant, operation).await {
                        Ok(outcome) => println!("response: {}", outcome),
                        Err(e) => println!("error: {}", e),
                    },
                    Err(e) => {
                        println!("{}", e);
                        println!("please check the format and enter a new command");
                    }
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}

/// Seed the store with the scripted test data through the first participant
async fn prefill(submitter: &Submitter, participant: ParticipantId) {
    info!("pre-filling test data");
    for (key, value) in PREFILL {
        let operation = Operation::Put {
            key: key.to_string(),
            value: value.to_string(),
        };
        match submitter.submit(participant, operation).await {
            Ok(outcome) => info!(key, %outcome, "prefill"),
            Err(e) => info!(key, error = %e, "prefill failed"),
        }
    }
}
