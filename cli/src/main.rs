//! CLI entrypoint for Concord
//!
//! Wires the layers together with dependency injection and runs a
//! self-contained consensus round: simulated agents receive the proposal
//! over the loopback transport, vote with per-agent leanings, and the
//! engine resolves, executes, and reports.

use anyhow::{Result, bail};
use clap::Parser;
use concord_application::{Ballot, ConsensusEngine, EngineConfig, ProposalSpec};
use concord_domain::{
    AgentId, ProposalId, ProposalKind, ProposalPayload, ProposalStatus, VoteDecision,
};
use concord_infrastructure::{
    ConfigLoader, GenericActionExecutor, HmacSigner, JsonlEventSink, LoopbackBroadcaster,
    MemoryUpdateExecutor, PolicyUpdateExecutor,
};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "concord", version, about = "Multi-agent consensus engine")]
struct Cli {
    /// Number of simulated voter agents
    #[arg(long, default_value_t = 5)]
    agents: usize,

    /// Proposal kind (memory_update, policy_change, agent_action, ...)
    #[arg(long, default_value = "memory_update")]
    kind: ProposalKind,

    /// Proposal title
    #[arg(long, default_value = "Adopt the proposed change")]
    title: String,

    /// Protocol override; defaults to automatic selection
    #[arg(long)]
    protocol: Option<String>,

    /// Voting window in seconds; defaults to the protocol's window
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Path to a configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Skip configuration file discovery
    #[arg(long)]
    no_config: bool,

    /// Verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress the banner and summary output
    #[arg(short, long)]
    quiet: bool,
}

fn payload_for(kind: ProposalKind) -> ProposalPayload {
    match kind {
        ProposalKind::MemoryUpdate => ProposalPayload::MemoryUpdate {
            key: "shared/objective".to_string(),
            value: json!({ "focus": "latency" }),
        },
        ProposalKind::PolicyChange => ProposalPayload::PolicyChange {
            policy: "rate-limits".to_string(),
            changes: json!({ "max_rps": 50 }),
        },
        ProposalKind::AgentAction => ProposalPayload::AgentAction {
            action: "restart".to_string(),
            params: json!({ "component": "planner" }),
        },
        ProposalKind::ResourceAllocation => ProposalPayload::ResourceAllocation {
            resource: "gpu-hours".to_string(),
            amount: 12.0,
            recipient: AgentId::new("sim-0"),
        },
        ProposalKind::ConflictResolution => ProposalPayload::ConflictResolution {
            subject: "overlapping-claims".to_string(),
            resolution: json!({ "winner": "sim-0" }),
        },
        ProposalKind::Configuration => ProposalPayload::Configuration {
            section: "scheduler".to_string(),
            settings: json!({ "interval_secs": 30 }),
        },
        ProposalKind::EmergencyAction => ProposalPayload::EmergencyAction {
            action: "halt-writes".to_string(),
            params: json!({}),
        },
        ProposalKind::Custom => ProposalPayload::Custom {
            data: json!({ "note": "free-form decision" }),
        },
    }
}

/// Deterministic per-agent voting temperament for the simulation.
fn decision_for(index: usize) -> VoteDecision {
    if index % 5 == 3 {
        VoteDecision::Reject
    } else if index % 7 == 6 {
        VoteDecision::Abstain
    } else {
        VoteDecision::Approve
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity level
    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    if cli.agents == 0 {
        bail!("At least one voter agent is required");
    }

    // Load configuration
    let file_config = if cli.no_config {
        ConfigLoader::load_defaults()
    } else {
        ConfigLoader::load(cli.config.as_ref()).map_err(|e| anyhow::anyhow!(e.to_string()))?
    };
    let config: EngineConfig = file_config.engine_config();

    info!("Starting concord with {} simulated agents", cli.agents);

    // === Dependency Injection ===
    let broadcaster = Arc::new(LoopbackBroadcaster::new());
    let memory_executor = Arc::new(MemoryUpdateExecutor::new());

    let mut builder = ConsensusEngine::builder()
        .config(config.clone())
        .broadcaster(broadcaster.clone())
        .executor("update_memory", memory_executor.clone())
        .executor("update_policy", Arc::new(PolicyUpdateExecutor::new()))
        .fallback_executor(Arc::new(GenericActionExecutor));

    if config.participant_verification {
        let secret = file_config
            .signing
            .secret
            .clone()
            .unwrap_or_else(|| "concord-dev-secret".to_string());
        builder = builder.signer(Arc::new(HmacSigner::new(secret)));
    }

    if let Some(path) = &file_config.logging.event_log
        && let Some(sink) = JsonlEventSink::new(path)
    {
        builder = builder.event_sink(Arc::new(sink));
    }

    let engine = builder.build()?;

    // Register the coordinator and the voter agents
    engine.register_participant("coordinator", 1.0, vec![]).await;
    for i in 0..cli.agents {
        let name = format!("sim-{i}");
        let weight = 0.5 + 0.5 * (i % 4) as f64;
        let expertise = match i % 3 {
            0 => vec!["planning".to_string()],
            1 => vec!["storage".to_string()],
            _ => vec!["execution".to_string()],
        };
        engine.register_participant(name, weight, expertise).await;
    }

    // Each agent answers proposals arriving in its loopback mailbox
    for i in 0..cli.agents {
        let agent = AgentId::new(format!("sim-{i}"));
        let mut inbox = broadcaster.register(&agent);
        let engine = engine.clone();
        let quiet = cli.quiet;

        tokio::spawn(async move {
            while let Some(proposal) = inbox.recv().await {
                let decision = decision_for(i);
                let confidence = 0.6 + ((i * 7) % 40) as f64 / 100.0;

                // The broadcast can arrive while the proposal is still
                // pending; retry briefly until voting opens
                for attempt in 0..5 {
                    let ballot = Ballot::new(agent.clone(), decision, confidence)
                        .with_reasoning(format!("simulated temperament of {agent}"));
                    match engine.cast_vote(&proposal.id, ballot).await {
                        Ok(outcome) => {
                            if !quiet {
                                println!("  {agent} voted {decision}");
                            }
                            if let Some(result) = outcome.finalized {
                                info!("{} closed the vote: {}", agent, result);
                            }
                            break;
                        }
                        Err(e) if attempt < 4 => {
                            info!("{} retrying vote: {}", agent, e);
                            tokio::time::sleep(Duration::from_millis(50)).await;
                        }
                        Err(e) => info!("{} could not vote: {}", agent, e),
                    }
                }
            }
        });
    }

    if !cli.quiet {
        println!();
        println!("+============================================================+");
        println!("|              Concord - Agent Consensus Engine              |");
        println!("+============================================================+");
        println!();
        println!("Proposal: {} ({})", cli.title, cli.kind);
        println!("Voters:   {} simulated agents", cli.agents);
        println!();
    }

    // Submit the proposal
    let mut spec = ProposalSpec::new("coordinator", cli.title.clone(), payload_for(cli.kind))
        .with_description("Submitted by the concord demo CLI");
    if let Some(protocol) = &cli.protocol {
        spec = spec.with_protocol(protocol.clone());
    }
    if let Some(secs) = cli.timeout_secs {
        spec = spec.with_timeout(Duration::from_secs(secs));
    }
    let id = engine.create_proposal(spec).await?;

    let proposal = engine.proposal(&id).await?;
    if !cli.quiet {
        println!(
            "Using protocol {} (threshold {:.2}, quorum {} of {})",
            proposal.protocol,
            proposal.threshold,
            proposal.required_participants,
            proposal.targets.len()
        );
        println!();
    }

    // Wait for the lifecycle to settle
    let resolved = wait_for_resolution(&engine, &id, proposal.timeout).await?;

    if !cli.quiet {
        print_summary(&engine, &resolved).await;
    } else {
        println!("{}", resolved.status);
    }

    Ok(())
}

/// Poll until the proposal leaves its open and executing phases.
async fn wait_for_resolution(
    engine: &ConsensusEngine,
    id: &ProposalId,
    window: Duration,
) -> Result<concord_domain::Proposal> {
    let deadline = tokio::time::Instant::now() + window + Duration::from_secs(30);

    loop {
        let proposal = engine.proposal(id).await?;
        match proposal.status {
            ProposalStatus::Pending | ProposalStatus::Voting => {}
            // Give the queue worker a moment to finish
            ProposalStatus::Passed | ProposalStatus::Executing
                if engine.config().auto_execute => {}
            _ => return Ok(proposal),
        }
        if tokio::time::Instant::now() >= deadline {
            return Ok(proposal);
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

async fn print_summary(engine: &ConsensusEngine, proposal: &concord_domain::Proposal) {
    println!();
    println!("Outcome: {}", proposal.status);

    if let Some(result) = proposal.result() {
        println!(
            "Consensus: {} (quality {:.2}, participation {:.0}%, confidence {:.2})",
            result.outcome,
            result.quality,
            result.participation_rate * 100.0,
            result.confidence
        );
        println!(
            "Tally: approve {:.2} / reject {:.2} / abstain {:.2} across {} votes",
            result.tally.approve, result.tally.reject, result.tally.abstain,
            result.tally.participant_count
        );
    } else {
        println!("Consensus: not reached");
    }

    let stats = engine.stats().await;
    println!();
    println!(
        "Engine: {} proposals, {:.0}% success, avg quality {:.2}",
        stats.overview.total_proposals,
        stats.overview.success_rate * 100.0,
        stats.overview.avg_quality
    );

    if !stats.top_participants.is_empty() {
        println!();
        println!("Top participants:");
        for participant in &stats.top_participants {
            println!(
                "  {} (reliability {:.2}, participation {:.2})",
                participant.agent, participant.reliability, participant.participation_rate
            );
        }
    }
}
