//! Application layer for concord
//!
//! This crate contains the consensus engine service and the ports it
//! depends on. The engine owns all state (proposals, participants,
//! protocols, events, metrics) behind a single lock and drives the full
//! proposal lifecycle: creation and broadcast, vote aggregation and
//! threshold evaluation, timeout-forced resolution, and single-flight
//! execution of approved proposals.
//!
//! Adapters for the ports (transport, executors, signing, event sinks,
//! configuration files) live in the infrastructure layer.

pub mod config;
pub mod engine;
pub mod metrics;
pub mod ports;
pub mod snapshot;
pub mod stats;
pub mod store;

// Re-export commonly used types
pub use config::EngineConfig;
pub use engine::{
    Ballot, CastOutcome, ConsensusEngine, EngineBuilder, EngineError, ExecutionReport,
    ProposalSpec, StepOutcome,
};
pub use metrics::MetricsAggregator;
pub use ports::{
    BroadcastError, EventSink, ExecutorError, ExecutorRegistry, NullBroadcaster, NullSink,
    ProposalBroadcaster, StepExecutor, VoteSigner,
};
pub use snapshot::ConsensusSnapshot;
pub use stats::{
    ConsensusStats, ParticipantSummary, ProposalSummary, ProtocolEffectiveness, StatsOverview,
};
pub use store::ProposalFilter;
