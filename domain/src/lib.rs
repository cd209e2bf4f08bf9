//! Domain layer for concord
//!
//! This crate contains the core entities and decision rules for coordinating
//! agreement among autonomous agents. It has no dependencies on transport,
//! persistence, or presentation concerns.
//!
//! # Core Concepts
//!
//! ## Proposal
//!
//! A pending decision requiring agreement from a set of agents before the
//! proposed action takes effect. Proposals move through a forward-only
//! lifecycle: `pending -> voting -> {passed, rejected, expired}`, with
//! approved proposals continuing through `executing -> completed`.
//!
//! ## Protocol
//!
//! A named rule (threshold + timeout + tie-break) governing how votes
//! resolve into a decision. Five built-ins are registered at startup, from
//! `simple_majority` up to `unanimous`.
//!
//! ## Consensus
//!
//! Votes are weighted by participant influence and aggregated into a tally;
//! the evaluator compares the relevant approval ratio against the protocol
//! threshold and quorum. The resulting [`ConsensusResult`] carries a
//! composite quality score blending participation, agreement strength, and
//! voter confidence.

pub mod consensus;
pub mod core;
pub mod event;
pub mod execution;
pub mod participant;
pub mod proposal;
pub mod protocol;
pub mod voting;

// Re-export commonly used types
pub use consensus::{
    evaluator::{ConsensusOutcome, Evaluation, evaluate},
    result::ConsensusResult,
};
pub use core::{
    error::DomainError,
    ids::{AgentId, ProposalId},
};
pub use event::{Event, EventKind, EventLog, MAX_EVENTS, RETAIN_EVENTS};
pub use execution::{ExecutionPlan, ExecutionStep};
pub use participant::{EXPIRY_PENALTY, Participant, ParticipantStatus, VotingHistory};
pub use proposal::{
    entities::{Proposal, ProposalKind, ProposalStatus},
    payload::ProposalPayload,
};
pub use protocol::{
    catalog::{ProtocolCatalog, select_protocol},
    definition::{Protocol, ProtocolKind, TieBreaker},
};
pub use voting::{
    tally::VoteTally,
    vote::{MAX_WEIGHT, MIN_WEIGHT, Vote, VoteDecision},
};
