//! Voting primitives.
//!
//! A [`Vote`] is a single weighted decision from one agent on one proposal.
//! A [`VoteTally`] aggregates the votes cast so far into weight sums that the
//! consensus evaluator reads.

pub mod tally;
pub mod vote;

pub use tally::VoteTally;
pub use vote::{MAX_WEIGHT, MIN_WEIGHT, Vote, VoteDecision};
