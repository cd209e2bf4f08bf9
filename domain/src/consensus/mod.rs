//! Consensus evaluation.
//!
//! The evaluator is a pure function from (protocol, tally, quorum) to an
//! [`Evaluation`]; the engine calls it after every vote and once more when a
//! proposal's voting window expires. A [`ConsensusResult`] is produced
//! exactly once per proposal, at the moment consensus is first detected.

pub mod evaluator;
pub mod result;

pub use evaluator::{ConsensusOutcome, Evaluation, evaluate};
pub use result::ConsensusResult;
