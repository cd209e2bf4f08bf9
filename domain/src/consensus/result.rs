//! Consensus result and quality scoring.

use super::evaluator::ConsensusOutcome;
use crate::execution::plan::ExecutionPlan;
use crate::voting::tally::VoteTally;
use crate::voting::vote::Vote;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Weight of the participation component in the quality score.
const QUALITY_PARTICIPATION_WEIGHT: f64 = 0.3;
/// Weight of the agreement component in the quality score.
const QUALITY_AGREEMENT_WEIGHT: f64 = 0.4;
/// Weight of the confidence component in the quality score.
const QUALITY_CONFIDENCE_WEIGHT: f64 = 0.3;

/// The resolved decision for one proposal
///
/// Produced exactly once, either while voting is active or at timeout.
/// `quality` blends participation, agreement strength, and voter confidence
/// into a single score in [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusResult {
    /// Approved or rejected
    pub outcome: ConsensusOutcome,
    /// Final weight sums at decision time
    pub tally: VoteTally,
    /// Mean voter confidence scaled by participation
    pub confidence: f64,
    /// Share of targeted agents that voted
    pub participation_rate: f64,
    /// Composite consensus quality score
    pub quality: f64,
    /// Execution plan, present for approved proposals
    pub plan: Option<ExecutionPlan>,
    /// When consensus was detected
    pub decided_at: DateTime<Utc>,
}

impl ConsensusResult {
    /// Build a result from the final votes.
    pub fn new(outcome: ConsensusOutcome, votes: &[Vote], target_count: usize) -> Self {
        let tally = VoteTally::from_votes(votes);

        let participation_rate = if target_count == 0 {
            0.0
        } else {
            votes.len() as f64 / target_count as f64
        };

        let mean_confidence = if votes.is_empty() {
            0.0
        } else {
            votes.iter().map(|v| v.confidence).sum::<f64>() / votes.len() as f64
        };

        let total = tally.total_weight();
        let agreement = if total > 0.0 {
            tally.approve.max(tally.reject) / total
        } else {
            0.0
        };

        let quality = QUALITY_PARTICIPATION_WEIGHT * participation_rate
            + QUALITY_AGREEMENT_WEIGHT * agreement
            + QUALITY_CONFIDENCE_WEIGHT * mean_confidence;

        Self {
            outcome,
            tally,
            confidence: mean_confidence * participation_rate,
            participation_rate,
            quality,
            plan: None,
            decided_at: Utc::now(),
        }
    }

    /// Attach the execution plan built for an approved proposal.
    pub fn with_plan(mut self, plan: ExecutionPlan) -> Self {
        self.plan = Some(plan);
        self
    }

    pub fn is_approved(&self) -> bool {
        self.outcome.is_approved()
    }
}
