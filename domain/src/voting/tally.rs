//! Weighted vote aggregation.

use super::vote::{Vote, VoteDecision};
use serde::{Deserialize, Serialize};

/// Aggregated weight sums for the votes cast on one proposal
///
/// `participant_count` is the number of votes actually cast, never the number
/// of targeted agents; quorum checks always read this field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VoteTally {
    /// Sum of approve weights
    pub approve: f64,
    /// Sum of reject weights
    pub reject: f64,
    /// Sum of abstain weights
    pub abstain: f64,
    /// Number of votes cast
    pub participant_count: usize,
}

impl VoteTally {
    /// Aggregate a slice of votes into weight sums.
    pub fn from_votes(votes: &[Vote]) -> Self {
        let mut tally = VoteTally::default();
        for vote in votes {
            match vote.decision {
                VoteDecision::Approve => tally.approve += vote.weight,
                VoteDecision::Reject => tally.reject += vote.weight,
                VoteDecision::Abstain => tally.abstain += vote.weight,
            }
            tally.participant_count += 1;
        }
        tally
    }

    /// Total weight across all decisions, abstentions included.
    pub fn total_weight(&self) -> f64 {
        self.approve + self.reject + self.abstain
    }

    /// Weight behind approve and reject only.
    pub fn decisive_weight(&self) -> f64 {
        self.approve + self.reject
    }

    /// Approval share among decisive votes.
    ///
    /// Abstentions are excluded from the ratio. Returns `None` while no
    /// decisive weight has been cast.
    pub fn approval_rate(&self) -> Option<f64> {
        let decisive = self.decisive_weight();
        if decisive > 0.0 {
            Some(self.approve / decisive)
        } else {
            None
        }
    }

    /// Approval share over the full cast weight, abstentions included.
    ///
    /// Used by weighted-voting protocols. Returns `None` while no weight has
    /// been cast.
    pub fn weighted_approval(&self) -> Option<f64> {
        let total = self.total_weight();
        if total > 0.0 {
            Some(self.approve / total)
        } else {
            None
        }
    }
}
