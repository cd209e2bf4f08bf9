//! Threshold evaluation rules.

use crate::protocol::definition::{Protocol, ProtocolKind, TieBreaker};
use crate::voting::tally::VoteTally;
use serde::{Deserialize, Serialize};

/// Outcome of a resolved consensus round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsensusOutcome {
    Approved,
    Rejected,
}

impl ConsensusOutcome {
    pub fn is_approved(&self) -> bool {
        matches!(self, ConsensusOutcome::Approved)
    }

    pub fn as_str(&self) -> &str {
        match self {
            ConsensusOutcome::Approved => "approved",
            ConsensusOutcome::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for ConsensusOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of running the evaluator against the current tally
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Evaluation {
    /// Threshold not met yet, or quorum not reached
    Pending,
    /// Consensus detected with the given outcome
    Reached(ConsensusOutcome),
}

impl Evaluation {
    pub fn is_reached(&self) -> bool {
        matches!(self, Evaluation::Reached(_))
    }
}

/// Decide whether the protocol's threshold is satisfied by the tally.
///
/// Quorum gates everything: below `required_participants` votes the
/// evaluation is always `Pending`. Majority-family protocols compare the
/// approval share among decisive votes (abstentions count toward quorum but
/// not toward the ratio); weighted voting compares the approval share of the
/// full cast weight. Once a threshold is met, the outcome is approved only
/// when approvals actually dominate; a dead-even split falls to the
/// protocol's tie-breaker, rejection by default.
pub fn evaluate(protocol: &Protocol, tally: &VoteTally, required_participants: usize) -> Evaluation {
    if tally.participant_count < required_participants {
        return Evaluation::Pending;
    }

    let rate = match protocol.kind {
        ProtocolKind::SimpleMajority | ProtocolKind::Supermajority | ProtocolKind::Unanimous => {
            tally.approval_rate()
        }
        ProtocolKind::WeightedVoting => tally.weighted_approval(),
        // Unknown family: never resolve on our own
        ProtocolKind::Custom(_) => None,
    };

    match rate {
        Some(rate) if rate >= protocol.threshold => {
            let approved = rate > 0.5
                || (rate == 0.5 && protocol.tie_breaker == Some(TieBreaker::Approve));
            if approved {
                Evaluation::Reached(ConsensusOutcome::Approved)
            } else {
                Evaluation::Reached(ConsensusOutcome::Rejected)
            }
        }
        _ => Evaluation::Pending,
    }
}
