//! Vote types for consensus decisions
//!
//! This module defines the core voting primitives used when agents decide on
//! a proposal.

use crate::core::ids::AgentId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lower bound for a vote weight.
pub const MIN_WEIGHT: f64 = 0.1;

/// Upper bound for a vote weight.
pub const MAX_WEIGHT: f64 = 10.0;

/// The decision carried by a vote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteDecision {
    /// The agent approves the proposed action
    Approve,
    /// The agent rejects the proposed action
    Reject,
    /// The agent participates without taking a side
    Abstain,
}

impl VoteDecision {
    pub fn as_str(&self) -> &str {
        match self {
            VoteDecision::Approve => "approve",
            VoteDecision::Reject => "reject",
            VoteDecision::Abstain => "abstain",
        }
    }

    /// Whether this decision counts toward the approve/reject ratio.
    ///
    /// Abstentions count toward participation but not toward the ratio.
    pub fn is_decisive(&self) -> bool {
        !matches!(self, VoteDecision::Abstain)
    }
}

impl std::fmt::Display for VoteDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for VoteDecision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "approve" | "yes" => Ok(VoteDecision::Approve),
            "reject" | "no" => Ok(VoteDecision::Reject),
            "abstain" => Ok(VoteDecision::Abstain),
            _ => Err(format!(
                "Unknown vote decision: {}. Valid: approve, reject, abstain",
                s
            )),
        }
    }
}

/// A single vote from an agent on a proposal
///
/// The weight is copied from the participant record at cast time, so a later
/// weight change never rewrites history. A second vote from the same agent on
/// the same proposal replaces the first.
///
/// # Example
///
/// ```
/// use concord_domain::voting::{Vote, VoteDecision};
///
/// let vote = Vote::new("agent-1", VoteDecision::Approve, 1.0, 0.9)
///     .with_reasoning("Change is low risk");
/// assert_eq!(vote.decision, VoteDecision::Approve);
/// assert_eq!(vote.confidence, 0.9);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vote {
    /// The voting agent
    pub agent: AgentId,
    /// The decision
    pub decision: VoteDecision,
    /// Influence multiplier, bound to [0.1, 10]
    pub weight: f64,
    /// How certain the agent is, in [0, 1]
    pub confidence: f64,
    /// Optional free-form reasoning
    pub reasoning: Option<String>,
    /// When the vote was cast
    pub cast_at: DateTime<Utc>,
    /// Optional keyed-hash signature over (proposal, agent, decision)
    pub signature: Option<String>,
}

impl Vote {
    /// Create a new vote. Weight and confidence are clamped into their
    /// documented bounds.
    pub fn new(
        agent: impl Into<AgentId>,
        decision: VoteDecision,
        weight: f64,
        confidence: f64,
    ) -> Self {
        Self {
            agent: agent.into(),
            decision,
            weight: weight.clamp(MIN_WEIGHT, MAX_WEIGHT),
            confidence: confidence.clamp(0.0, 1.0),
            reasoning: None,
            cast_at: Utc::now(),
            signature: None,
        }
    }

    /// Attach reasoning text.
    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = Some(reasoning.into());
        self
    }

    /// Attach a signature.
    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = Some(signature.into());
        self
    }
}
