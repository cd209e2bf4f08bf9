//! Proposal entity and its lifecycle state machine.

use super::payload::ProposalPayload;
use crate::consensus::result::ConsensusResult;
use crate::core::error::DomainError;
use crate::core::ids::{AgentId, ProposalId};
use crate::voting::tally::VoteTally;
use crate::voting::vote::Vote;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Category of a proposal; drives protocol selection and execution planning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalKind {
    MemoryUpdate,
    PolicyChange,
    AgentAction,
    ResourceAllocation,
    ConflictResolution,
    Configuration,
    EmergencyAction,
    Custom,
}

impl ProposalKind {
    pub fn as_str(&self) -> &str {
        match self {
            ProposalKind::MemoryUpdate => "memory_update",
            ProposalKind::PolicyChange => "policy_change",
            ProposalKind::AgentAction => "agent_action",
            ProposalKind::ResourceAllocation => "resource_allocation",
            ProposalKind::ConflictResolution => "conflict_resolution",
            ProposalKind::Configuration => "configuration",
            ProposalKind::EmergencyAction => "emergency_action",
            ProposalKind::Custom => "custom",
        }
    }
}

impl std::fmt::Display for ProposalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ProposalKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory_update" => Ok(ProposalKind::MemoryUpdate),
            "policy_change" => Ok(ProposalKind::PolicyChange),
            "agent_action" => Ok(ProposalKind::AgentAction),
            "resource_allocation" => Ok(ProposalKind::ResourceAllocation),
            "conflict_resolution" => Ok(ProposalKind::ConflictResolution),
            "configuration" => Ok(ProposalKind::Configuration),
            "emergency_action" => Ok(ProposalKind::EmergencyAction),
            "custom" => Ok(ProposalKind::Custom),
            _ => Err(format!("Unknown proposal kind: {}", s)),
        }
    }
}

/// Lifecycle status of a proposal
///
/// The status only moves forward; see [`ProposalStatus::can_transition_to`]
/// for the full machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProposalStatus {
    /// Created, broadcast not yet acknowledged
    Pending,
    /// Open for votes
    Voting,
    /// Consensus reached, outcome approved
    Passed,
    /// Consensus reached, outcome rejected
    Rejected,
    /// Timed out before consensus
    Expired,
    /// Approved and currently running its execution plan
    Executing,
    /// Execution plan ran to completion
    Completed,
    /// Withdrawn by the proposer
    Cancelled,
}

impl ProposalStatus {
    pub fn as_str(&self) -> &str {
        match self {
            ProposalStatus::Pending => "pending",
            ProposalStatus::Voting => "voting",
            ProposalStatus::Passed => "passed",
            ProposalStatus::Rejected => "rejected",
            ProposalStatus::Expired => "expired",
            ProposalStatus::Executing => "executing",
            ProposalStatus::Completed => "completed",
            ProposalStatus::Cancelled => "cancelled",
        }
    }

    /// Whether the proposal can still be voted on or cancelled.
    pub fn is_open(&self) -> bool {
        matches!(self, ProposalStatus::Pending | ProposalStatus::Voting)
    }

    /// Whether no further transition is possible.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProposalStatus::Rejected
                | ProposalStatus::Expired
                | ProposalStatus::Completed
                | ProposalStatus::Cancelled
        )
    }

    /// The forward-only lifecycle machine.
    pub fn can_transition_to(&self, next: ProposalStatus) -> bool {
        use ProposalStatus::*;
        matches!(
            (self, next),
            (Pending, Voting)
                | (Pending, Cancelled)
                | (Voting, Passed)
                | (Voting, Rejected)
                | (Voting, Expired)
                | (Voting, Cancelled)
                | (Passed, Executing)
                | (Executing, Completed)
        )
    }
}

impl std::fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A pending decision requiring agreement from a set of agents
///
/// Votes and the consensus result are private so every mutation flows through
/// the methods that uphold the invariants: one vote per agent (latest wins),
/// a result recorded at most once, and forward-only status transitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    /// Unique proposal id
    pub id: ProposalId,
    /// Category, derived from the payload
    pub kind: ProposalKind,
    /// The agent that submitted the proposal
    pub proposer: AgentId,
    /// Short human-readable title
    pub title: String,
    /// Longer description of the proposed action
    pub description: String,
    /// The typed action under decision
    pub payload: ProposalPayload,
    /// Agents asked to vote, in assignment order
    pub targets: Vec<AgentId>,
    /// Name of the governing protocol
    pub protocol: String,
    /// Minimum votes before the evaluator may resolve
    pub required_participants: usize,
    /// Approval threshold in [0, 1], copied from the protocol
    pub threshold: f64,
    /// Voting window
    pub timeout: Duration,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Lifecycle status
    pub status: ProposalStatus,
    votes: Vec<Vote>,
    result: Option<ConsensusResult>,
    #[serde(default)]
    decision_changes: HashMap<AgentId, u32>,
}

impl Proposal {
    /// Create a proposal in `pending` status. The kind is derived from the
    /// payload; protocol parameters are filled in by the builder methods.
    pub fn new(
        id: ProposalId,
        proposer: impl Into<AgentId>,
        title: impl Into<String>,
        description: impl Into<String>,
        payload: ProposalPayload,
        targets: Vec<AgentId>,
    ) -> Self {
        let kind = payload.kind();
        Self {
            id,
            kind,
            proposer: proposer.into(),
            title: title.into(),
            description: description.into(),
            payload,
            targets,
            protocol: String::new(),
            required_participants: 0,
            threshold: 0.0,
            timeout: Duration::ZERO,
            created_at: Utc::now(),
            status: ProposalStatus::Pending,
            votes: Vec::new(),
            result: None,
            decision_changes: HashMap::new(),
        }
    }

    /// Bind the proposal to a protocol and copy its decision parameters.
    pub fn with_protocol(
        mut self,
        name: impl Into<String>,
        threshold: f64,
        timeout: Duration,
    ) -> Self {
        self.protocol = name.into();
        self.threshold = threshold.clamp(0.0, 1.0);
        self.timeout = timeout;
        self
    }

    /// Set the vote quorum.
    pub fn with_required_participants(mut self, required: usize) -> Self {
        self.required_participants = required;
        self
    }

    // ==================== Votes ====================

    /// Record a vote, replacing any earlier vote from the same agent.
    ///
    /// Returns the replaced vote, if any. A replacement that changes the
    /// decision is counted so equivocation guards can inspect it.
    pub fn record_vote(&mut self, vote: Vote) -> Option<Vote> {
        match self.votes.iter().position(|v| v.agent == vote.agent) {
            Some(index) => {
                if self.votes[index].decision != vote.decision {
                    *self.decision_changes.entry(vote.agent.clone()).or_insert(0) += 1;
                }
                Some(std::mem::replace(&mut self.votes[index], vote))
            }
            None => {
                self.votes.push(vote);
                None
            }
        }
    }

    /// All votes cast so far, in cast order.
    pub fn votes(&self) -> &[Vote] {
        &self.votes
    }

    /// The vote cast by one agent, if any.
    pub fn vote_of(&self, agent: &AgentId) -> Option<&Vote> {
        self.votes.iter().find(|v| &v.agent == agent)
    }

    pub fn has_voted(&self, agent: &AgentId) -> bool {
        self.vote_of(agent).is_some()
    }

    /// How often this agent changed their decision on this proposal.
    pub fn decision_changes(&self, agent: &AgentId) -> u32 {
        self.decision_changes.get(agent).copied().unwrap_or(0)
    }

    /// Aggregate the current votes.
    pub fn tally(&self) -> VoteTally {
        VoteTally::from_votes(&self.votes)
    }

    /// Share of targeted agents that have voted.
    pub fn participation_rate(&self) -> f64 {
        if self.targets.is_empty() {
            0.0
        } else {
            self.votes.len() as f64 / self.targets.len() as f64
        }
    }

    /// Targets that have not voted yet.
    pub fn non_voters(&self) -> Vec<AgentId> {
        self.targets
            .iter()
            .filter(|t| !self.has_voted(t))
            .cloned()
            .collect()
    }

    pub fn is_target(&self, agent: &AgentId) -> bool {
        self.targets.contains(agent)
    }

    // ==================== Status & result ====================

    /// Move the proposal along the lifecycle machine.
    pub fn transition(&mut self, next: ProposalStatus) -> Result<(), DomainError> {
        if !self.status.can_transition_to(next) {
            return Err(DomainError::InvalidTransition {
                from: self.status.as_str().to_string(),
                to: next.as_str().to_string(),
            });
        }
        self.status = next;
        Ok(())
    }

    /// Record the consensus result. May only happen once.
    pub fn set_result(&mut self, result: ConsensusResult) -> Result<(), DomainError> {
        if self.result.is_some() {
            return Err(DomainError::ResultAlreadySet(self.id.to_string()));
        }
        self.result = Some(result);
        Ok(())
    }

    pub fn result(&self) -> Option<&ConsensusResult> {
        self.result.as_ref()
    }

    /// Moment the voting window closes.
    pub fn deadline(&self) -> DateTime<Utc> {
        self.created_at
            + chrono::Duration::from_std(self.timeout).unwrap_or(chrono::Duration::zero())
    }
}
