//! Participant records.
//!
//! A [`Participant`] is an agent eligible to vote. The record carries the
//! agent's influence weight, a reliability score that decays when the agent
//! misses votes on expired proposals, and a compact voting history.

use crate::core::ids::AgentId;
use crate::voting::vote::{MAX_WEIGHT, MIN_WEIGHT};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reliability multiplier applied per missed vote on an expired proposal.
pub const EXPIRY_PENALTY: f64 = 0.95;

/// Smoothing factor for the exponential participation rate.
const PARTICIPATION_SMOOTHING: f64 = 0.9;

/// Availability status of a participant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantStatus {
    Active,
    Inactive,
    Suspended,
}

impl ParticipantStatus {
    pub fn as_str(&self) -> &str {
        match self {
            ParticipantStatus::Active => "active",
            ParticipantStatus::Inactive => "inactive",
            ParticipantStatus::Suspended => "suspended",
        }
    }
}

impl std::fmt::Display for ParticipantStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Compact per-agent voting history
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VotingHistory {
    /// Total votes cast across all proposals
    pub votes_cast: usize,
    /// Running mean of the confidence attached to those votes
    pub mean_confidence: f64,
}

impl VotingHistory {
    /// Fold one more vote into the running statistics.
    pub fn record(&mut self, confidence: f64) {
        self.votes_cast += 1;
        self.mean_confidence += (confidence - self.mean_confidence) / self.votes_cast as f64;
    }
}

/// An agent eligible to vote
///
/// Participants are created on registration and never deleted, only
/// deactivated. Reliability starts at 1.0 and decays multiplicatively when
/// the agent fails to vote on a proposal that expires; there is no reward
/// path that raises it back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    /// The agent this record belongs to
    pub agent: AgentId,
    /// Influence multiplier applied to the agent's votes, in [0.1, 10]
    pub weight: f64,
    /// Trust score reflecting voting participation
    pub reliability: f64,
    /// Free-form expertise tags used by callers to pick targets
    pub expertise: Vec<String>,
    /// Availability status
    pub status: ParticipantStatus,
    /// Aggregate voting history
    pub history: VotingHistory,
    /// Exponentially smoothed participation rate
    pub participation_rate: f64,
    /// Registration time
    pub registered_at: DateTime<Utc>,
    /// Last registration, status change, or vote
    pub last_seen: DateTime<Utc>,
}

impl Participant {
    /// Register an agent. Weight is clamped into [0.1, 10].
    pub fn new(agent: impl Into<AgentId>, weight: f64, expertise: Vec<String>) -> Self {
        let now = Utc::now();
        Self {
            agent: agent.into(),
            weight: weight.clamp(MIN_WEIGHT, MAX_WEIGHT),
            reliability: 1.0,
            expertise,
            status: ParticipantStatus::Active,
            history: VotingHistory::default(),
            participation_rate: 0.0,
            registered_at: now,
            last_seen: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == ParticipantStatus::Active
    }

    /// Update the record for a freshly cast vote.
    pub fn record_vote(&mut self, confidence: f64) {
        self.history.record(confidence);
        self.last_seen = Utc::now();
    }

    /// Apply the reliability penalty for missing a vote on an expired
    /// proposal.
    pub fn apply_expiry_penalty(&mut self) {
        self.reliability *= EXPIRY_PENALTY;
    }

    /// Fold one resolved proposal into the smoothed participation rate.
    pub fn record_participation(&mut self, voted: bool) {
        let sample = if voted { 1.0 - PARTICIPATION_SMOOTHING } else { 0.0 };
        self.participation_rate = self.participation_rate * PARTICIPATION_SMOOTHING + sample;
    }

    /// Composite ranking score used by the stats read API.
    pub fn influence(&self) -> f64 {
        self.reliability * self.participation_rate
    }

    /// Change availability status.
    pub fn set_status(&mut self, status: ParticipantStatus) {
        self.status = status;
        self.last_seen = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registration_defaults() {
        let p = Participant::new("agent-1", 1.5, vec!["storage".to_string()]);
        assert_eq!(p.reliability, 1.0);
        assert_eq!(p.status, ParticipantStatus::Active);
        assert_eq!(p.history.votes_cast, 0);
        assert_eq!(p.participation_rate, 0.0);
    }

    #[test]
    fn test_weight_clamped_on_registration() {
        assert_eq!(Participant::new("a", 100.0, vec![]).weight, MAX_WEIGHT);
        assert_eq!(Participant::new("a", 0.01, vec![]).weight, MIN_WEIGHT);
    }

    #[test]
    fn test_expiry_penalty_is_multiplicative() {
        let mut p = Participant::new("a", 1.0, vec![]);
        p.apply_expiry_penalty();
        assert!((p.reliability - 0.95).abs() < 1e-9);
        p.apply_expiry_penalty();
        assert!((p.reliability - 0.9025).abs() < 1e-9);
    }

    #[test]
    fn test_running_mean_confidence() {
        let mut p = Participant::new("a", 1.0, vec![]);
        p.record_vote(1.0);
        p.record_vote(0.5);
        assert_eq!(p.history.votes_cast, 2);
        assert!((p.history.mean_confidence - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_participation_smoothing() {
        let mut p = Participant::new("a", 1.0, vec![]);
        p.record_participation(true);
        assert!((p.participation_rate - 0.1).abs() < 1e-9);
        p.record_participation(true);
        assert!((p.participation_rate - 0.19).abs() < 1e-9);
        p.record_participation(false);
        assert!((p.participation_rate - 0.171).abs() < 1e-9);
    }

    #[test]
    fn test_status_change_updates_last_seen() {
        let mut p = Participant::new("a", 1.0, vec![]);
        let before = p.last_seen;
        p.set_status(ParticipantStatus::Suspended);
        assert_eq!(p.status, ParticipantStatus::Suspended);
        assert!(p.last_seen >= before);
        assert!(!p.is_active());
    }
}
