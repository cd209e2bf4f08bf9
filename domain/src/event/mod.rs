//! Audit events.
//!
//! Every lifecycle transition appends one [`Event`] to the bounded
//! [`EventLog`]. The log is append-only while it is small; past the cap it
//! drops the oldest half so the newest records always survive.

use crate::core::ids::{AgentId, ProposalId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;

/// Maximum events retained before trimming kicks in.
pub const MAX_EVENTS: usize = 10_000;

/// Events kept after a trim.
pub const RETAIN_EVENTS: usize = 5_000;

/// Kind of audit event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    ProposalCreated,
    VotingStarted,
    VoteCast,
    ConsensusReached,
    ProposalExpired,
    ProposalCancelled,
    ExecutionStarted,
    ExecutionCompleted,
    ExecutionFailed,
    ParticipantRegistered,
    ParticipantStatusChanged,
}

impl EventKind {
    pub fn as_str(&self) -> &str {
        match self {
            EventKind::ProposalCreated => "proposal_created",
            EventKind::VotingStarted => "voting_started",
            EventKind::VoteCast => "vote_cast",
            EventKind::ConsensusReached => "consensus_reached",
            EventKind::ProposalExpired => "proposal_expired",
            EventKind::ProposalCancelled => "proposal_cancelled",
            EventKind::ExecutionStarted => "execution_started",
            EventKind::ExecutionCompleted => "execution_completed",
            EventKind::ExecutionFailed => "execution_failed",
            EventKind::ParticipantRegistered => "participant_registered",
            EventKind::ParticipantStatusChanged => "participant_status_changed",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One audit record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub kind: EventKind,
    pub proposal: Option<ProposalId>,
    pub agent: Option<AgentId>,
    pub at: DateTime<Utc>,
    #[serde(default)]
    pub payload: Value,
}

impl Event {
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            proposal: None,
            agent: None,
            at: Utc::now(),
            payload: Value::Null,
        }
    }

    pub fn for_proposal(mut self, id: &ProposalId) -> Self {
        self.proposal = Some(id.clone());
        self
    }

    pub fn by_agent(mut self, agent: &AgentId) -> Self {
        self.agent = Some(agent.clone());
        self
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }
}

/// Bounded append-only audit trail
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventLog {
    events: VecDeque<Event>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one event, trimming to the newest [`RETAIN_EVENTS`] once the
    /// log exceeds [`MAX_EVENTS`].
    pub fn append(&mut self, event: Event) {
        self.events.push_back(event);
        if self.events.len() > MAX_EVENTS {
            let excess = self.events.len() - RETAIN_EVENTS;
            self.events.drain(..excess);
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }

    /// Events for one proposal, newest first, capped at `limit`.
    pub fn for_proposal(&self, id: &ProposalId, limit: usize) -> Vec<Event> {
        self.events
            .iter()
            .rev()
            .filter(|e| e.proposal.as_ref() == Some(id))
            .take(limit)
            .cloned()
            .collect()
    }

    /// All events oldest first, for snapshots.
    pub fn to_vec(&self) -> Vec<Event> {
        self.events.iter().cloned().collect()
    }
}

impl From<Vec<Event>> for EventLog {
    fn from(events: Vec<Event>) -> Self {
        let mut log = EventLog::new();
        for event in events {
            log.append(event);
        }
        log
    }
}
