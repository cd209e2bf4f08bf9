//! Owned engine state.
//!
//! All mutable collections (proposals, participants, protocols, events,
//! metrics) live in one [`Store`] that the engine guards with a single
//! lock. Entities are indexed by string id; nothing hands out live
//! references across the lock boundary.

use crate::metrics::MetricsAggregator;
use concord_domain::{
    AgentId, Event, EventLog, Participant, Proposal, ProposalId, ProposalKind, ProposalStatus,
    ProtocolCatalog,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Query filter for proposal listings
///
/// All criteria are optional and combined with AND. Results are always
/// sorted newest first.
#[derive(Debug, Clone, Default)]
pub struct ProposalFilter {
    pub status: Option<ProposalStatus>,
    pub kind: Option<ProposalKind>,
    pub proposer: Option<AgentId>,
    /// Matches proposals that target the given agent
    pub participant: Option<AgentId>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl ProposalFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, status: ProposalStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_kind(mut self, kind: ProposalKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn by_proposer(mut self, proposer: impl Into<AgentId>) -> Self {
        self.proposer = Some(proposer.into());
        self
    }

    pub fn targeting(mut self, participant: impl Into<AgentId>) -> Self {
        self.participant = Some(participant.into());
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    fn matches(&self, proposal: &Proposal) -> bool {
        if let Some(status) = self.status
            && proposal.status != status
        {
            return false;
        }
        if let Some(kind) = self.kind
            && proposal.kind != kind
        {
            return false;
        }
        if let Some(proposer) = &self.proposer
            && &proposal.proposer != proposer
        {
            return false;
        }
        if let Some(participant) = &self.participant
            && !proposal.is_target(participant)
        {
            return false;
        }
        if let Some(since) = self.since
            && proposal.created_at < since
        {
            return false;
        }
        if let Some(until) = self.until
            && proposal.created_at > until
        {
            return false;
        }
        true
    }
}

/// The single owner of all engine state
#[derive(Debug, Default)]
pub struct Store {
    proposals: HashMap<String, Proposal>,
    participants: HashMap<String, Participant>,
    pub(crate) catalog: ProtocolCatalog,
    pub(crate) events: EventLog,
    pub(crate) metrics: MetricsAggregator,
}

impl Store {
    pub fn new(catalog: ProtocolCatalog) -> Self {
        Self {
            proposals: HashMap::new(),
            participants: HashMap::new(),
            catalog,
            events: EventLog::new(),
            metrics: MetricsAggregator::default(),
        }
    }

    // ==================== Proposals ====================

    pub fn insert_proposal(&mut self, proposal: Proposal) {
        self.proposals.insert(proposal.id.to_string(), proposal);
    }

    pub fn proposal(&self, id: &ProposalId) -> Option<&Proposal> {
        self.proposals.get(id.as_str())
    }

    pub fn proposal_mut(&mut self, id: &ProposalId) -> Option<&mut Proposal> {
        self.proposals.get_mut(id.as_str())
    }

    /// Proposals matching the filter, newest first.
    pub fn query(&self, filter: &ProposalFilter) -> Vec<&Proposal> {
        let mut matched: Vec<&Proposal> = self
            .proposals
            .values()
            .filter(|p| filter.matches(p))
            .collect();
        matched.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        matched
    }

    pub fn proposals(&self) -> impl Iterator<Item = &Proposal> {
        self.proposals.values()
    }

    pub fn proposal_count(&self) -> usize {
        self.proposals.len()
    }

    /// Open (`pending`/`voting`) proposals submitted by one agent.
    pub fn open_proposals_by(&self, proposer: &AgentId) -> usize {
        self.proposals
            .values()
            .filter(|p| &p.proposer == proposer && p.status.is_open())
            .count()
    }

    // ==================== Participants ====================

    pub fn upsert_participant(&mut self, participant: Participant) {
        self.participants
            .insert(participant.agent.to_string(), participant);
    }

    pub fn participant(&self, agent: &AgentId) -> Option<&Participant> {
        self.participants.get(agent.as_str())
    }

    pub fn participant_mut(&mut self, agent: &AgentId) -> Option<&mut Participant> {
        self.participants.get_mut(agent.as_str())
    }

    pub fn participants(&self) -> impl Iterator<Item = &Participant> {
        self.participants.values()
    }

    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }

    /// All registered agents except the given one, in id order.
    ///
    /// Used to resolve default proposal targets.
    pub fn agents_except(&self, excluded: &AgentId) -> Vec<AgentId> {
        let mut agents: Vec<AgentId> = self
            .participants
            .values()
            .map(|p| p.agent.clone())
            .filter(|a| a != excluded)
            .collect();
        agents.sort();
        agents
    }

    // ==================== Events ====================

    pub fn record_event(&mut self, event: Event) {
        self.events.append(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use concord_domain::ProposalPayload;
    use serde_json::json;

    fn proposal(id: &str, proposer: &str) -> Proposal {
        Proposal::new(
            ProposalId::new(id),
            proposer,
            "t",
            "",
            ProposalPayload::Custom { data: json!({}) },
            vec![AgentId::new("x"), AgentId::new("y")],
        )
    }

    #[test]
    fn test_query_filters_by_status_and_proposer() {
        let mut store = Store::new(ProtocolCatalog::with_builtins());
        let mut p1 = proposal("p-1", "alice");
        p1.transition(ProposalStatus::Voting).unwrap();
        store.insert_proposal(p1);
        store.insert_proposal(proposal("p-2", "bob"));

        let voting = store.query(&ProposalFilter::new().with_status(ProposalStatus::Voting));
        assert_eq!(voting.len(), 1);
        assert_eq!(voting[0].id.as_str(), "p-1");

        let by_bob = store.query(&ProposalFilter::new().by_proposer("bob"));
        assert_eq!(by_bob.len(), 1);
        assert_eq!(by_bob[0].proposer.as_str(), "bob");
    }

    #[test]
    fn test_query_by_target_membership() {
        let mut store = Store::new(ProtocolCatalog::with_builtins());
        store.insert_proposal(proposal("p-1", "alice"));

        assert_eq!(store.query(&ProposalFilter::new().targeting("x")).len(), 1);
        assert_eq!(store.query(&ProposalFilter::new().targeting("z")).len(), 0);
    }

    #[test]
    fn test_open_proposal_counting() {
        let mut store = Store::new(ProtocolCatalog::with_builtins());
        store.insert_proposal(proposal("p-1", "alice"));
        let mut resolved = proposal("p-2", "alice");
        resolved.transition(ProposalStatus::Voting).unwrap();
        resolved.transition(ProposalStatus::Expired).unwrap();
        store.insert_proposal(resolved);

        assert_eq!(store.open_proposals_by(&AgentId::new("alice")), 1);
    }

    #[test]
    fn test_agents_except_skips_proposer() {
        let mut store = Store::new(ProtocolCatalog::with_builtins());
        store.upsert_participant(Participant::new("a", 1.0, vec![]));
        store.upsert_participant(Participant::new("b", 1.0, vec![]));
        store.upsert_participant(Participant::new("c", 1.0, vec![]));

        let targets = store.agents_except(&AgentId::new("b"));
        assert_eq!(targets, vec![AgentId::new("a"), AgentId::new("c")]);
    }
}
