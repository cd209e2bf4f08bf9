//! Snapshot export and import.
//!
//! A [`ConsensusSnapshot`] is the plain structured document form of the
//! engine state: proposals, participants, protocols, and events. Exporting
//! and re-importing reproduces an equivalent in-memory state; derived
//! metrics are rebuilt rather than stored.

use crate::store::Store;
use concord_domain::{DomainError, Event, EventLog, Participant, Proposal, Protocol, ProtocolCatalog};
use crate::metrics::MetricsAggregator;
use serde::{Deserialize, Serialize};

/// Serialized engine state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusSnapshot {
    pub proposals: Vec<Proposal>,
    pub participants: Vec<Participant>,
    pub protocols: Vec<Protocol>,
    pub events: Vec<Event>,
}

impl ConsensusSnapshot {
    /// Capture the current store. Collections are sorted so two equivalent
    /// stores export byte-identical documents.
    pub(crate) fn from_store(store: &Store) -> Self {
        let mut proposals: Vec<Proposal> = store.proposals().cloned().collect();
        proposals.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));

        let mut participants: Vec<Participant> = store.participants().cloned().collect();
        participants.sort_by(|a, b| a.agent.cmp(&b.agent));

        let protocols: Vec<Protocol> =
            store.catalog.protocols().into_iter().cloned().collect();

        Self {
            proposals,
            participants,
            protocols,
            events: store.events.to_vec(),
        }
    }

    /// Rebuild a store from the snapshot. Metrics are recomputed from the
    /// proposal collection.
    pub(crate) fn into_store(self) -> Result<Store, DomainError> {
        let mut catalog = ProtocolCatalog::new();
        for protocol in self.protocols {
            catalog.register(protocol)?;
        }

        let mut store = Store::new(catalog);
        for participant in self.participants {
            store.upsert_participant(participant);
        }
        for proposal in self.proposals {
            store.insert_proposal(proposal);
        }
        store.events = EventLog::from(self.events);
        let metrics = MetricsAggregator::rebuild(store.proposals());
        store.metrics = metrics;

        Ok(store)
    }

    /// Serialize to a JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Parse from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
