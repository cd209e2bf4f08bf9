//! Read API: aggregated statistics for dashboards.

use crate::store::Store;
use concord_domain::{AgentId, ProposalId, ProposalKind, ProposalStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Recent proposals included in the stats payload.
const RECENT_PROPOSALS: usize = 10;

/// Top participants included in the stats payload.
const TOP_PARTICIPANTS: usize = 5;

/// Headline counters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsOverview {
    pub total_proposals: u64,
    /// Proposals currently `pending` or `voting`
    pub active_proposals: usize,
    pub consensus_reached: u64,
    pub success_rate: f64,
    pub avg_consensus_time: Duration,
    pub avg_quality: f64,
    pub participants: usize,
    pub events: usize,
}

/// Compact proposal listing entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposalSummary {
    pub id: ProposalId,
    pub kind: ProposalKind,
    pub title: String,
    pub status: ProposalStatus,
    pub protocol: String,
    pub votes: usize,
    pub targets: usize,
    pub created_at: DateTime<Utc>,
}

/// Participant ranking entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantSummary {
    pub agent: AgentId,
    pub reliability: f64,
    pub participation_rate: f64,
    /// reliability x participation, the ranking key
    pub influence: f64,
    pub votes_cast: usize,
}

/// Per-protocol usage and outcome rates
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolEffectiveness {
    pub name: String,
    /// Share of all proposals assigned to this protocol
    pub usage: f64,
    /// Share of this protocol's proposals that reached consensus
    pub success_rate: f64,
}

/// The full stats payload consumed by external dashboards
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusStats {
    pub overview: StatsOverview,
    pub recent_proposals: Vec<ProposalSummary>,
    pub top_participants: Vec<ParticipantSummary>,
    pub protocol_effectiveness: Vec<ProtocolEffectiveness>,
}

pub(crate) fn build_stats(store: &Store) -> ConsensusStats {
    let metrics = &store.metrics;

    let active_proposals = store
        .proposals()
        .filter(|p| p.status.is_open())
        .count();

    let overview = StatsOverview {
        total_proposals: metrics.total_proposals(),
        active_proposals,
        consensus_reached: metrics.consensus_reached(),
        success_rate: metrics.success_rate(),
        avg_consensus_time: metrics.avg_consensus_time(),
        avg_quality: metrics.avg_quality(),
        participants: store.participant_count(),
        events: store.events.len(),
    };

    let mut recent: Vec<&concord_domain::Proposal> = store.proposals().collect();
    recent.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.id.cmp(&b.id))
    });
    let recent_proposals = recent
        .into_iter()
        .take(RECENT_PROPOSALS)
        .map(|p| ProposalSummary {
            id: p.id.clone(),
            kind: p.kind,
            title: p.title.clone(),
            status: p.status,
            protocol: p.protocol.clone(),
            votes: p.votes().len(),
            targets: p.targets.len(),
            created_at: p.created_at,
        })
        .collect();

    let mut ranked: Vec<ParticipantSummary> = store
        .participants()
        .map(|p| ParticipantSummary {
            agent: p.agent.clone(),
            reliability: p.reliability,
            participation_rate: p.participation_rate,
            influence: p.influence(),
            votes_cast: p.history.votes_cast,
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.influence
            .partial_cmp(&a.influence)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.agent.cmp(&b.agent))
    });
    ranked.truncate(TOP_PARTICIPANTS);

    let protocol_effectiveness = store
        .catalog
        .protocols()
        .iter()
        .map(|protocol| {
            let assigned: Vec<&concord_domain::Proposal> = store
                .proposals()
                .filter(|p| p.protocol == protocol.name)
                .collect();
            let decided = assigned.iter().filter(|p| p.result().is_some()).count();
            let success_rate = if assigned.is_empty() {
                0.0
            } else {
                decided as f64 / assigned.len() as f64
            };
            ProtocolEffectiveness {
                name: protocol.name.clone(),
                usage: store.metrics.usage_fraction(&protocol.name),
                success_rate,
            }
        })
        .collect();

    ConsensusStats {
        overview,
        recent_proposals,
        top_participants: ranked,
        protocol_effectiveness,
    }
}
