//! Derived consensus metrics.

use concord_domain::Proposal;
use std::collections::HashMap;
use std::time::Duration;

/// Running aggregates over all proposals
///
/// Cheap to update incrementally and fully reconstructable from the
/// proposal collection, which is how snapshot imports restore it.
#[derive(Debug, Clone, Default)]
pub struct MetricsAggregator {
    total_proposals: u64,
    consensus_reached: u64,
    avg_consensus_secs: f64,
    avg_quality: f64,
    protocol_usage: HashMap<String, u64>,
}

impl MetricsAggregator {
    /// Fold in a newly created proposal.
    pub fn record_created(&mut self, protocol: &str) {
        self.total_proposals += 1;
        *self.protocol_usage.entry(protocol.to_string()).or_insert(0) += 1;
    }

    /// Fold in a resolved consensus (passed or rejected).
    pub fn record_consensus(&mut self, elapsed: Duration, quality: f64) {
        self.consensus_reached += 1;
        let n = self.consensus_reached as f64;
        self.avg_consensus_secs += (elapsed.as_secs_f64() - self.avg_consensus_secs) / n;
        self.avg_quality += (quality - self.avg_quality) / n;
    }

    pub fn total_proposals(&self) -> u64 {
        self.total_proposals
    }

    pub fn consensus_reached(&self) -> u64 {
        self.consensus_reached
    }

    /// Share of proposals that reached consensus.
    pub fn success_rate(&self) -> f64 {
        if self.total_proposals == 0 {
            0.0
        } else {
            self.consensus_reached as f64 / self.total_proposals as f64
        }
    }

    pub fn avg_consensus_time(&self) -> Duration {
        Duration::from_secs_f64(self.avg_consensus_secs.max(0.0))
    }

    pub fn avg_quality(&self) -> f64 {
        self.avg_quality
    }

    /// Share of all proposals that used the given protocol.
    pub fn usage_fraction(&self, protocol: &str) -> f64 {
        if self.total_proposals == 0 {
            return 0.0;
        }
        let count = self.protocol_usage.get(protocol).copied().unwrap_or(0);
        count as f64 / self.total_proposals as f64
    }

    /// Rebuild the aggregates from scratch, e.g. after a snapshot import.
    pub fn rebuild<'a>(proposals: impl Iterator<Item = &'a Proposal>) -> Self {
        let mut metrics = MetricsAggregator::default();
        for proposal in proposals {
            metrics.record_created(&proposal.protocol);
            if let Some(result) = proposal.result() {
                let elapsed = (result.decided_at - proposal.created_at)
                    .to_std()
                    .unwrap_or(Duration::ZERO);
                metrics.record_consensus(elapsed, result.quality);
            }
        }
        metrics
    }
}
