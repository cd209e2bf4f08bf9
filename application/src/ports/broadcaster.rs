//! Proposal broadcast port
//!
//! Defines how the engine hands a new proposal to the transport that
//! delivers it to target agents. Delivery is fire-and-forget per target: an
//! undelivered proposal only shows up as lower participation later, never as
//! an engine error.

use async_trait::async_trait;
use concord_domain::{AgentId, Proposal};
use thiserror::Error;

/// Errors a transport adapter may surface
#[derive(Error, Debug)]
pub enum BroadcastError {
    #[error("Transport unavailable: {0}")]
    Unavailable(String),

    #[error("Delivery to {agent} failed: {reason}")]
    Delivery { agent: AgentId, reason: String },
}

/// Outbound transport for new proposals
///
/// The receiving side of the transport is expected to call back into the
/// engine's vote casting; that path is outside this interface.
#[async_trait]
pub trait ProposalBroadcaster: Send + Sync {
    /// Deliver the proposal to each target agent.
    async fn broadcast(&self, proposal: &Proposal, targets: &[AgentId])
    -> Result<(), BroadcastError>;
}

/// No-op broadcaster for engines whose agents are driven directly
pub struct NullBroadcaster;

#[async_trait]
impl ProposalBroadcaster for NullBroadcaster {
    async fn broadcast(
        &self,
        _proposal: &Proposal,
        _targets: &[AgentId],
    ) -> Result<(), BroadcastError> {
        Ok(())
    }
}
