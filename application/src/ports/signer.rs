//! Vote signing port
//!
//! When participant verification is enabled the engine signs votes it casts
//! on behalf of local agents and verifies signatures on votes that arrive
//! with one. The signature covers (proposal, agent, decision), so a vote
//! cannot be replayed for a different decision.

use concord_domain::{AgentId, ProposalId, VoteDecision};

/// Produces and checks vote signatures
pub trait VoteSigner: Send + Sync {
    /// Sign a (proposal, agent, decision) triple.
    fn sign(&self, proposal: &ProposalId, agent: &AgentId, decision: VoteDecision) -> String;

    /// Check a signature against the triple it claims to cover.
    fn verify(
        &self,
        proposal: &ProposalId,
        agent: &AgentId,
        decision: VoteDecision,
        signature: &str,
    ) -> bool {
        self.sign(proposal, agent, decision) == signature
    }
}
