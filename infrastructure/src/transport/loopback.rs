//! In-process loopback transport.
//!
//! Delivers proposals to per-agent mailboxes over unbounded channels.
//! Useful for single-process deployments and simulations; a real deployment
//! replaces this with a network transport implementing the same port.

use async_trait::async_trait;
use concord_application::ports::broadcaster::{BroadcastError, ProposalBroadcaster};
use concord_domain::{AgentId, Proposal};
use std::collections::HashMap;
use std::sync::RwLock;
use tokio::sync::mpsc;
use tracing::debug;

/// Fan-out broadcaster over in-process mailboxes
///
/// Delivery is best effort per target: a target without a registered
/// mailbox (or with a dropped receiver) is skipped, which the engine later
/// observes as lower participation.
#[derive(Default)]
pub struct LoopbackBroadcaster {
    mailboxes: RwLock<HashMap<String, mpsc::UnboundedSender<Proposal>>>,
}

impl LoopbackBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a mailbox for one agent. The returned receiver yields every
    /// proposal targeting the agent. Re-registering replaces the mailbox.
    pub fn register(&self, agent: &AgentId) -> mpsc::UnboundedReceiver<Proposal> {
        let (tx, rx) = mpsc::unbounded_channel();
        if let Ok(mut mailboxes) = self.mailboxes.write() {
            mailboxes.insert(agent.to_string(), tx);
        }
        rx
    }
}

#[async_trait]
impl ProposalBroadcaster for LoopbackBroadcaster {
    async fn broadcast(
        &self,
        proposal: &Proposal,
        targets: &[AgentId],
    ) -> Result<(), BroadcastError> {
        let mailboxes = self
            .mailboxes
            .read()
            .map_err(|_| BroadcastError::Unavailable("mailbox registry poisoned".to_string()))?;

        for target in targets {
            match mailboxes.get(target.as_str()) {
                Some(tx) => {
                    if tx.send(proposal.clone()).is_err() {
                        debug!("Mailbox for {} is closed, skipping delivery", target);
                    }
                }
                None => {
                    debug!("No mailbox for {}, skipping delivery", target);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use concord_domain::{ProposalId, ProposalPayload};
    use serde_json::json;

    fn proposal(targets: Vec<AgentId>) -> Proposal {
        Proposal::new(
            ProposalId::new("p-1"),
            "proposer",
            "t",
            "",
            ProposalPayload::Custom { data: json!({}) },
            targets,
        )
    }

    #[tokio::test]
    async fn test_delivers_to_registered_mailboxes() {
        let broadcaster = LoopbackBroadcaster::new();
        let a = AgentId::new("a");
        let b = AgentId::new("b");
        let mut inbox_a = broadcaster.register(&a);
        let mut inbox_b = broadcaster.register(&b);

        let p = proposal(vec![a.clone(), b.clone()]);
        broadcaster.broadcast(&p, &[a, b]).await.unwrap();

        assert_eq!(inbox_a.recv().await.unwrap().id, ProposalId::new("p-1"));
        assert_eq!(inbox_b.recv().await.unwrap().id, ProposalId::new("p-1"));
    }

    #[tokio::test]
    async fn test_unregistered_target_is_skipped() {
        let broadcaster = LoopbackBroadcaster::new();
        let a = AgentId::new("a");
        let mut inbox_a = broadcaster.register(&a);

        let ghost = AgentId::new("ghost");
        let p = proposal(vec![a.clone(), ghost.clone()]);
        // No error even though ghost has no mailbox
        broadcaster.broadcast(&p, &[a, ghost]).await.unwrap();

        assert!(inbox_a.recv().await.is_some());
    }
}
