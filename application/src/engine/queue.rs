//! Single-flight execution queue.
//!
//! Approved proposals are executed by one worker task draining a FIFO
//! channel, so at most one proposal's plan runs at a time. This is a
//! deliberate throughput limiter: execution effects are easiest to reason
//! about strictly serialized, and nothing in the engine depends on
//! execution latency. A failed proposal is logged and the worker moves on;
//! one failure never stops the queue.

use super::EngineInner;
use concord_domain::ProposalId;
use std::sync::Weak;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, warn};

/// Spawn the queue worker. The worker exits when the engine is dropped
/// (channel closed) or the last strong reference disappears.
pub(crate) fn spawn_worker(mut rx: UnboundedReceiver<ProposalId>, engine: Weak<EngineInner>) {
    tokio::spawn(async move {
        while let Some(id) = rx.recv().await {
            let Some(inner) = engine.upgrade() else { break };
            match inner.execute(&id).await {
                Ok(report) => {
                    debug!("Executed proposal {} ({} steps)", id, report.steps.len());
                }
                Err(e) => {
                    warn!("Execution of proposal {} failed: {}", id, e);
                }
            }
        }
    });
}
