//! Execution plans for approved proposals.

use crate::core::ids::{AgentId, ProposalId};
use crate::proposal::entities::Proposal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Per-step execution timeout.
const STEP_TIMEOUT: Duration = Duration::from_secs(30);

/// One unit of post-approval work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionStep {
    /// Step id, unique within the plan
    pub id: String,
    /// The agent on whose behalf the step runs
    pub target: AgentId,
    /// Executor action name, e.g. `"update_memory"`
    pub action: String,
    /// Parameters copied from the proposal payload
    pub params: Value,
    /// Per-step execution timeout
    pub timeout: Duration,
    /// Additional attempts allowed after the first failure
    pub retry_budget: u32,
}

/// Ordered steps derived from an approved proposal
///
/// `rollback_tokens` mirror the steps one-to-one. They are advisory
/// identifiers for external compensation tooling; nothing in the engine
/// invokes them on failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    /// The proposal this plan was generated for
    pub proposal: ProposalId,
    /// Steps in execution order
    pub steps: Vec<ExecutionStep>,
    /// Sum of step timeouts
    pub estimated_duration: Duration,
    /// One advisory rollback token per step
    pub rollback_tokens: Vec<String>,
}

impl ExecutionPlan {
    /// Build the plan for a proposal.
    ///
    /// The payload picks the action: memory updates and policy changes get
    /// their dedicated executors, everything else runs the generic action
    /// executor. Parameters are the payload serialized as JSON; the target
    /// is the proposing agent, whose action the group just approved.
    pub fn for_proposal(proposal: &Proposal, retry_budget: u32) -> Self {
        let steps = vec![ExecutionStep {
            id: "step-1".to_string(),
            target: proposal.proposer.clone(),
            action: proposal.payload.action().to_string(),
            params: proposal.payload.as_json(),
            timeout: STEP_TIMEOUT,
            retry_budget,
        }];

        let estimated_duration = steps.iter().map(|s| s.timeout).sum();
        let rollback_tokens = steps.iter().map(|s| format!("rollback:{}", s.id)).collect();

        Self {
            proposal: proposal.id.clone(),
            steps,
            estimated_duration,
            rollback_tokens,
        }
    }
}
