//! Typed proposal payloads.
//!
//! Every proposal kind carries its own payload variant, so the action behind
//! a proposal is always structurally known. The payload also names the
//! execution action that runs once the proposal is approved.

use super::entities::ProposalKind;
use crate::core::ids::AgentId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The action a proposal asks the agents to approve
///
/// # Example
///
/// ```
/// use concord_domain::proposal::{ProposalKind, ProposalPayload};
/// use serde_json::json;
///
/// let payload = ProposalPayload::MemoryUpdate {
///     key: "shared/goals".to_string(),
///     value: json!({"priority": "latency"}),
/// };
/// assert_eq!(payload.kind(), ProposalKind::MemoryUpdate);
/// assert_eq!(payload.action(), "update_memory");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProposalPayload {
    /// Write to the shared agent memory
    MemoryUpdate { key: String, value: Value },
    /// Change a named policy
    PolicyChange { policy: String, changes: Value },
    /// Let one agent perform a named action
    AgentAction { action: String, params: Value },
    /// Grant a resource to an agent
    ResourceAllocation {
        resource: String,
        amount: f64,
        recipient: AgentId,
    },
    /// Settle a disagreement between agents
    ConflictResolution { subject: String, resolution: Value },
    /// Apply a configuration change
    Configuration { section: String, settings: Value },
    /// Urgent action that bypasses nothing but selects the strictest protocol
    EmergencyAction { action: String, params: Value },
    /// Free-form payload for caller-defined kinds
    Custom { data: Value },
}

impl ProposalPayload {
    /// The proposal kind this payload belongs to.
    pub fn kind(&self) -> ProposalKind {
        match self {
            ProposalPayload::MemoryUpdate { .. } => ProposalKind::MemoryUpdate,
            ProposalPayload::PolicyChange { .. } => ProposalKind::PolicyChange,
            ProposalPayload::AgentAction { .. } => ProposalKind::AgentAction,
            ProposalPayload::ResourceAllocation { .. } => ProposalKind::ResourceAllocation,
            ProposalPayload::ConflictResolution { .. } => ProposalKind::ConflictResolution,
            ProposalPayload::Configuration { .. } => ProposalKind::Configuration,
            ProposalPayload::EmergencyAction { .. } => ProposalKind::EmergencyAction,
            ProposalPayload::Custom { .. } => ProposalKind::Custom,
        }
    }

    /// Name of the execution action that applies this payload.
    pub fn action(&self) -> &'static str {
        match self {
            ProposalPayload::MemoryUpdate { .. } => "update_memory",
            ProposalPayload::PolicyChange { .. } => "update_policy",
            ProposalPayload::ResourceAllocation { .. } => "allocate_resource",
            ProposalPayload::Configuration { .. } => "apply_configuration",
            _ => "execute",
        }
    }

    /// The payload as plain JSON, as handed to executors.
    pub fn as_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
