//! Step executor adapters.
//!
//! In-memory executors for the built-in actions. These back single-process
//! deployments and tests; production deployments wire their own executors
//! through the same port.

use async_trait::async_trait;
use concord_application::ports::executor::{ExecutorError, StepExecutor};
use concord_domain::ExecutionStep;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::info;

fn required_str(step: &ExecutionStep, field: &str) -> Result<String, ExecutorError> {
    step.params
        .get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ExecutorError::StepFailed {
            step: step.id.clone(),
            reason: format!("missing parameter: {field}"),
        })
}

/// Applies `update_memory` steps to an in-memory key/value store
#[derive(Default)]
pub struct MemoryUpdateExecutor {
    entries: Mutex<HashMap<String, Value>>,
}

impl MemoryUpdateExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read one entry, mainly for tests and demos.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.entries.lock().ok()?.get(key).cloned()
    }
}

#[async_trait]
impl StepExecutor for MemoryUpdateExecutor {
    async fn execute(&self, step: &ExecutionStep) -> Result<Value, ExecutorError> {
        let key = required_str(step, "key")?;
        let value = step.params.get("value").cloned().unwrap_or(Value::Null);

        let mut entries = self.entries.lock().map_err(|_| ExecutorError::StepFailed {
            step: step.id.clone(),
            reason: "memory store poisoned".to_string(),
        })?;
        entries.insert(key.clone(), value);

        Ok(json!({ "updated": key }))
    }
}

/// Applies `update_policy` steps to an in-memory policy table
#[derive(Default)]
pub struct PolicyUpdateExecutor {
    policies: Mutex<HashMap<String, Value>>,
}

impl PolicyUpdateExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, policy: &str) -> Option<Value> {
        self.policies.lock().ok()?.get(policy).cloned()
    }
}

#[async_trait]
impl StepExecutor for PolicyUpdateExecutor {
    async fn execute(&self, step: &ExecutionStep) -> Result<Value, ExecutorError> {
        let policy = required_str(step, "policy")?;
        let changes = step.params.get("changes").cloned().unwrap_or(Value::Null);

        let mut policies = self.policies.lock().map_err(|_| ExecutorError::StepFailed {
            step: step.id.clone(),
            reason: "policy store poisoned".to_string(),
        })?;
        policies.insert(policy.clone(), changes);

        Ok(json!({ "updated": policy }))
    }
}

/// Logs and acknowledges any action; the fallback executor
pub struct GenericActionExecutor;

#[async_trait]
impl StepExecutor for GenericActionExecutor {
    async fn execute(&self, step: &ExecutionStep) -> Result<Value, ExecutorError> {
        info!("Executing {} for {} (step {})", step.action, step.target, step.id);
        Ok(json!({
            "executed": step.action,
            "target": step.target.as_str(),
            "params": step.params,
        }))
    }
}
