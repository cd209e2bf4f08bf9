//! Step executor port
//!
//! Approved proposals run their plan steps through executors resolved by
//! action name. Executors are external collaborators; the engine imposes no
//! contract beyond success or failure per step.

use async_trait::async_trait;
use concord_domain::ExecutionStep;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Errors surfaced by step execution
#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("No executor registered for action: {0}")]
    UnknownAction(String),

    #[error("Step {step} failed: {reason}")]
    StepFailed { step: String, reason: String },

    #[error("Step {0} timed out")]
    Timeout(String),
}

/// Runs one kind of execution step
#[async_trait]
pub trait StepExecutor: Send + Sync {
    /// Apply the step and return its output.
    async fn execute(&self, step: &ExecutionStep) -> Result<Value, ExecutorError>;
}

/// Action-name dispatch table for step executors
///
/// A fallback executor, when set, receives every action without a dedicated
/// entry.
#[derive(Default)]
pub struct ExecutorRegistry {
    by_action: HashMap<String, Arc<dyn StepExecutor>>,
    fallback: Option<Arc<dyn StepExecutor>>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an executor for one action name, replacing any earlier one.
    pub fn register(&mut self, action: impl Into<String>, executor: Arc<dyn StepExecutor>) {
        self.by_action.insert(action.into(), executor);
    }

    /// Set the executor used for actions without a dedicated entry.
    pub fn set_fallback(&mut self, executor: Arc<dyn StepExecutor>) {
        self.fallback = Some(executor);
    }

    /// Resolve the executor for an action name.
    pub fn resolve(&self, action: &str) -> Result<Arc<dyn StepExecutor>, ExecutorError> {
        self.by_action
            .get(action)
            .or(self.fallback.as_ref())
            .cloned()
            .ok_or_else(|| ExecutorError::UnknownAction(action.to_string()))
    }

    pub fn is_empty(&self) -> bool {
        self.by_action.is_empty() && self.fallback.is_none()
    }
}
