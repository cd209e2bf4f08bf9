//! Execution planning.
//!
//! Approved proposals are turned into an ordered [`ExecutionPlan`] whose
//! steps run one proposal at a time. Rollback tokens are declared alongside
//! the steps but never invoked automatically.

pub mod plan;

pub use plan::{ExecutionPlan, ExecutionStep};
