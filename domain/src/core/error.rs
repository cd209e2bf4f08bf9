//! Domain error types

use thiserror::Error;

/// Domain-level errors
#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Consensus result already recorded for proposal {0}")]
    ResultAlreadySet(String),

    #[error("Protocol already registered: {0}")]
    DuplicateProtocol(String),

    #[error("Threshold must be within [0, 1], got {0}")]
    InvalidThreshold(f64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_error_display() {
        let error = DomainError::InvalidTransition {
            from: "passed".to_string(),
            to: "voting".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Invalid status transition: passed -> voting"
        );
    }

    #[test]
    fn test_threshold_error_display() {
        let error = DomainError::InvalidThreshold(1.5);
        assert!(error.to_string().contains("1.5"));
    }
}
