//! Protocol definitions and built-ins.

use crate::core::error::DomainError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Evaluation family of a protocol
///
/// The family decides which tally ratio is compared against the threshold.
/// `Custom` names a family this engine does not know how to evaluate; such
/// protocols never reach consensus on their own (defensive default), which
/// matters when snapshots from newer deployments are imported.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ProtocolKind {
    SimpleMajority,
    Supermajority,
    Unanimous,
    WeightedVoting,
    Custom(String),
}

impl ProtocolKind {
    pub fn as_str(&self) -> &str {
        match self {
            ProtocolKind::SimpleMajority => "simple_majority",
            ProtocolKind::Supermajority => "supermajority",
            ProtocolKind::Unanimous => "unanimous",
            ProtocolKind::WeightedVoting => "weighted_voting",
            ProtocolKind::Custom(name) => name,
        }
    }
}

impl From<&str> for ProtocolKind {
    fn from(s: &str) -> Self {
        match s {
            "simple_majority" => ProtocolKind::SimpleMajority,
            "supermajority" => ProtocolKind::Supermajority,
            "unanimous" => ProtocolKind::Unanimous,
            "weighted_voting" => ProtocolKind::WeightedVoting,
            other => ProtocolKind::Custom(other.to_string()),
        }
    }
}

impl std::str::FromStr for ProtocolKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(ProtocolKind::from(s))
    }
}

impl std::fmt::Display for ProtocolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for ProtocolKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ProtocolKind {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(ProtocolKind::from(s.as_str()))
    }
}

/// How a dead-even decisive tally resolves, when a protocol opts in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TieBreaker {
    /// Ties fall to approval
    Approve,
    /// Ties fall to rejection
    Reject,
}

/// A named consensus rule: threshold, timeout, and retry parameters
///
/// Immutable after registration in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Protocol {
    /// Registry name, e.g. `"supermajority"`
    pub name: String,
    /// Evaluation family
    pub kind: ProtocolKind,
    /// Approval threshold in [0, 1]
    pub threshold: f64,
    /// Default voting window for proposals under this protocol
    pub timeout: Option<Duration>,
    /// Retry budget for execution steps of approved proposals
    pub max_retries: u32,
    /// Optional tie resolution rule
    pub tie_breaker: Option<TieBreaker>,
    /// Optional name of a weight function applied by the evaluator
    pub weight_function: Option<String>,
    /// Disabled protocols cannot be assigned to new proposals
    pub enabled: bool,
}

impl Protocol {
    /// Create a protocol. Fails when the threshold leaves [0, 1].
    pub fn new(
        name: impl Into<String>,
        kind: ProtocolKind,
        threshold: f64,
    ) -> Result<Self, DomainError> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(DomainError::InvalidThreshold(threshold));
        }
        Ok(Self {
            name: name.into(),
            kind,
            threshold,
            timeout: None,
            max_retries: 0,
            tie_breaker: None,
            weight_function: None,
            enabled: true,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_tie_breaker(mut self, tie_breaker: TieBreaker) -> Self {
        self.tie_breaker = Some(tie_breaker);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    fn builtin(name: &str, kind: ProtocolKind, threshold: f64, timeout_secs: u64) -> Protocol {
        Protocol {
            name: name.to_string(),
            kind,
            threshold,
            timeout: Some(Duration::from_secs(timeout_secs)),
            max_retries: 3,
            tie_breaker: None,
            weight_function: None,
            enabled: true,
        }
    }

    /// The five protocols every engine registers at startup.
    pub fn builtins() -> Vec<Protocol> {
        vec![
            Self::builtin("simple_majority", ProtocolKind::SimpleMajority, 0.51, 5 * 60),
            Self::builtin("supermajority", ProtocolKind::Supermajority, 0.67, 10 * 60),
            Self::builtin("unanimous", ProtocolKind::Unanimous, 1.0, 15 * 60),
            Self::builtin("weighted_voting", ProtocolKind::WeightedVoting, 0.6, 5 * 60),
            Self::builtin("fast_track", ProtocolKind::SimpleMajority, 0.51, 60)
                .with_max_retries(1),
        ]
    }
}
