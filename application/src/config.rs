//! Engine configuration.

use std::time::Duration;

/// Tunable behavior of the consensus engine
///
/// Every field has a documented default; unset fields in external
/// configuration sources keep these values.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Protocol assigned when neither the caller nor the selection rules
    /// pick one
    pub default_protocol: String,
    /// Voting window for protocols that carry no timeout of their own
    pub default_timeout: Duration,
    /// Open (`pending`/`voting`) proposals one agent may have at a time
    pub max_proposals_per_agent: usize,
    /// Reject votes from non-active participants and repeated decision flips
    pub byzantine_protection: bool,
    /// Enqueue approved proposals for execution automatically
    pub auto_execute: bool,
    /// Require and verify vote signatures
    pub participant_verification: bool,
    /// Record lifecycle events in the audit log
    pub event_logging: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_protocol: "simple_majority".to_string(),
            default_timeout: Duration::from_secs(5 * 60),
            max_proposals_per_agent: 10,
            byzantine_protection: false,
            auto_execute: true,
            participant_verification: false,
            event_logging: true,
        }
    }
}

impl EngineConfig {
    pub fn with_default_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.default_protocol = protocol.into();
        self
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn with_auto_execute(mut self, enabled: bool) -> Self {
        self.auto_execute = enabled;
        self
    }

    pub fn with_byzantine_protection(mut self, enabled: bool) -> Self {
        self.byzantine_protection = enabled;
        self
    }

    pub fn with_participant_verification(mut self, enabled: bool) -> Self {
        self.participant_verification = enabled;
        self
    }

    pub fn with_event_logging(mut self, enabled: bool) -> Self {
        self.event_logging = enabled;
        self
    }

    pub fn with_max_proposals_per_agent(mut self, limit: usize) -> Self {
        self.max_proposals_per_agent = limit;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_documented_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.default_protocol, "simple_majority");
        assert_eq!(config.default_timeout, Duration::from_secs(300));
        assert_eq!(config.max_proposals_per_agent, 10);
        assert!(!config.byzantine_protection);
        assert!(config.auto_execute);
        assert!(!config.participant_verification);
        assert!(config.event_logging);
    }

    #[test]
    fn test_builder_overrides() {
        let config = EngineConfig::default()
            .with_default_protocol("supermajority")
            .with_auto_execute(false);
        assert_eq!(config.default_protocol, "supermajority");
        assert!(!config.auto_execute);
    }
}
