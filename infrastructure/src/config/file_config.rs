//! Configuration file schema.

use concord_application::EngineConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root of `concord.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub engine: EngineSection,
    pub signing: SigningSection,
    pub logging: LoggingSection,
}

/// `[engine]` section: the engine configuration surface
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    pub default_protocol: String,
    pub default_timeout_secs: u64,
    pub max_proposals_per_agent: usize,
    pub byzantine_protection: bool,
    pub auto_execute: bool,
    pub participant_verification: bool,
    pub event_logging: bool,
}

impl Default for EngineSection {
    fn default() -> Self {
        let defaults = EngineConfig::default();
        Self {
            default_protocol: defaults.default_protocol,
            default_timeout_secs: defaults.default_timeout.as_secs(),
            max_proposals_per_agent: defaults.max_proposals_per_agent,
            byzantine_protection: defaults.byzantine_protection,
            auto_execute: defaults.auto_execute,
            participant_verification: defaults.participant_verification,
            event_logging: defaults.event_logging,
        }
    }
}

/// `[signing]` section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SigningSection {
    /// Secret for the HMAC vote signer. Required when
    /// `participant_verification` is on.
    pub secret: Option<String>,
}

/// `[logging]` section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Path for the JSONL audit event file. Unset disables the file sink.
    pub event_log: Option<PathBuf>,
}

impl FileConfig {
    /// Translate the file schema into the engine configuration.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig::default()
            .with_default_protocol(self.engine.default_protocol.clone())
            .with_default_timeout(Duration::from_secs(self.engine.default_timeout_secs))
            .with_max_proposals_per_agent(self.engine.max_proposals_per_agent)
            .with_byzantine_protection(self.engine.byzantine_protection)
            .with_auto_execute(self.engine.auto_execute)
            .with_participant_verification(self.engine.participant_verification)
            .with_event_logging(self.engine.event_logging)
    }
}
