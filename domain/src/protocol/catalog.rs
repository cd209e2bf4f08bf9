//! Protocol registry and selection rules.

use super::definition::Protocol;
use crate::core::error::DomainError;
use crate::proposal::entities::ProposalKind;
use std::collections::HashMap;

/// Named protocol lookup table
///
/// Pure lookup after initialization: registration errors on duplicates
/// rather than mutating an existing entry.
#[derive(Debug, Clone, Default)]
pub struct ProtocolCatalog {
    protocols: HashMap<String, Protocol>,
}

impl ProtocolCatalog {
    /// An empty catalog. Most callers want [`ProtocolCatalog::with_builtins`].
    pub fn new() -> Self {
        Self::default()
    }

    /// A catalog pre-registered with the five built-in protocols.
    pub fn with_builtins() -> Self {
        let mut catalog = Self::new();
        for protocol in Protocol::builtins() {
            // Builtin names are distinct, registration cannot fail
            let _ = catalog.register(protocol);
        }
        catalog
    }

    /// Register a protocol. Fails when the name is already taken.
    pub fn register(&mut self, protocol: Protocol) -> Result<(), DomainError> {
        if self.protocols.contains_key(&protocol.name) {
            return Err(DomainError::DuplicateProtocol(protocol.name));
        }
        self.protocols.insert(protocol.name.clone(), protocol);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Protocol> {
        self.protocols.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.protocols.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.protocols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.protocols.is_empty()
    }

    /// All registered protocols, sorted by name for stable output.
    pub fn protocols(&self) -> Vec<&Protocol> {
        let mut all: Vec<&Protocol> = self.protocols.values().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }
}

/// Pick the protocol best matched to a proposal.
///
/// Emergency actions demand unanimity regardless of group size; policy and
/// configuration changes take a supermajority; very small groups can
/// realistically reach unanimity; large groups fall back to weighted voting
/// so a few heavyweights cannot be drowned out by sheer count. Everything
/// else uses the configured default.
pub fn select_protocol(kind: ProposalKind, target_count: usize, default: &str) -> String {
    match kind {
        ProposalKind::EmergencyAction => "unanimous".to_string(),
        ProposalKind::PolicyChange | ProposalKind::Configuration => "supermajority".to_string(),
        _ if target_count <= 3 => "unanimous".to_string(),
        _ if target_count > 10 => "weighted_voting".to_string(),
        _ => default.to_string(),
    }
}
