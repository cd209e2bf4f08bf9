//! HMAC-SHA256 vote signer.
//!
//! Signs the (proposal, agent, decision) triple with a shared secret and a
//! standard HMAC construction over SHA-256, hex encoded. This gives
//! participant verification real teeth in a single-trust-domain deployment;
//! multi-party deployments would swap in per-agent asymmetric keys behind
//! the same port.

use concord_application::ports::signer::VoteSigner;
use concord_domain::{AgentId, ProposalId, VoteDecision};
use sha2::{Digest, Sha256};

const BLOCK_SIZE: usize = 64;

fn hmac_sha256(key: &[u8], message: &[u8]) -> [u8; 32] {
    // Keys longer than the block size are hashed down first
    let mut block = [0u8; BLOCK_SIZE];
    if key.len() > BLOCK_SIZE {
        let digest = Sha256::digest(key);
        block[..digest.len()].copy_from_slice(&digest);
    } else {
        block[..key.len()].copy_from_slice(key);
    }

    let mut inner = Sha256::new();
    inner.update(block.map(|b| b ^ 0x36));
    inner.update(message);
    let inner_hash = inner.finalize();

    let mut outer = Sha256::new();
    outer.update(block.map(|b| b ^ 0x5c));
    outer.update(inner_hash);
    outer.finalize().into()
}

/// Shared-secret vote signer
pub struct HmacSigner {
    secret: Vec<u8>,
}

impl HmacSigner {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
        }
    }
}

impl VoteSigner for HmacSigner {
    fn sign(&self, proposal: &ProposalId, agent: &AgentId, decision: VoteDecision) -> String {
        let message = format!("{}:{}:{}", proposal, agent, decision);
        hex::encode(hmac_sha256(&self.secret, message.as_bytes()))
    }
}
