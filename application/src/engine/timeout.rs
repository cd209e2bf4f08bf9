//! Per-proposal expiry timers.
//!
//! One timer task is spawned per proposal and parked on a sleep. Resolving
//! the proposal early cancels the token so no timer ever fires against
//! stale state; a fire that loses the race is still harmless because the
//! expiry handler re-checks status under the store lock.

use super::EngineInner;
use concord_domain::ProposalId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Cancellation tokens for the in-flight proposal timers
#[derive(Default)]
pub(crate) struct TimerRegistry {
    tokens: Mutex<HashMap<String, CancellationToken>>,
}

impl TimerRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn insert(&self, id: &ProposalId, token: CancellationToken) {
        if let Ok(mut tokens) = self.tokens.lock()
            && let Some(stale) = tokens.insert(id.to_string(), token)
        {
            stale.cancel();
        }
    }

    /// Cancel and drop the timer for one proposal. No-op when none exists.
    pub(crate) fn cancel(&self, id: &ProposalId) {
        if let Ok(mut tokens) = self.tokens.lock()
            && let Some(token) = tokens.remove(id.as_str())
        {
            token.cancel();
        }
    }

    /// Cancel every timer, e.g. before a snapshot import replaces the state.
    pub(crate) fn cancel_all(&self) {
        if let Ok(mut tokens) = self.tokens.lock() {
            for (_, token) in tokens.drain() {
                token.cancel();
            }
        }
    }
}

/// Arm the expiry timer for one proposal.
///
/// The task holds only a weak reference to the engine, so a dropped engine
/// takes its timers down with it.
pub(crate) fn arm(inner: &Arc<EngineInner>, id: ProposalId, timeout: Duration) {
    let token = CancellationToken::new();
    inner.timers.insert(&id, token.clone());

    let weak: Weak<EngineInner> = Arc::downgrade(inner);
    tokio::spawn(async move {
        tokio::select! {
            _ = token.cancelled() => {}
            _ = tokio::time::sleep(timeout) => {
                if let Some(inner) = weak.upgrade() {
                    inner.handle_expiry(&id).await;
                }
            }
        }
    });
}
