//! Event sink port
//!
//! Subscribers receive every audit event the engine records. Delivery is
//! synchronous and explicit; a sink that needs buffering or IO decides that
//! for itself.

use concord_domain::Event;

/// Receives audit events as they are recorded
pub trait EventSink: Send + Sync {
    fn publish(&self, event: &Event);
}

/// Sink that drops everything
pub struct NullSink;

impl EventSink for NullSink {
    fn publish(&self, _event: &Event) {}
}
