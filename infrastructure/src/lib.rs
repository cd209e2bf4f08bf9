//! Infrastructure layer for concord
//!
//! Adapters for the application layer's ports: configuration file loading,
//! the in-process loopback transport, in-memory step executors, the
//! HMAC-SHA256 vote signer, and the JSONL audit event sink.

pub mod config;
pub mod executors;
pub mod logging;
pub mod signing;
pub mod transport;

// Re-export commonly used types
pub use config::{ConfigLoader, FileConfig};
pub use executors::{GenericActionExecutor, MemoryUpdateExecutor, PolicyUpdateExecutor};
pub use logging::JsonlEventSink;
pub use signing::HmacSigner;
pub use transport::LoopbackBroadcaster;
