//! Event sinks.

pub mod jsonl;

pub use jsonl::JsonlEventSink;
