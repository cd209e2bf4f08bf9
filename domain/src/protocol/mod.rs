//! Consensus protocols.
//!
//! A protocol is a named rule set (threshold, timeout, tie-break) governing
//! how votes resolve into a decision. Protocols are immutable once
//! registered; the [`ProtocolCatalog`] is a pure lookup table with the five
//! built-ins pre-registered.

pub mod catalog;
pub mod definition;

pub use catalog::{ProtocolCatalog, select_protocol};
pub use definition::{Protocol, ProtocolKind, TieBreaker};
