//! Proposal entities.
//!
//! A [`Proposal`] is a pending decision requiring agreement from a set of
//! agents. Its [`ProposalStatus`] only ever moves forward:
//!
//! ```text
//! pending -> voting -> { passed, rejected, expired }
//! passed  -> executing -> completed
//! { pending, voting } -> cancelled   (manual only)
//! ```

pub mod entities;
pub mod payload;

pub use entities::{Proposal, ProposalKind, ProposalStatus};
pub use payload::ProposalPayload;
